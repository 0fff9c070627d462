use colored::Colorize;

use crate::error::TicktickError;
use crate::oauth::TokenStatus;
use crate::types::{CallResult, ContentBlock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Pretty,
    Raw,
    Json,
}

impl OutputMode {
    /// `--json` wins over `--raw`.
    pub fn from_flags(raw: bool, json: bool) -> Self {
        if json {
            OutputMode::Json
        } else if raw {
            OutputMode::Raw
        } else {
            OutputMode::Pretty
        }
    }
}

pub fn print_call_result(result: &CallResult, mode: OutputMode, is_tty: bool) {
    match mode {
        OutputMode::Json => {
            println!("{}", serde_json::to_string_pretty(result).unwrap_or_default());
        }
        OutputMode::Raw => {
            print!("{}", result.text());
        }
        OutputMode::Pretty => {
            if result.is_error {
                let label = if is_tty {
                    "Error".red().bold().to_string()
                } else {
                    "Error".to_string()
                };
                eprintln!("{}: {}", label, result.text());
                return;
            }
            for block in &result.content {
                match block {
                    ContentBlock::Text { text } => println!("{text}"),
                }
            }
        }
    }
}

/// Print an error to stderr, or as a JSON object on stdout.
pub fn print_error(err: &TicktickError, json_mode: bool, is_tty: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&err.to_json()).unwrap_or_default());
        return;
    }
    if is_tty {
        eprintln!("{} {}", "Error:".red().bold(), err);
    } else {
        eprintln!("Error: {err}");
    }
    if err.is_retryable() {
        eprintln!("This failure is transient; try again shortly.");
    }
}

/// `1h 2m`, `59m 30s`, `42s`.
pub fn format_duration_secs(secs: i64) -> String {
    let secs = secs.max(0);
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m}m")
    } else if m > 0 {
        format!("{m}m {s}s")
    } else {
        format!("{s}s")
    }
}

pub fn format_status(status: &TokenStatus) -> String {
    match status {
        TokenStatus::NotAuthenticated => {
            "Not authenticated. Run: ticktick-mcp auth".to_string()
        }
        TokenStatus::Valid {
            seconds_remaining: Some(secs),
        } => format!(
            "Authenticated. Access token valid for {}",
            format_duration_secs(*secs)
        ),
        TokenStatus::Valid {
            seconds_remaining: None,
        } => "Authenticated. The provider did not report a token lifetime".to_string(),
        TokenStatus::Expiring { seconds_remaining } => format!(
            "Authenticated. Access token expires in {}; the next call refreshes it",
            format_duration_secs(*seconds_remaining)
        ),
        TokenStatus::Expired { can_refresh: true } => {
            "Access token expired; it will be refreshed on the next call".to_string()
        }
        TokenStatus::Expired { can_refresh: false } => {
            "Access token expired and no refresh token is stored. Run: ticktick-mcp auth"
                .to_string()
        }
    }
}
