use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::config::loader::{resolve_config, ENV_CLIENT_ID, ENV_CLIENT_SECRET};
use crate::config::ClientCredentials;
use crate::error::TicktickError;
use crate::oauth::token::TokenRecord;

pub const KEY_ACCESS_TOKEN: &str = "TICKTICK_ACCESS_TOKEN";
pub const KEY_REFRESH_TOKEN: &str = "TICKTICK_REFRESH_TOKEN";
pub const KEY_OBTAINED_AT: &str = "TICKTICK_TOKEN_OBTAINED_AT";
pub const KEY_EXPIRES_IN: &str = "TICKTICK_TOKEN_EXPIRES_IN";

const NEW_FILE_HEADER: &str = "# ticktick-mcp credentials. Other entries in this file are preserved.";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Entry { key: String, value: String },
    /// Comments, blank lines and anything unparseable, kept verbatim.
    Other(String),
}

/// File-backed `KEY=VALUE` store for client credentials and the token record.
///
/// Writes replace the whole file through a temp file and a rename. Readers
/// share the lock; writers are exclusive.
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All `KEY=VALUE` entries in the file. A missing file has none.
    pub fn read_entries(&self) -> Result<HashMap<String, String>, TicktickError> {
        let _guard = self.lock.read().unwrap_or_else(|e| e.into_inner());
        let lines = read_lines(&self.path).map_err(|e| TicktickError::ConfigError {
            path: self.path.clone(),
            detail: format!("cannot read credential file: {e}"),
        })?;
        Ok(entries(&lines))
    }

    /// The stored token record, or `None` before the first authorization.
    pub fn load(&self) -> Result<Option<TokenRecord>, TicktickError> {
        let values = self.read_entries()?;
        record_from_entries(&self.path, &values)
    }

    /// Replace the stored token record.
    pub fn save(&self, record: &TokenRecord) -> Result<(), TicktickError> {
        let obtained_at = record
            .obtained_at
            .to_rfc3339_opts(SecondsFormat::AutoSi, true);
        self.update(&[
            (KEY_ACCESS_TOKEN, Some(record.access_token.clone())),
            (KEY_REFRESH_TOKEN, record.refresh_token.clone()),
            (KEY_OBTAINED_AT, Some(obtained_at)),
            (
                KEY_EXPIRES_IN,
                record.expires_in.map(|d| d.as_secs().to_string()),
            ),
        ])?;
        tracing::debug!(path = %self.path.display(), "saved token record");
        Ok(())
    }

    pub fn save_client_credentials(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<(), TicktickError> {
        self.update(&[
            (ENV_CLIENT_ID, Some(client_id.to_string())),
            (ENV_CLIENT_SECRET, Some(client_secret.to_string())),
        ])
    }

    /// Client credentials from the environment layered over this file.
    pub fn load_client_credentials(&self) -> Result<ClientCredentials, TicktickError> {
        let values = self.read_entries()?;
        resolve_config(&self.path, &values, |key| std::env::var(key).ok())
            .map(|config| config.credentials)
    }

    fn update(&self, updates: &[(&str, Option<String>)]) -> Result<(), TicktickError> {
        let _guard = self.lock.write().unwrap_or_else(|e| e.into_inner());
        let persist = |source: std::io::Error| TicktickError::PersistError {
            path: self.path.clone(),
            source,
        };
        let mut lines = read_lines(&self.path).map_err(persist)?;
        if lines.is_empty() {
            lines.push(Line::Other(NEW_FILE_HEADER.to_string()));
        }
        for (key, value) in updates {
            apply_update(&mut lines, key, value.as_deref());
        }
        write_atomic(&self.path, &render_lines(&lines)).map_err(persist)
    }
}

fn record_from_entries(
    path: &Path,
    values: &HashMap<String, String>,
) -> Result<Option<TokenRecord>, TicktickError> {
    let Some(access_token) = values.get(KEY_ACCESS_TOKEN).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    // Without a timestamp the token's age is unknown; the epoch makes any
    // stated lifetime count as elapsed.
    let obtained_at = match values.get(KEY_OBTAINED_AT).filter(|v| !v.is_empty()) {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| corrupt(path, KEY_OBTAINED_AT, raw, &e.to_string()))?,
        None => DateTime::<Utc>::default(),
    };

    let expires_in = match values.get(KEY_EXPIRES_IN).filter(|v| !v.is_empty()) {
        Some(raw) => Some(
            raw.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| corrupt(path, KEY_EXPIRES_IN, raw, &e.to_string()))?,
        ),
        None => None,
    };

    Ok(Some(TokenRecord {
        access_token: access_token.clone(),
        refresh_token: values
            .get(KEY_REFRESH_TOKEN)
            .filter(|v| !v.is_empty())
            .cloned(),
        obtained_at,
        expires_in,
    }))
}

fn corrupt(path: &Path, key: &str, raw: &str, reason: &str) -> TicktickError {
    TicktickError::ConfigError {
        path: path.to_path_buf(),
        detail: format!("invalid {key} value '{raw}': {reason}"),
    }
}

fn read_lines(path: &Path) -> std::io::Result<Vec<Line>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text.lines().map(parse_line).collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

fn entries(lines: &[Line]) -> HashMap<String, String> {
    lines
        .iter()
        .filter_map(|line| match line {
            Line::Entry { key, value } => Some((key.clone(), value.clone())),
            Line::Other(_) => None,
        })
        .collect()
}

fn parse_line(raw: &str) -> Line {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Line::Other(raw.to_string());
    }
    let body = trimmed
        .strip_prefix("export ")
        .map(str::trim_start)
        .unwrap_or(trimmed);
    let Some((key, value)) = body.split_once('=') else {
        return Line::Other(raw.to_string());
    };
    let key = key.trim();
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Line::Other(raw.to_string());
    }
    Line::Entry {
        key: key.to_string(),
        value: unquote(value.trim()),
    }
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let inner = &value[1..value.len() - 1];
        let mut result = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some('n') => result.push('\n'),
                    Some(other) => result.push(other),
                    None => result.push('\\'),
                }
            } else {
                result.push(c);
            }
        }
        return result;
    }
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..value.len() - 1].to_string();
    }
    match value.find(" #") {
        Some(idx) => value[..idx].trim_end().to_string(),
        None => value.to_string(),
    }
}

fn quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| !c.is_whitespace() && !matches!(c, '"' | '\'' | '#' | '\\'));
    if plain {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn apply_update(lines: &mut Vec<Line>, key: &str, value: Option<&str>) {
    let mut seen = false;
    lines.retain_mut(|line| {
        let Line::Entry { key: k, value: v } = line else {
            return true;
        };
        if k != key {
            return true;
        }
        match value {
            Some(new) if !seen => {
                *v = new.to_string();
                seen = true;
                true
            }
            _ => false,
        }
    });
    if let (Some(new), false) = (value, seen) {
        lines.push(Line::Entry {
            key: key.to_string(),
            value: new.to_string(),
        });
    }
}

fn render_lines(lines: &[Line]) -> String {
    let mut out = String::new();
    for line in lines {
        match line {
            Line::Entry { key, value } => {
                out.push_str(key);
                out.push('=');
                out.push_str(&quote(value));
            }
            Line::Other(raw) => out.push_str(raw),
        }
        out.push('\n');
    }
    out
}

/// Write `contents` to a sibling temp file, fsync it, then rename it over
/// `path`. The target is never truncated in place.
fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("credentials");
    let tmp_path = dir.join(format!(
        ".{file_name}.tmp-{}-{}",
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let result = write_and_rename(&tmp_path, path, contents);
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    result?;

    #[cfg(unix)]
    {
        if let Ok(dir_handle) = std::fs::File::open(dir) {
            let _ = dir_handle.sync_all();
        }
    }
    Ok(())
}

fn write_and_rename(tmp_path: &Path, path: &Path, contents: &str) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(tmp_path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    drop(file);
    std::fs::rename(tmp_path, path)
}
