use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ticktick-mcp",
    version,
    about = "TickTick task tools with an auto-refreshing OAuth2 credential"
)]
struct Cli {
    /// Credential file (KEY=VALUE lines)
    #[arg(long, global = true, env = "TICKTICK_CREDENTIALS_FILE")]
    credentials: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authorize in the browser and store the token pair
    Auth {
        /// Seconds to wait for the browser redirect
        #[arg(long, env = "TICKTICK_OAUTH_TIMEOUT_SECS")]
        timeout: Option<u64>,

        /// Print the authorization URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,

        /// Client ID to save alongside the tokens
        #[arg(long, env = "TICKTICK_CLIENT_ID")]
        client_id: Option<String>,

        /// Client secret to save alongside the tokens. Prefer the environment
        /// variable; a flag value is visible in the process list.
        #[arg(long, env = "TICKTICK_CLIENT_SECRET", hide_env_values = true)]
        client_secret: Option<String>,
    },

    /// Show whether a usable token is stored
    Status {
        /// JSON output
        #[arg(long)]
        json: bool,
    },

    /// Refresh the access token now
    Refresh,

    /// List available tools
    Tools {
        /// JSON output
        #[arg(long)]
        json: bool,
    },

    /// Call a tool
    Call {
        /// Tool name, e.g. get_projects
        tool: String,

        /// Tool arguments as key:value or key=value
        args: Vec<String>,

        /// Raw output (no formatting)
        #[arg(long)]
        raw: bool,

        /// JSON output
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    fn json_output(&self) -> bool {
        match self {
            Commands::Status { json } | Commands::Tools { json } | Commands::Call { json, .. } => {
                *json
            }
            Commands::Auth { .. } | Commands::Refresh => false,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("TICKTICK_MCP_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.command.json_output();

    if let Err(e) = run(cli).await {
        ticktick_mcp::cli::output::print_error(&e, json, std::io::stderr().is_terminal());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), ticktick_mcp::TicktickError> {
    let credentials = cli.credentials.as_deref();
    match cli.command {
        Commands::Auth {
            timeout,
            no_browser,
            client_id,
            client_secret,
        } => {
            ticktick_mcp::cli::auth::run_auth(ticktick_mcp::cli::auth::AuthOptions {
                credentials,
                client_id: client_id.as_deref(),
                client_secret: client_secret.as_deref(),
                timeout: timeout.map(Duration::from_secs),
                open_browser: !no_browser,
            })
            .await
        }
        Commands::Status { json } => ticktick_mcp::cli::status::run_status(credentials, json),
        Commands::Refresh => ticktick_mcp::cli::status::run_refresh(credentials).await,
        Commands::Tools { json } => ticktick_mcp::cli::tools::run_tools(json),
        Commands::Call {
            tool,
            args,
            raw,
            json,
        } => ticktick_mcp::cli::call::run_call(credentials, &tool, &args, raw, json).await,
    }
}
