use std::path::Path;
use std::time::Duration;

use crate::config::{credentials_path, load_config};
use crate::error::TicktickError;
use crate::oauth::CredentialStore;
use crate::runtime::Runtime;

use super::output::format_duration_secs;

pub struct AuthOptions<'a> {
    pub credentials: Option<&'a Path>,
    pub client_id: Option<&'a str>,
    pub client_secret: Option<&'a str>,
    pub timeout: Option<Duration>,
    pub open_browser: bool,
}

/// Run the auth command: browser consent, local callback, token exchange.
/// Ctrl-C cancels the wait.
pub async fn run_auth(opts: AuthOptions<'_>) -> Result<(), TicktickError> {
    if let (Some(id), Some(secret)) = (opts.client_id, opts.client_secret) {
        let store = CredentialStore::new(credentials_path(opts.credentials));
        store.save_client_credentials(id, secret)?;
    } else if opts.client_id.is_some() || opts.client_secret.is_some() {
        return Err(TicktickError::ConfigError {
            path: credentials_path(opts.credentials),
            detail: "--client-id and --client-secret must be given together".into(),
        });
    }

    let mut config = load_config(opts.credentials)?;
    if let Some(timeout) = opts.timeout {
        config.settings.callback_timeout = timeout;
    }
    let runtime = Runtime::with_config(config)?;
    let flow = runtime.authorization_flow().with_browser(opts.open_browser);

    let pending = flow.begin().await?;
    eprintln!("Open this URL to authorize ticktick-mcp:\n\n  {}\n", pending.authorization_url());
    eprintln!(
        "Waiting for the callback on {} (Ctrl-C to cancel)...",
        pending.callback_addr()
    );

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let record = pending.complete(shutdown).await?;

    println!("Authentication successful.");
    println!("Credentials saved to {}", runtime.store().path().display());
    if let Some(lifetime) = record.expires_in {
        println!(
            "Access token valid for {}",
            format_duration_secs(lifetime.as_secs() as i64)
        );
    }
    Ok(())
}
