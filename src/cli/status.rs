use std::path::Path;

use chrono::Utc;

use crate::config::{credentials_path, load_config, AuthSettings};
use crate::error::TicktickError;
use crate::oauth::{CredentialStore, TokenStatus};
use crate::runtime::Runtime;

use super::output::{format_duration_secs, format_status};

/// Run the status command. Works without client credentials configured.
pub fn run_status(credentials: Option<&Path>, json: bool) -> Result<(), TicktickError> {
    let path = credentials_path(credentials);
    let store = CredentialStore::new(&path);
    let skew = match load_config(credentials) {
        Ok(config) => config.settings.skew,
        Err(e) => {
            tracing::debug!("using default skew: {e}");
            AuthSettings::default().skew
        }
    };
    let status = TokenStatus::of(store.load()?.as_ref(), Utc::now(), skew);

    if json {
        let mut value = serde_json::to_value(&status)
            .map_err(|e| TicktickError::TransportError(Box::new(e)))?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "credentials_path".into(),
                serde_json::Value::String(path.display().to_string()),
            );
        }
        println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
    } else {
        println!("{}", format_status(&status));
        println!("Credentials: {}", path.display());
    }
    Ok(())
}

/// Run the refresh command.
pub async fn run_refresh(credentials: Option<&Path>) -> Result<(), TicktickError> {
    let runtime = Runtime::from_config(credentials)?;
    let record = runtime.refresh().await?;
    match record.expires_in {
        Some(lifetime) => println!(
            "Access token refreshed; valid for {}",
            format_duration_secs(lifetime.as_secs() as i64)
        ),
        None => println!("Access token refreshed"),
    }
    Ok(())
}
