use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::TicktickError;
use crate::oauth::store::CredentialStore;

use super::types::{AuthSettings, ClientAuthMethod, ClientCredentials, Config, Deployment};

pub const ENV_CLIENT_ID: &str = "TICKTICK_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "TICKTICK_CLIENT_SECRET";
pub const ENV_REDIRECT_URI: &str = "TICKTICK_REDIRECT_URI";
pub const ENV_REGION: &str = "TICKTICK_REGION";
pub const ENV_BASE_URL: &str = "TICKTICK_BASE_URL";
pub const ENV_AUTH_URL: &str = "TICKTICK_AUTH_URL";
pub const ENV_TOKEN_URL: &str = "TICKTICK_TOKEN_URL";
pub const ENV_SCOPE: &str = "TICKTICK_SCOPE";
pub const ENV_CLIENT_AUTH: &str = "TICKTICK_CLIENT_AUTH";
pub const ENV_PKCE: &str = "TICKTICK_OAUTH_PKCE";
pub const ENV_SKEW_SECS: &str = "TICKTICK_TOKEN_SKEW_SECS";
pub const ENV_TIMEOUT_SECS: &str = "TICKTICK_OAUTH_TIMEOUT_SECS";
pub const ENV_CREDENTIALS_FILE: &str = "TICKTICK_CREDENTIALS_FILE";

pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8000/callback";
pub const DEFAULT_SCOPE: &str = "tasks:read tasks:write";

/// Default credential file: `~/.ticktick-mcp/credentials.env`.
pub fn default_credentials_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ticktick-mcp")
        .join("credentials.env")
}

/// Pick the credential file: explicit path, then `TICKTICK_CREDENTIALS_FILE`,
/// then the default location.
pub fn credentials_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match std::env::var(ENV_CREDENTIALS_FILE) {
        Ok(p) if !p.trim().is_empty() => PathBuf::from(p),
        _ => default_credentials_path(),
    }
}

/// Load the configuration from the process environment layered over the
/// credential file.
pub fn load_config(explicit_path: Option<&Path>) -> Result<Config, TicktickError> {
    let path = credentials_path(explicit_path);
    let store = CredentialStore::new(&path);
    let file_values = store.read_entries()?;
    resolve_config(&path, &file_values, |key| std::env::var(key).ok())
}

/// Resolve a [`Config`] from a lookup function and the credential file's
/// entries. Non-empty lookup values win over the file.
pub fn resolve_config<F>(
    path: &Path,
    file_values: &HashMap<String, String>,
    env: F,
) -> Result<Config, TicktickError>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| -> Option<String> {
        env(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .or_else(|| {
                file_values
                    .get(key)
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
            })
    };

    let client_id = lookup(ENV_CLIENT_ID).ok_or_else(|| missing(path, ENV_CLIENT_ID))?;
    let client_secret =
        lookup(ENV_CLIENT_SECRET).ok_or_else(|| missing(path, ENV_CLIENT_SECRET))?;

    let base_url = lookup(ENV_BASE_URL);
    let deployment = match lookup(ENV_REGION) {
        Some(region) => Deployment::parse(&region).ok_or_else(|| {
            config_error(
                path,
                format!("{ENV_REGION} must be 'ticktick' or 'dida365', got '{region}'"),
            )
        })?,
        None => base_url
            .as_deref()
            .map(Deployment::from_base_url)
            .unwrap_or_default(),
    };

    let redirect_uri = lookup(ENV_REDIRECT_URI).unwrap_or_else(|| DEFAULT_REDIRECT_URI.into());
    validate_redirect_uri(path, &redirect_uri)?;

    let auth_method = match lookup(ENV_CLIENT_AUTH) {
        Some(v) => ClientAuthMethod::parse(&v).ok_or_else(|| {
            config_error(
                path,
                format!("{ENV_CLIENT_AUTH} must be 'post' or 'basic', got '{v}'"),
            )
        })?,
        None => ClientAuthMethod::default(),
    };

    let defaults = AuthSettings::default();
    let settings = AuthSettings {
        skew: parse_secs(path, ENV_SKEW_SECS, lookup(ENV_SKEW_SECS))?.unwrap_or(defaults.skew),
        callback_timeout: parse_secs(path, ENV_TIMEOUT_SECS, lookup(ENV_TIMEOUT_SECS))?
            .unwrap_or(defaults.callback_timeout),
        pkce: parse_bool(path, ENV_PKCE, lookup(ENV_PKCE))?.unwrap_or(defaults.pkce),
    };

    let credentials = ClientCredentials {
        client_id,
        client_secret,
        redirect_uri,
        authorization_base_url: lookup(ENV_AUTH_URL)
            .unwrap_or_else(|| deployment.authorization_url().into()),
        token_endpoint_url: lookup(ENV_TOKEN_URL)
            .unwrap_or_else(|| deployment.token_url().into()),
        api_base_url: base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| deployment.api_base_url().into()),
        scope: lookup(ENV_SCOPE).unwrap_or_else(|| DEFAULT_SCOPE.into()),
        auth_method,
    };

    Ok(Config {
        deployment,
        credentials,
        settings,
        credentials_path: path.to_path_buf(),
    })
}

fn validate_redirect_uri(path: &Path, redirect_uri: &str) -> Result<(), TicktickError> {
    let url = reqwest::Url::parse(redirect_uri).map_err(|e| {
        config_error(path, format!("Invalid {ENV_REDIRECT_URI} '{redirect_uri}': {e}"))
    })?;
    if url.scheme() != "http" {
        return Err(config_error(
            path,
            format!("{ENV_REDIRECT_URI} must be a local http:// URL, got '{redirect_uri}'"),
        ));
    }
    if url.port_or_known_default().is_none() || url.host_str().is_none() {
        return Err(config_error(
            path,
            format!("{ENV_REDIRECT_URI} needs a host and port, got '{redirect_uri}'"),
        ));
    }
    Ok(())
}

fn parse_secs(
    path: &Path,
    key: &str,
    value: Option<String>,
) -> Result<Option<Duration>, TicktickError> {
    value
        .map(|v| {
            v.parse::<u64>().map(Duration::from_secs).map_err(|_| {
                config_error(path, format!("{key} must be a number of seconds, got '{v}'"))
            })
        })
        .transpose()
}

fn parse_bool(path: &Path, key: &str, value: Option<String>) -> Result<Option<bool>, TicktickError> {
    value
        .map(|v| match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(config_error(path, format!("{key} must be a boolean, got '{v}'"))),
        })
        .transpose()
}

fn missing(path: &Path, key: &str) -> TicktickError {
    config_error(
        path,
        format!("{key} is not set (checked the environment and this file)"),
    )
}

fn config_error(path: &Path, detail: String) -> TicktickError {
    TicktickError::ConfigError {
        path: path.to_path_buf(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn path() -> PathBuf {
        PathBuf::from("/tmp/credentials.env")
    }

    #[test]
    fn resolves_defaults_for_ticktick() {
        let env = env_from(&[(ENV_CLIENT_ID, "cid"), (ENV_CLIENT_SECRET, "secret")]);
        let config = resolve_config(&path(), &HashMap::new(), env).unwrap();
        assert_eq!(config.deployment, Deployment::Ticktick);
        assert_eq!(config.credentials.client_id, "cid");
        assert_eq!(config.credentials.redirect_uri, DEFAULT_REDIRECT_URI);
        assert_eq!(
            config.credentials.token_endpoint_url,
            "https://ticktick.com/oauth/token"
        );
        assert_eq!(
            config.credentials.api_base_url,
            "https://api.ticktick.com/open/v1"
        );
        assert_eq!(config.credentials.scope, DEFAULT_SCOPE);
        assert_eq!(config.settings, AuthSettings::default());
    }

    #[test]
    fn region_switch_changes_only_urls() {
        let env = env_from(&[
            (ENV_CLIENT_ID, "cid"),
            (ENV_CLIENT_SECRET, "secret"),
            (ENV_REGION, "dida365"),
        ]);
        let config = resolve_config(&path(), &HashMap::new(), env).unwrap();
        assert_eq!(config.deployment, Deployment::Dida365);
        assert_eq!(
            config.credentials.authorization_base_url,
            "https://dida365.com/oauth/authorize"
        );
        assert_eq!(config.credentials.client_id, "cid");
    }

    #[test]
    fn base_url_selects_dida365() {
        let env = env_from(&[
            (ENV_CLIENT_ID, "cid"),
            (ENV_CLIENT_SECRET, "secret"),
            (ENV_BASE_URL, "https://api.dida365.com/open/v1/"),
        ]);
        let config = resolve_config(&path(), &HashMap::new(), env).unwrap();
        assert_eq!(config.deployment, Deployment::Dida365);
        assert_eq!(
            config.credentials.api_base_url,
            "https://api.dida365.com/open/v1"
        );
        assert_eq!(
            config.credentials.token_endpoint_url,
            "https://dida365.com/oauth/token"
        );
    }

    #[test]
    fn environment_overrides_file() {
        let mut file = HashMap::new();
        file.insert(ENV_CLIENT_ID.to_string(), "file-id".to_string());
        file.insert(ENV_CLIENT_SECRET.to_string(), "file-secret".to_string());
        let env = env_from(&[(ENV_CLIENT_ID, "env-id"), (ENV_CLIENT_SECRET, "")]);
        let config = resolve_config(&path(), &file, env).unwrap();
        assert_eq!(config.credentials.client_id, "env-id");
        // Empty environment values fall through to the file.
        assert_eq!(config.credentials.client_secret, "file-secret");
    }

    #[test]
    fn missing_client_id_is_config_error() {
        let env = env_from(&[(ENV_CLIENT_SECRET, "secret")]);
        let err = resolve_config(&path(), &HashMap::new(), env).unwrap_err();
        assert!(matches!(err, TicktickError::ConfigError { .. }));
        assert!(err.to_string().contains(ENV_CLIENT_ID));
    }

    #[test]
    fn settings_are_configurable() {
        let env = env_from(&[
            (ENV_CLIENT_ID, "cid"),
            (ENV_CLIENT_SECRET, "secret"),
            (ENV_SKEW_SECS, "30"),
            (ENV_TIMEOUT_SECS, "5"),
            (ENV_PKCE, "true"),
            (ENV_CLIENT_AUTH, "basic"),
        ]);
        let config = resolve_config(&path(), &HashMap::new(), env).unwrap();
        assert_eq!(config.settings.skew, Duration::from_secs(30));
        assert_eq!(config.settings.callback_timeout, Duration::from_secs(5));
        assert!(config.settings.pkce);
        assert_eq!(config.credentials.auth_method, ClientAuthMethod::Basic);
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let env = env_from(&[
            (ENV_CLIENT_ID, "cid"),
            (ENV_CLIENT_SECRET, "secret"),
            (ENV_SKEW_SECS, "soon"),
        ]);
        let err = resolve_config(&path(), &HashMap::new(), env).unwrap_err();
        assert!(err.to_string().contains(ENV_SKEW_SECS));
    }

    #[test]
    fn redirect_uri_must_be_http() {
        let env = env_from(&[
            (ENV_CLIENT_ID, "cid"),
            (ENV_CLIENT_SECRET, "secret"),
            (ENV_REDIRECT_URI, "https://example.com/callback"),
        ]);
        assert!(resolve_config(&path(), &HashMap::new(), env).is_err());
    }

    #[test]
    fn unknown_region_is_rejected() {
        let env = env_from(&[
            (ENV_CLIENT_ID, "cid"),
            (ENV_CLIENT_SECRET, "secret"),
            (ENV_REGION, "mars"),
        ]);
        assert!(resolve_config(&path(), &HashMap::new(), env).is_err());
    }

    #[test]
    fn credentials_path_prefers_explicit() {
        let explicit = PathBuf::from("/explicit/creds.env");
        assert_eq!(credentials_path(Some(&explicit)), explicit);
    }

    #[test]
    fn default_path_structure() {
        let path = default_credentials_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.contains(".ticktick-mcp"));
        assert!(path_str.ends_with("credentials.env"));
    }
}
