pub mod http_mock;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use ticktick_mcp::config::{AuthSettings, ClientAuthMethod, ClientCredentials, Config, Deployment};
use ticktick_mcp::oauth::{CredentialStore, TokenRecord};

/// Environment variables the binary reads; cleared so the host cannot leak
/// into a test.
#[allow(dead_code)]
pub const TICKTICK_ENV: &[&str] = &[
    "TICKTICK_CLIENT_ID",
    "TICKTICK_CLIENT_SECRET",
    "TICKTICK_REDIRECT_URI",
    "TICKTICK_REGION",
    "TICKTICK_BASE_URL",
    "TICKTICK_AUTH_URL",
    "TICKTICK_TOKEN_URL",
    "TICKTICK_SCOPE",
    "TICKTICK_CLIENT_AUTH",
    "TICKTICK_OAUTH_PKCE",
    "TICKTICK_TOKEN_SKEW_SECS",
    "TICKTICK_OAUTH_TIMEOUT_SECS",
    "TICKTICK_CREDENTIALS_FILE",
    "TICKTICK_MCP_LOG",
];

/// A port that was free a moment ago.
#[allow(dead_code)]
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[allow(dead_code)]
pub fn credentials_path(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("credentials.env")
}

/// Client credentials whose token endpoint and API live on the mock server.
#[allow(dead_code)]
pub fn credentials(server_uri: &str, redirect_uri: &str) -> ClientCredentials {
    ClientCredentials {
        client_id: "cid".into(),
        client_secret: "csecret".into(),
        redirect_uri: redirect_uri.into(),
        authorization_base_url: format!("{server_uri}/oauth/authorize"),
        token_endpoint_url: format!("{server_uri}/oauth/token"),
        api_base_url: format!("{server_uri}/open/v1"),
        scope: "tasks:read tasks:write".into(),
        auth_method: ClientAuthMethod::Post,
    }
}

#[allow(dead_code)]
pub fn config(server_uri: &str, redirect_uri: &str, path: &Path) -> Config {
    Config {
        deployment: Deployment::Ticktick,
        credentials: credentials(server_uri, redirect_uri),
        settings: AuthSettings {
            skew: Duration::from_secs(60),
            callback_timeout: Duration::from_secs(5),
            pkce: false,
        },
        credentials_path: path.to_path_buf(),
    }
}

#[allow(dead_code)]
pub fn record(access: &str, refresh: Option<&str>, obtained_at: DateTime<Utc>) -> TokenRecord {
    TokenRecord {
        access_token: access.into(),
        refresh_token: refresh.map(str::to_string),
        obtained_at,
        expires_in: Some(Duration::from_secs(3600)),
    }
}

/// A store holding `record`, reloaded so timestamps match what is on disk.
#[allow(dead_code)]
pub fn seeded_store(path: &Path, record: &TokenRecord) -> (Arc<CredentialStore>, TokenRecord) {
    let store = Arc::new(CredentialStore::new(path));
    store.save(record).unwrap();
    let stored = store.load().unwrap().unwrap();
    (store, stored)
}

/// Contents of a credential file as the binary would find it after `auth`.
#[allow(dead_code)]
pub fn credentials_file(with_tokens: bool) -> String {
    let mut out = String::from("TICKTICK_CLIENT_ID=cid\nTICKTICK_CLIENT_SECRET=csecret\n");
    if with_tokens {
        out.push_str(&format!(
            "TICKTICK_ACCESS_TOKEN=A1\nTICKTICK_REFRESH_TOKEN=R1\nTICKTICK_TOKEN_OBTAINED_AT={}\nTICKTICK_TOKEN_EXPIRES_IN=3600\n",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        ));
    }
    out
}
