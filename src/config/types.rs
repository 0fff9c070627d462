use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Provider deployment. Both share one protocol and differ only in hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Deployment {
    #[default]
    Ticktick,
    Dida365,
}

impl Deployment {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ticktick" => Some(Deployment::Ticktick),
            "dida365" | "dida" => Some(Deployment::Dida365),
            _ => None,
        }
    }

    /// Infer the deployment from an API base URL such as
    /// `https://api.dida365.com/open/v1`.
    pub fn from_base_url(url: &str) -> Self {
        if url.contains("dida365.com") {
            Deployment::Dida365
        } else {
            Deployment::Ticktick
        }
    }

    pub fn authorization_url(self) -> &'static str {
        match self {
            Deployment::Ticktick => "https://ticktick.com/oauth/authorize",
            Deployment::Dida365 => "https://dida365.com/oauth/authorize",
        }
    }

    pub fn token_url(self) -> &'static str {
        match self {
            Deployment::Ticktick => "https://ticktick.com/oauth/token",
            Deployment::Dida365 => "https://dida365.com/oauth/token",
        }
    }

    pub fn api_base_url(self) -> &'static str {
        match self {
            Deployment::Ticktick => "https://api.ticktick.com/open/v1",
            Deployment::Dida365 => "https://api.dida365.com/open/v1",
        }
    }
}

/// How the client authenticates itself at the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientAuthMethod {
    /// `client_id` and `client_secret` in the form body.
    #[default]
    Post,
    /// HTTP Basic `client_id:client_secret`.
    Basic,
}

impl ClientAuthMethod {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "post" | "client_secret_post" => Some(ClientAuthMethod::Post),
            "basic" | "client_secret_basic" => Some(ClientAuthMethod::Basic),
            _ => None,
        }
    }
}

/// OAuth client registration and provider endpoints. Immutable once loaded.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorization_base_url: String,
    pub token_endpoint_url: String,
    pub api_base_url: String,
    pub scope: String,
    pub auth_method: ClientAuthMethod,
}

impl ClientCredentials {
    /// Key used to serialize refreshes for the same client registration.
    pub fn identity(&self) -> String {
        format!("{}@{}", self.client_id, self.token_endpoint_url)
    }
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("authorization_base_url", &self.authorization_base_url)
            .field("token_endpoint_url", &self.token_endpoint_url)
            .field("api_base_url", &self.api_base_url)
            .field("scope", &self.scope)
            .field("auth_method", &self.auth_method)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    /// Safety margin subtracted from the token lifetime.
    pub skew: Duration,
    /// How long the callback listener waits for the browser redirect.
    pub callback_timeout: Duration,
    /// Send an S256 PKCE challenge with the authorization request.
    pub pkce: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            skew: Duration::from_secs(60),
            callback_timeout: Duration::from_secs(120),
            pkce: false,
        }
    }
}

/// Everything loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub deployment: Deployment,
    pub credentials: ClientCredentials,
    pub settings: AuthSettings,
    pub credentials_path: PathBuf,
}
