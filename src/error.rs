use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum TicktickError {
    #[error("Authorization was denied by the provider: {0}")]
    AuthorizationDenied(String),

    #[error("OAuth callback state did not match this session; refusing to continue")]
    StateMismatch,

    #[error("Timed out waiting for OAuth callback after {}s", .0.as_secs())]
    AuthorizationTimedOut(Duration),

    #[error("Authorization was cancelled before the callback arrived")]
    AuthorizationCancelled,

    #[error("Malformed OAuth callback: {0}")]
    MalformedCallback(String),

    #[error("Cannot listen for the OAuth callback on {addr}: {source}")]
    CallbackPortInUse {
        addr: String,
        source: std::io::Error,
    },

    #[error("{}", format_status("Token exchange failed", *.status, .body))]
    TokenExchangeFailed { status: Option<u16>, body: String },

    #[error("{}", format_status("Token refresh failed", *.status, .detail))]
    RefreshTransientError { status: Option<u16>, detail: String },

    #[error("Stored refresh token was rejected ({detail}). Run: ticktick-mcp auth")]
    ReauthorizationRequired { detail: String },

    #[error("Request is still unauthorized after refreshing the access token")]
    AuthenticationFailed,

    #[error("No stored access token. Run: ticktick-mcp auth")]
    NotAuthenticated,

    #[error("Cannot write credentials to {}: {source}", path.display())]
    PersistError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Error in config {}: {detail}", path.display())]
    ConfigError { path: PathBuf, detail: String },

    #[error("API request failed with status {status}: {body}")]
    ApiError { status: u16, body: String },

    #[error("Transport error: {0}")]
    TransportError(Box<dyn std::error::Error + Send + Sync>),

    #[error("{}", format_tool_not_found(.tool, .suggestion.as_deref()))]
    ToolNotFound {
        tool: String,
        suggestion: Option<String>,
    },

    #[error("Invalid arguments for '{tool}': {detail}")]
    InvalidArguments { tool: String, detail: String },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

fn format_status(prefix: &str, status: Option<u16>, detail: &str) -> String {
    match status {
        Some(code) => format!("{prefix} with status {code}: {detail}"),
        None => format!("{prefix}: {detail}"),
    }
}

fn format_tool_not_found(tool: &str, suggestion: Option<&str>) -> String {
    match suggestion {
        Some(s) => format!("Tool '{tool}' not found. Did you mean '{s}'?"),
        None => format!("Tool '{tool}' not found."),
    }
}

impl TicktickError {
    /// Error code string for structured JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            TicktickError::AuthorizationDenied(_) => "authorization_denied",
            TicktickError::StateMismatch => "state_mismatch",
            TicktickError::AuthorizationTimedOut(_) => "timeout",
            TicktickError::AuthorizationCancelled => "cancelled",
            TicktickError::MalformedCallback(_) => "malformed_callback",
            TicktickError::CallbackPortInUse { .. } => "port_in_use",
            TicktickError::TokenExchangeFailed { .. } => "token_exchange_failed",
            TicktickError::RefreshTransientError { .. } => "refresh_failed",
            TicktickError::ReauthorizationRequired { .. } => "reauthorization_required",
            TicktickError::AuthenticationFailed => "authentication_failed",
            TicktickError::NotAuthenticated => "not_authenticated",
            TicktickError::PersistError { .. } => "persist_error",
            TicktickError::ConfigError { .. } => "config_error",
            TicktickError::ApiError { .. } => "api_error",
            TicktickError::TransportError(_) => "transport_error",
            TicktickError::ToolNotFound { .. } => "not_found",
            TicktickError::InvalidArguments { .. } => "invalid_arguments",
            TicktickError::IoError(_) => "io_error",
        }
    }

    /// True when only a new interactive authorization can fix the error.
    pub fn requires_reauthorization(&self) -> bool {
        matches!(
            self,
            TicktickError::ReauthorizationRequired { .. } | TicktickError::NotAuthenticated
        )
    }

    /// True for failures the caller may retry with backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            TicktickError::AuthorizationTimedOut(_)
            | TicktickError::TokenExchangeFailed { .. }
            | TicktickError::RefreshTransientError { .. }
            | TicktickError::TransportError(_) => true,
            TicktickError::ApiError { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    pub fn tool_name(&self) -> Option<&str> {
        match self {
            TicktickError::ToolNotFound { tool, .. } => Some(tool),
            TicktickError::InvalidArguments { tool, .. } => Some(tool),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TicktickError::TokenExchangeFailed { status, .. } => *status,
            TicktickError::RefreshTransientError { status, .. } => *status,
            TicktickError::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Produce a structured JSON error object.
    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        if let Some(tool) = self.tool_name() {
            obj.insert("tool".into(), serde_json::Value::String(tool.to_string()));
        }
        if let Some(status) = self.status() {
            obj.insert("status".into(), serde_json::Value::from(status));
        }
        obj.insert("message".into(), serde_json::Value::String(self.to_string()));
        obj.insert("code".into(), serde_json::Value::String(self.code().to_string()));
        obj.insert(
            "reauthorize".into(),
            serde_json::Value::Bool(self.requires_reauthorization()),
        );
        serde_json::json!({ "error": obj })
    }
}
