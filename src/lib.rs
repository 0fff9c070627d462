pub mod api;
pub mod args;
pub mod cli;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod oauth;
pub mod runtime;
pub mod tools;
pub mod types;

pub use api::TicktickApi;
pub use client::AuthenticatedClient;
pub use config::{load_config, ClientCredentials, Config};
pub use error::TicktickError;
pub use oauth::{AuthorizationFlow, CredentialStore, TokenRecord, TokenRefresher};
pub use runtime::Runtime;
pub use tools::ToolRegistry;
pub use types::{CallResult, ContentBlock, ToolDefinition};

/// One-shot convenience function: load the configuration and call a tool.
pub async fn call_once(tool: &str, args: serde_json::Value) -> Result<CallResult, TicktickError> {
    let runtime = Runtime::from_config(None)?;
    runtime.call_tool(tool, args).await
}
