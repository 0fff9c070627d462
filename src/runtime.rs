use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::api::TicktickApi;
use crate::client::AuthenticatedClient;
use crate::clock::{Clock, SystemClock};
use crate::config::{load_config, Config};
use crate::error::TicktickError;
use crate::oauth::{
    AuthorizationFlow, CredentialStore, TokenEndpoint, TokenRecord, TokenRefresher, TokenStatus,
};
use crate::tools::ToolRegistry;
use crate::types::{CallResult, ToolDefinition};

/// Wires configuration, the credential store, the refresher, the
/// authenticated API client and the tool registry together.
pub struct Runtime {
    config: Arc<Config>,
    store: Arc<CredentialStore>,
    clock: Arc<dyn Clock>,
    refresher: Arc<TokenRefresher>,
    api: TicktickApi,
    registry: ToolRegistry,
}

impl Runtime {
    /// Load the configuration from the environment and the credential file.
    pub fn from_config(credentials_path: Option<&Path>) -> Result<Self, TicktickError> {
        Self::with_config(load_config(credentials_path)?)
    }

    pub fn with_config(config: Config) -> Result<Self, TicktickError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self, TicktickError> {
        let config = Arc::new(config);
        let credentials = Arc::new(config.credentials.clone());
        let store = Arc::new(CredentialStore::new(&config.credentials_path));
        let endpoint = TokenEndpoint::new(credentials.clone(), clock.clone());
        let refresher = Arc::new(TokenRefresher::new(
            store.clone(),
            endpoint,
            clock.clone(),
            config.settings.skew,
        ));
        let client = AuthenticatedClient::new(refresher.clone(), &credentials.api_base_url)?;

        Ok(Self {
            config,
            store,
            clock,
            refresher,
            api: TicktickApi::new(Arc::new(client)),
            registry: ToolRegistry::standard(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn api(&self) -> &TicktickApi {
        &self.api
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// A new interactive authorization flow against the configured client.
    pub fn authorization_flow(&self) -> AuthorizationFlow {
        AuthorizationFlow::new(
            Arc::new(self.config.credentials.clone()),
            self.config.settings.clone(),
            self.store.clone(),
            self.clock.clone(),
        )
    }

    pub fn status(&self) -> Result<TokenStatus, TicktickError> {
        let record = self.store.load()?;
        Ok(TokenStatus::of(
            record.as_ref(),
            self.clock.now(),
            self.config.settings.skew,
        ))
    }

    /// Refresh the stored token now, whatever its expiry.
    pub async fn refresh(&self) -> Result<TokenRecord, TicktickError> {
        let record = self.refresher.current()?;
        self.refresher.force_refresh(&record).await
    }

    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    pub async fn call_tool(&self, tool: &str, args: Value) -> Result<CallResult, TicktickError> {
        self.registry.call(&self.api, tool, args).await
    }
}
