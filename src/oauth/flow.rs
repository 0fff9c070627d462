use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::{AuthSettings, ClientCredentials};
use crate::error::TicktickError;
use crate::oauth::callback::CallbackListener;
use crate::oauth::state::AuthorizationState;
use crate::oauth::store::CredentialStore;
use crate::oauth::token::{TokenEndpoint, TokenRecord};

/// The interactive authorization-code flow: browser consent, one local
/// callback, code exchange, persistence.
pub struct AuthorizationFlow {
    credentials: Arc<ClientCredentials>,
    settings: AuthSettings,
    store: Arc<CredentialStore>,
    endpoint: TokenEndpoint,
    open_browser: bool,
}

impl AuthorizationFlow {
    pub fn new(
        credentials: Arc<ClientCredentials>,
        settings: AuthSettings,
        store: Arc<CredentialStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let endpoint = TokenEndpoint::new(credentials.clone(), clock);
        Self {
            credentials,
            settings,
            store,
            endpoint,
            open_browser: true,
        }
    }

    pub fn with_browser(mut self, open_browser: bool) -> Self {
        self.open_browser = open_browser;
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.endpoint = self.endpoint.with_http_client(http);
        self
    }

    /// Bind the callback listener, then send the user to the consent page.
    /// Nothing is opened if the redirect port cannot be bound.
    pub async fn begin(&self) -> Result<PendingAuthorization<'_>, TicktickError> {
        let listener = CallbackListener::bind(&self.credentials.redirect_uri).await?;
        let state = AuthorizationState::new(self.settings.pkce);
        let url = authorization_url(&self.credentials, &state)?;

        tracing::info!(
            callback = %listener.local_addr(),
            "waiting for authorization; open this URL if no browser appears: {url}"
        );
        if self.open_browser {
            if let Err(e) = webbrowser::open(&url) {
                tracing::warn!("could not open browser automatically: {e}");
            }
        }

        Ok(PendingAuthorization {
            flow: self,
            listener,
            state,
            url,
        })
    }

    /// Run the whole flow and return the persisted record.
    pub async fn run<F>(&self, shutdown: F) -> Result<TokenRecord, TicktickError>
    where
        F: Future<Output = ()>,
    {
        self.begin().await?.complete(shutdown).await
    }
}

/// An authorization attempt whose consent page has been issued.
pub struct PendingAuthorization<'a> {
    flow: &'a AuthorizationFlow,
    listener: CallbackListener,
    state: AuthorizationState,
    url: String,
}

impl PendingAuthorization<'_> {
    pub fn authorization_url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> &str {
        self.state.nonce()
    }

    pub fn callback_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Wait for the callback, exchange the code and save the record. The
    /// store is untouched on any failure.
    pub async fn complete<F>(self, shutdown: F) -> Result<TokenRecord, TicktickError>
    where
        F: Future<Output = ()>,
    {
        let Self {
            flow,
            listener,
            mut state,
            ..
        } = self;

        let code = listener
            .wait_for_code(&mut state, flow.settings.callback_timeout, shutdown)
            .await?;
        tracing::debug!("authorization code received");

        let verifier = state.pkce().map(|p| p.code_verifier.as_str());
        let record = flow.endpoint.exchange_code(&code, verifier).await?;
        flow.store.save(&record)?;
        tracing::info!(
            path = %flow.store.path().display(),
            expires_in = ?record.expires_in,
            "authorization complete"
        );
        Ok(record)
    }
}

/// The provider consent URL for one attempt.
pub fn authorization_url(
    credentials: &ClientCredentials,
    state: &AuthorizationState,
) -> Result<String, TicktickError> {
    let mut params = vec![
        ("response_type", "code"),
        ("client_id", credentials.client_id.as_str()),
        ("redirect_uri", credentials.redirect_uri.as_str()),
        ("scope", credentials.scope.as_str()),
        ("state", state.nonce()),
    ];
    if let Some(pkce) = state.pkce() {
        params.push(("code_challenge", pkce.code_challenge.as_str()));
        params.push(("code_challenge_method", "S256"));
    }
    reqwest::Url::parse_with_params(&credentials.authorization_base_url, &params)
        .map(String::from)
        .map_err(|e| TicktickError::ConfigError {
            path: "<authorization_url>".into(),
            detail: format!(
                "invalid authorization URL '{}': {e}",
                credentials.authorization_base_url
            ),
        })
}
