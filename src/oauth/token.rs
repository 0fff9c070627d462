use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::config::{ClientAuthMethod, ClientCredentials};
use crate::error::TicktickError;

/// The persisted bearer credential. Always replaced whole.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub obtained_at: DateTime<Utc>,
    /// Lifetime last reported by the token endpoint.
    pub expires_in: Option<Duration>,
}

impl TokenRecord {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let lifetime = chrono::Duration::from_std(self.expires_in?).ok()?;
        self.obtained_at.checked_add_signed(lifetime)
    }

    /// `now >= obtained_at + expires_in - skew`. Records without a lifetime
    /// never expire locally.
    pub fn is_expired_at(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        let Some(expires_at) = self.expires_at() else {
            return false;
        };
        let skew = chrono::Duration::from_std(skew).unwrap_or_else(|_| chrono::Duration::zero());
        let deadline = expires_at.checked_sub_signed(skew).unwrap_or(expires_at);
        now >= deadline
    }

    pub fn seconds_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at().map(|at| (at - now).num_seconds())
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

impl std::fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("obtained_at", &self.obtained_at)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// What the stored record means right now, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TokenStatus {
    NotAuthenticated,
    /// `seconds_remaining` is absent when the provider gave no lifetime.
    Valid { seconds_remaining: Option<i64> },
    /// Inside the skew window; the next call refreshes first.
    Expiring { seconds_remaining: i64 },
    Expired { can_refresh: bool },
}

impl TokenStatus {
    pub fn of(record: Option<&TokenRecord>, now: DateTime<Utc>, skew: Duration) -> Self {
        let Some(record) = record else {
            return TokenStatus::NotAuthenticated;
        };
        match record.seconds_remaining(now) {
            None => TokenStatus::Valid {
                seconds_remaining: None,
            },
            Some(remaining) if remaining <= 0 => TokenStatus::Expired {
                can_refresh: record.can_refresh(),
            },
            Some(remaining) if record.is_expired_at(now, skew) => TokenStatus::Expiring {
                seconds_remaining: remaining,
            },
            Some(remaining) => TokenStatus::Valid {
                seconds_remaining: Some(remaining),
            },
        }
    }
}

/// Raw token response from the OAuth server.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl TokenResponse {
    fn into_record(self, obtained_at: DateTime<Utc>, previous_refresh: Option<&str>) -> TokenRecord {
        let refresh_token = self
            .refresh_token
            .filter(|t| !t.is_empty())
            .or_else(|| previous_refresh.map(str::to_string));
        TokenRecord {
            access_token: self.access_token,
            refresh_token,
            obtained_at,
            expires_in: self.expires_in.map(Duration::from_secs),
        }
    }
}

/// Why a refresh did not produce a record. Cloneable so one outcome can be
/// handed to every caller waiting on the same refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshFailure {
    /// The refresh token itself is invalid or revoked.
    Rejected { detail: String },
    Transient { status: Option<u16>, detail: String },
    Persist {
        path: PathBuf,
        kind: std::io::ErrorKind,
        message: String,
    },
}

impl From<RefreshFailure> for TicktickError {
    fn from(failure: RefreshFailure) -> Self {
        match failure {
            RefreshFailure::Rejected { detail } => TicktickError::ReauthorizationRequired { detail },
            RefreshFailure::Transient { status, detail } => {
                TicktickError::RefreshTransientError { status, detail }
            }
            RefreshFailure::Persist {
                path,
                kind,
                message,
            } => TicktickError::PersistError {
                path,
                source: std::io::Error::new(kind, message),
            },
        }
    }
}

impl RefreshFailure {
    pub(crate) fn from_error(err: &TicktickError) -> Self {
        match err {
            TicktickError::ReauthorizationRequired { detail } => RefreshFailure::Rejected {
                detail: detail.clone(),
            },
            TicktickError::RefreshTransientError { status, detail } => RefreshFailure::Transient {
                status: *status,
                detail: detail.clone(),
            },
            TicktickError::PersistError { path, source } => RefreshFailure::Persist {
                path: path.clone(),
                kind: source.kind(),
                message: source.to_string(),
            },
            other => RefreshFailure::Transient {
                status: other.status(),
                detail: other.to_string(),
            },
        }
    }
}

/// Status codes meaning the refresh token is no longer usable.
fn is_rejection(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 400 | 401 | 403)
}

/// Client for the provider's token endpoint.
pub struct TokenEndpoint {
    http: reqwest::Client,
    credentials: Arc<ClientCredentials>,
    clock: Arc<dyn Clock>,
}

impl TokenEndpoint {
    pub fn new(credentials: Arc<ClientCredentials>, clock: Arc<dyn Clock>) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
            clock,
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn credentials(&self) -> &ClientCredentials {
        &self.credentials
    }

    fn post_form(&self, mut params: Vec<(&'static str, String)>) -> reqwest::RequestBuilder {
        let creds = &self.credentials;
        let request = self.http.post(&creds.token_endpoint_url);
        match creds.auth_method {
            ClientAuthMethod::Post => {
                params.push(("client_id", creds.client_id.clone()));
                params.push(("client_secret", creds.client_secret.clone()));
                request.form(&params)
            }
            ClientAuthMethod::Basic => request
                .basic_auth(&creds.client_id, Some(&creds.client_secret))
                .form(&params),
        }
    }

    /// Exchange an authorization code for a token record.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenRecord, TicktickError> {
        let mut params = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", self.credentials.redirect_uri.clone()),
        ];
        if let Some(verifier) = code_verifier {
            params.push(("code_verifier", verifier.to_string()));
        }

        tracing::debug!(
            endpoint = %self.credentials.token_endpoint_url,
            "exchanging authorization code"
        );
        let resp = self
            .post_form(params)
            .send()
            .await
            .map_err(|e| TicktickError::TokenExchangeFailed {
                status: None,
                body: format!("request failed: {e}"),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TicktickError::TokenExchangeFailed {
                status: Some(status.as_u16()),
                body,
            });
        }

        let token_resp: TokenResponse =
            resp.json()
                .await
                .map_err(|e| TicktickError::TokenExchangeFailed {
                    status: Some(status.as_u16()),
                    body: format!("failed to parse token response: {e}"),
                })?;

        Ok(token_resp.into_record(self.clock.now(), None))
    }

    /// Run the `refresh_token` grant. The prior refresh token is kept when
    /// the response omits a new one.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenRecord, RefreshFailure> {
        let params = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.to_string()),
        ];

        let resp = self
            .post_form(params)
            .send()
            .await
            .map_err(|e| RefreshFailure::Transient {
                status: None,
                detail: format!("request failed: {e}"),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            if is_rejection(status) {
                return Err(RefreshFailure::Rejected {
                    detail: format!("token endpoint returned {}: {body}", status.as_u16()),
                });
            }
            return Err(RefreshFailure::Transient {
                status: Some(status.as_u16()),
                detail: body,
            });
        }

        let token_resp: TokenResponse = resp.json().await.map_err(|e| RefreshFailure::Transient {
            status: Some(status.as_u16()),
            detail: format!("failed to parse refresh token response: {e}"),
        })?;

        Ok(token_resp.into_record(self.clock.now(), Some(refresh_token)))
    }
}
