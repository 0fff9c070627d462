use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use tokio::sync::watch;

use crate::clock::Clock;
use crate::error::TicktickError;
use crate::oauth::store::CredentialStore;
use crate::oauth::token::{RefreshFailure, TokenEndpoint, TokenRecord};

type Outcome = Option<Result<TokenRecord, RefreshFailure>>;

/// Refreshes in progress, keyed by client identity and store path. Shared by
/// every refresher in the process so two handles on the same credentials
/// never spend one refresh token twice.
fn in_flight() -> &'static Mutex<HashMap<String, watch::Receiver<Outcome>>> {
    static IN_FLIGHT: OnceLock<Mutex<HashMap<String, watch::Receiver<Outcome>>>> =
        OnceLock::new();
    IN_FLIGHT.get_or_init(|| Mutex::new(HashMap::new()))
}

enum Role {
    Leader(watch::Sender<Outcome>),
    Follower(watch::Receiver<Outcome>),
}

/// Clears the registry entry when the leader finishes or is dropped.
struct FlightGuard<'a> {
    key: &'a str,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        in_flight()
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(self.key);
    }
}

/// Keeps the stored access token usable, running at most one refresh at a
/// time per set of credentials.
pub struct TokenRefresher {
    store: Arc<CredentialStore>,
    endpoint: TokenEndpoint,
    clock: Arc<dyn Clock>,
    skew: Duration,
    flight_key: String,
}

impl TokenRefresher {
    pub fn new(
        store: Arc<CredentialStore>,
        endpoint: TokenEndpoint,
        clock: Arc<dyn Clock>,
        skew: Duration,
    ) -> Self {
        let flight_key = format!(
            "{}|{}",
            endpoint.credentials().identity(),
            store.path().display()
        );
        Self {
            store,
            endpoint,
            clock,
            skew,
            flight_key,
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// The stored record as is, or [`TicktickError::NotAuthenticated`].
    pub fn current(&self) -> Result<TokenRecord, TicktickError> {
        self.store.load()?.ok_or(TicktickError::NotAuthenticated)
    }

    /// `record` itself while it is fresh, otherwise its refreshed
    /// replacement.
    pub async fn ensure_fresh(&self, record: &TokenRecord) -> Result<TokenRecord, TicktickError> {
        if !record.is_expired_at(self.clock.now(), self.skew) {
            tracing::debug!("access token fresh, no refresh");
            return Ok(record.clone());
        }
        tracing::debug!(
            expires_at = ?record.expires_at(),
            "access token expired or about to expire"
        );
        self.refresh_replacing(&record.access_token).await
    }

    /// Refresh regardless of the local expiry, typically after the server
    /// rejected `record`. If another caller has already replaced it with a
    /// fresh record, that one is returned without a new request.
    pub async fn force_refresh(&self, record: &TokenRecord) -> Result<TokenRecord, TicktickError> {
        self.refresh_replacing(&record.access_token).await
    }

    async fn refresh_replacing(&self, stale: &str) -> Result<TokenRecord, TicktickError> {
        loop {
            let role = {
                let mut flights = in_flight().lock().unwrap_or_else(|e| e.into_inner());
                match flights.get(&self.flight_key) {
                    Some(rx) => Role::Follower(rx.clone()),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        flights.insert(self.flight_key.clone(), rx);
                        Role::Leader(tx)
                    }
                }
            };

            match role {
                Role::Leader(tx) => {
                    let _guard = FlightGuard {
                        key: &self.flight_key,
                    };
                    let outcome = self.refresh_locked(stale).await;
                    let _ = tx.send(Some(outcome.clone()));
                    return outcome.map_err(TicktickError::from);
                }
                Role::Follower(mut rx) => {
                    tracing::debug!("waiting for in-flight token refresh");
                    let outcome = match rx.wait_for(Option::is_some).await {
                        Ok(outcome) => outcome.clone(),
                        // The leader was dropped before finishing; take over.
                        Err(_) => continue,
                    };
                    if let Some(outcome) = outcome {
                        return outcome.map_err(TicktickError::from);
                    }
                }
            }
        }
    }

    async fn refresh_locked(&self, stale: &str) -> Result<TokenRecord, RefreshFailure> {
        let current = self
            .store
            .load()
            .map_err(|e| RefreshFailure::from_error(&e))?
            .ok_or_else(|| RefreshFailure::Rejected {
                detail: "no stored credentials".into(),
            })?;

        if current.access_token != stale && !current.is_expired_at(self.clock.now(), self.skew) {
            tracing::debug!("access token already refreshed elsewhere");
            return Ok(current);
        }

        let Some(refresh_token) = current.refresh_token.as_deref().filter(|t| !t.is_empty())
        else {
            tracing::warn!("no refresh token stored; re-authorization required");
            return Err(RefreshFailure::Rejected {
                detail: "no refresh token stored".into(),
            });
        };

        tracing::info!("refreshing access token");
        let record = match self.endpoint.refresh(refresh_token).await {
            Ok(record) => record,
            Err(failure) => {
                match &failure {
                    RefreshFailure::Rejected { detail } => {
                        tracing::warn!(%detail, "refresh token rejected; re-authorization required")
                    }
                    RefreshFailure::Transient { status, detail } => {
                        tracing::warn!(?status, %detail, "token refresh failed")
                    }
                    RefreshFailure::Persist { .. } => {}
                }
                return Err(failure);
            }
        };

        self.store
            .save(&record)
            .map_err(|e| RefreshFailure::from_error(&e))?;
        tracing::info!(expires_in = ?record.expires_in, "access token refreshed");
        Ok(record)
    }
}
