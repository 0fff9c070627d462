use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde_json::Value;

use crate::error::TicktickError;
use crate::oauth::refresh::TokenRefresher;

/// HTTP client that attaches the stored bearer token to every request and
/// keeps it fresh.
///
/// A stale token is refreshed before sending. A 401 triggers exactly one
/// forced refresh and one retry; a second 401 is reported as
/// [`TicktickError::AuthenticationFailed`].
pub struct AuthenticatedClient {
    http: reqwest::Client,
    refresher: Arc<TokenRefresher>,
    base_url: String,
}

impl std::fmt::Debug for AuthenticatedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl AuthenticatedClient {
    pub fn new(refresher: Arc<TokenRefresher>, base_url: &str) -> Result<Self, TicktickError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| TicktickError::TransportError(Box::new(e)))?;
        Ok(Self {
            http,
            refresher,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn refresher(&self) -> &TokenRefresher {
        &self.refresher
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    async fn dispatch(
        &self,
        method: &Method,
        url: &str,
        body: Option<&Value>,
        access_token: &str,
    ) -> Result<reqwest::Response, TicktickError> {
        let mut request = self
            .http
            .request(method.clone(), url)
            .bearer_auth(access_token);
        if let Some(body) = body {
            request = request.json(body);
        }
        request
            .send()
            .await
            .map_err(|e| TicktickError::TransportError(Box::new(e)))
    }

    /// Send an authenticated request and return the raw response, whatever
    /// its status (other than a persistent 401).
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, TicktickError> {
        let url = self.url(path);
        let stored = self.refresher.current()?;
        let record = self.refresher.ensure_fresh(&stored).await?;

        tracing::debug!(%method, %url, "sending authenticated request");
        let resp = self
            .dispatch(&method, &url, body, &record.access_token)
            .await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        tracing::warn!(%url, "access token rejected with 401; refreshing and retrying once");
        let record = self.refresher.force_refresh(&record).await?;
        let resp = self
            .dispatch(&method, &url, body, &record.access_token)
            .await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(TicktickError::AuthenticationFailed);
        }
        Ok(resp)
    }

    /// Send an authenticated request and decode the JSON body. Non-2xx
    /// responses become [`TicktickError::ApiError`]; an empty body is `{}`.
    pub async fn request_json(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, TicktickError> {
        let resp = self.send(method, path, body).await?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| TicktickError::TransportError(Box::new(e)))?;
        if !status.is_success() {
            return Err(TicktickError::ApiError {
                status: status.as_u16(),
                body: text,
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(&text).map_err(|e| {
            TicktickError::TransportError(format!("invalid JSON in API response: {e}").into())
        })
    }

    pub async fn get(&self, path: &str) -> Result<Value, TicktickError> {
        self.request_json(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, TicktickError> {
        self.request_json(Method::POST, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, TicktickError> {
        self.request_json(Method::DELETE, path, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{ClientAuthMethod, ClientCredentials, Deployment};
    use crate::oauth::store::CredentialStore;
    use crate::oauth::token::{TokenEndpoint, TokenRecord};
    use chrono::Utc;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer, dir: &tempfile::TempDir) -> AuthenticatedClient {
        let store = Arc::new(CredentialStore::new(dir.path().join("credentials.env")));
        store
            .save(&TokenRecord {
                access_token: "A1".into(),
                refresh_token: Some("R1".into()),
                obtained_at: Utc::now(),
                expires_in: Some(Duration::from_secs(3600)),
            })
            .unwrap();
        let credentials = Arc::new(ClientCredentials {
            client_id: "cid".into(),
            client_secret: "csecret".into(),
            redirect_uri: "http://localhost:8000/callback".into(),
            authorization_base_url: Deployment::Ticktick.authorization_url().into(),
            token_endpoint_url: format!("{}/oauth/token", server.uri()),
            api_base_url: format!("{}/open/v1", server.uri()),
            scope: "tasks:read tasks:write".into(),
            auth_method: ClientAuthMethod::Post,
        });
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let refresher = TokenRefresher::new(
            store,
            TokenEndpoint::new(credentials.clone(), clock.clone()),
            clock,
            Duration::from_secs(60),
        );
        AuthenticatedClient::new(Arc::new(refresher), &credentials.api_base_url).unwrap()
    }

    #[tokio::test]
    async fn attaches_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/open/v1/project"))
            .and(header("authorization", "Bearer A1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{"id": "p1"}])))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = client(&server, &dir).await;
        let value = client.get("/project").await.unwrap();
        assert_eq!(value[0]["id"], "p1");
    }

    #[tokio::test]
    async fn empty_body_decodes_as_empty_object() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = client(&server, &dir).await;
        let value = client.delete("project/p1").await.unwrap();
        assert_eq!(value, serde_json::json!({}));
    }

    #[tokio::test]
    async fn non_success_becomes_api_error_without_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/open/v1/project/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = client(&server, &dir).await;
        let err = client.get("project/missing").await.unwrap_err();
        match err {
            TicktickError::ApiError { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn absolute_urls_bypass_base() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let server = MockServer::start().await;
            let dir = tempfile::tempdir().unwrap();
            let client = client(&server, &dir).await;
            assert_eq!(client.url("https://x.test/a"), "https://x.test/a");
            assert_eq!(
                client.url("/project"),
                format!("{}/open/v1/project", server.uri())
            );
        });
    }
}
