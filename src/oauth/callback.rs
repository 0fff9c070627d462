use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::error::TicktickError;
use crate::oauth::state::AuthorizationState;

const MAX_REQUEST_BYTES: usize = 8192;

const SUCCESS_HTML: &str = "<!DOCTYPE html><html><body><h1>Authentication successful!</h1>\
     <p>You can close this window and return to the terminal.</p></body></html>";
const FAILURE_HTML: &str = "<!DOCTYPE html><html><body><h1>Authentication failed</h1>\
     <p>You can close this window and retry from the terminal.</p></body></html>";

/// Query parameters carried by the provider's redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// A listener bound to the redirect URI's host and port that serves exactly
/// one request.
#[derive(Debug)]
pub struct CallbackListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    path: String,
}

impl CallbackListener {
    /// Bind to the redirect URI's host and port. An occupied port fails
    /// immediately with [`TicktickError::CallbackPortInUse`].
    pub async fn bind(redirect_uri: &str) -> Result<Self, TicktickError> {
        let url = reqwest::Url::parse(redirect_uri).map_err(|e| TicktickError::ConfigError {
            path: "<redirect_uri>".into(),
            detail: format!("invalid redirect URI '{redirect_uri}': {e}"),
        })?;
        let port = url.port_or_known_default().unwrap_or(80);
        let ip = match url.host_str() {
            Some("localhost") | None => IpAddr::V4(Ipv4Addr::LOCALHOST),
            Some(host) => host
                .trim_start_matches('[')
                .trim_end_matches(']')
                .parse::<IpAddr>()
                .map_err(|_| TicktickError::ConfigError {
                    path: "<redirect_uri>".into(),
                    detail: format!(
                        "redirect URI host '{host}' must be localhost or an IP address"
                    ),
                })?,
        };
        let addr = SocketAddr::new(ip, port);

        let listener = TcpListener::bind(addr).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                TicktickError::CallbackPortInUse {
                    addr: addr.to_string(),
                    source: e,
                }
            } else {
                TicktickError::IoError(e)
            }
        })?;
        let local_addr = listener.local_addr()?;
        tracing::debug!(%local_addr, "listening for OAuth callback");

        Ok(Self {
            listener,
            local_addr,
            path: url.path().to_string(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the single redirect and return its authorization code.
    ///
    /// The listener stops accepting as soon as the first connection arrives,
    /// whatever that request contains. The wait ends with
    /// [`TicktickError::AuthorizationTimedOut`] after `timeout`, or with
    /// [`TicktickError::AuthorizationCancelled`] when `shutdown` completes.
    pub async fn wait_for_code<F>(
        self,
        state: &mut AuthorizationState,
        timeout: Duration,
        shutdown: F,
    ) -> Result<String, TicktickError>
    where
        F: Future<Output = ()>,
    {
        let listener = self.listener;
        let receive = async move {
            let (stream, peer) = listener.accept().await?;
            drop(listener);
            tracing::debug!(%peer, "OAuth callback connection accepted");
            read_request_target(stream).await
        };

        let (mut stream, target) = tokio::select! {
            received = tokio::time::timeout(timeout, receive) => {
                received.map_err(|_| TicktickError::AuthorizationTimedOut(timeout))??
            }
            _ = shutdown => return Err(TicktickError::AuthorizationCancelled),
        };

        let outcome = validate_callback(&target, &self.path, state);
        let (status, body) = match outcome {
            Ok(_) => ("200 OK", SUCCESS_HTML),
            Err(_) => ("400 Bad Request", FAILURE_HTML),
        };
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let _ = stream.write_all(response.as_bytes()).await;
        let _ = stream.shutdown().await;

        outcome
    }
}

async fn read_request_target(mut stream: TcpStream) -> Result<(TcpStream, String), TicktickError> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(2).any(|w| w == b"\r\n") || buf.len() >= MAX_REQUEST_BYTES {
            break;
        }
    }
    if buf.is_empty() {
        return Err(TicktickError::MalformedCallback(
            "empty callback request".into(),
        ));
    }

    let request = String::from_utf8_lossy(&buf);
    let first_line = request.lines().next().unwrap_or_default();
    let mut parts = first_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();
    if method != "GET" || target.is_empty() {
        return Err(TicktickError::MalformedCallback(format!(
            "expected a GET request, got '{first_line}'"
        )));
    }
    let target = target.to_string();
    Ok((stream, target))
}

/// Parse the request target (`/callback?code=...&state=...`).
pub fn parse_callback_target(target: &str) -> Result<(String, CallbackParams), TicktickError> {
    let url = reqwest::Url::parse(&format!("http://localhost{target}"))
        .map_err(|e| TicktickError::MalformedCallback(format!("invalid request target: {e}")))?;

    let mut params = CallbackParams::default();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => params.code = Some(value.into_owned()),
            "state" => params.state = Some(value.into_owned()),
            "error" => params.error = Some(value.into_owned()),
            "error_description" => params.error_description = Some(value.into_owned()),
            _ => {}
        }
    }
    Ok((url.path().to_string(), params))
}

/// Check the callback against the pending attempt: the path, then the state,
/// then the provider's `error`, then the code. A forged state is never
/// reported as a provider error and never reaches the token endpoint.
fn validate_callback(
    target: &str,
    expected_path: &str,
    state: &mut AuthorizationState,
) -> Result<String, TicktickError> {
    let (path, params) = parse_callback_target(target)?;
    if path != expected_path {
        return Err(TicktickError::MalformedCallback(format!(
            "unexpected callback path '{path}'"
        )));
    }
    if !state.redeem(params.state.as_deref()) {
        return Err(TicktickError::StateMismatch);
    }
    if let Some(error) = params.error {
        let detail = match params.error_description {
            Some(desc) if !desc.is_empty() => format!("{error}: {desc}"),
            _ => error,
        };
        return Err(TicktickError::AuthorizationDenied(detail));
    }
    params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| {
            TicktickError::MalformedCallback("no authorization code in callback".into())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn send_raw(addr: SocketAddr, request: String) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    fn get(path_and_query: &str) -> String {
        format!("GET {path_and_query} HTTP/1.1\r\nHost: localhost\r\n\r\n")
    }

    #[test]
    fn parse_target_extracts_params() {
        let (path, params) =
            parse_callback_target("/callback?code=abc%20123&state=xyz").unwrap();
        assert_eq!(path, "/callback");
        assert_eq!(params.code.as_deref(), Some("abc 123"));
        assert_eq!(params.state.as_deref(), Some("xyz"));
        assert!(params.error.is_none());
    }

    #[test]
    fn parse_target_with_provider_error() {
        let (_, params) = parse_callback_target(
            "/callback?error=access_denied&error_description=user+declined&state=xyz",
        )
        .unwrap();
        assert_eq!(params.error.as_deref(), Some("access_denied"));
        assert_eq!(params.error_description.as_deref(), Some("user declined"));
        assert!(params.code.is_none());
    }

    #[test]
    fn validate_rejects_state_mismatch_before_code() {
        let mut state = AuthorizationState::new(false);
        let err = validate_callback("/callback?code=abc&state=forged", "/callback", &mut state)
            .unwrap_err();
        assert!(matches!(err, TicktickError::StateMismatch));
    }

    #[test]
    fn validate_rejects_missing_state() {
        let mut state = AuthorizationState::new(false);
        let err = validate_callback("/callback?code=abc", "/callback", &mut state).unwrap_err();
        assert!(matches!(err, TicktickError::StateMismatch));
    }

    #[test]
    fn validate_maps_provider_error_to_denied() {
        let mut state = AuthorizationState::new(false);
        let target = format!(
            "/callback?error=access_denied&error_description=nope&state={}",
            state.nonce()
        );
        let err = validate_callback(&target, "/callback", &mut state).unwrap_err();
        match err {
            TicktickError::AuthorizationDenied(detail) => {
                assert_eq!(detail, "access_denied: nope")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_empty_code() {
        let mut state = AuthorizationState::new(false);
        let target = format!("/callback?code=&state={}", state.nonce());
        let err = validate_callback(&target, "/callback", &mut state).unwrap_err();
        assert!(matches!(err, TicktickError::MalformedCallback(_)));
    }

    #[test]
    fn validate_rejects_wrong_path() {
        let mut state = AuthorizationState::new(false);
        let target = format!("/favicon.ico?code=abc&state={}", state.nonce());
        let err = validate_callback(&target, "/callback", &mut state).unwrap_err();
        assert!(matches!(err, TicktickError::MalformedCallback(_)));
        // The path is checked before the state, so the attempt is still open.
        assert!(state.is_pending());

        let err = validate_callback("/favicon.ico?state=forged", "/callback", &mut state)
            .unwrap_err();
        assert!(matches!(err, TicktickError::MalformedCallback(_)));
    }

    #[tokio::test]
    async fn serves_one_request_then_closes() {
        let listener = CallbackListener::bind("http://127.0.0.1:0/callback")
            .await
            .unwrap();
        let addr = listener.local_addr();
        let mut state = AuthorizationState::new(false);
        let target = format!("/callback?code=abc123&state={}", state.nonce());

        let client = tokio::spawn(async move { send_raw(addr, get(&target)).await });
        let code = listener
            .wait_for_code(&mut state, Duration::from_secs(5), std::future::pending())
            .await
            .unwrap();
        assert_eq!(code, "abc123");

        let response = client.await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("Authentication successful"));
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn failed_callback_gets_error_page() {
        let listener = CallbackListener::bind("http://127.0.0.1:0/callback")
            .await
            .unwrap();
        let addr = listener.local_addr();
        let mut state = AuthorizationState::new(false);

        let client = tokio::spawn(async move {
            send_raw(addr, get("/callback?code=abc&state=forged")).await
        });
        let err = listener
            .wait_for_code(&mut state, Duration::from_secs(5), std::future::pending())
            .await
            .unwrap_err();
        assert!(matches!(err, TicktickError::StateMismatch));
        assert!(client.await.unwrap().starts_with("HTTP/1.1 400"));
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn times_out_and_releases_port() {
        let listener = CallbackListener::bind("http://127.0.0.1:0/callback")
            .await
            .unwrap();
        let addr = listener.local_addr();
        let mut state = AuthorizationState::new(false);
        let err = listener
            .wait_for_code(&mut state, Duration::from_millis(50), std::future::pending())
            .await
            .unwrap_err();
        assert!(matches!(err, TicktickError::AuthorizationTimedOut(_)));
        // The port is free again.
        let rebound = CallbackListener::bind(&format!("http://{addr}/callback")).await;
        assert!(rebound.is_ok());
    }

    #[tokio::test]
    async fn shutdown_cancels_wait() {
        let listener = CallbackListener::bind("http://127.0.0.1:0/callback")
            .await
            .unwrap();
        let mut state = AuthorizationState::new(false);
        let err = listener
            .wait_for_code(&mut state, Duration::from_secs(30), async {})
            .await
            .unwrap_err();
        assert!(matches!(err, TicktickError::AuthorizationCancelled));
    }

    #[tokio::test]
    async fn occupied_port_fails_fast() {
        let holder = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = holder.local_addr().unwrap().port();
        let err = CallbackListener::bind(&format!("http://localhost:{port}/callback"))
            .await
            .unwrap_err();
        assert!(matches!(err, TicktickError::CallbackPortInUse { .. }));
        assert!(err.to_string().contains(&port.to_string()));
    }
}
