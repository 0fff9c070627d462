use std::time::Duration;

use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[allow(dead_code)]
pub fn token_body(access: &str, refresh: Option<&str>) -> serde_json::Value {
    let mut body = serde_json::json!({
        "access_token": access,
        "token_type": "bearer",
        "expires_in": 3600,
        "scope": "tasks:read tasks:write"
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = serde_json::Value::String(refresh.to_string());
    }
    body
}

/// Token endpoint answering the `grant_type` grant with a new pair, expected
/// to be hit exactly `times` times.
#[allow(dead_code)]
pub async fn mount_token_grant(
    server: &MockServer,
    grant_type: &str,
    access: &str,
    refresh: Option<&str>,
    delay: Duration,
    times: u64,
) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains(format!("grant_type={grant_type}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body(access, refresh))
                .set_delay(delay),
        )
        .expect(times)
        .mount(server)
        .await;
}

/// Token endpoint failing every request with `status` and `body`.
#[allow(dead_code)]
pub async fn mount_token_failure(server: &MockServer, status: u16, body: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .expect(times)
        .mount(server)
        .await;
}

/// The token endpoint must never be called.
#[allow(dead_code)]
pub async fn forbid_token_requests(server: &MockServer) {
    Mock::given(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(server)
        .await;
}
