use axum::http::StatusCode;
use axum_test::TestServer;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;
use vk_identity_oauth2::{InMemoryStateStore, OAuth2Config, VkProvider, VkProviderConfig};
use vk_login_server::routes::{AppState, router};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REDIRECT_URI: &str = "http://localhost:3000/auth/vk/callback";

async fn setup() -> (MockServer, TestServer) {
    let mock_server = MockServer::start().await;

    let provider_config = VkProviderConfig::new("51234567", "mock_secret", REDIRECT_URI)
        .with_endpoints(
            format!("{}/authorize", mock_server.uri()),
            format!("{}/oauth2/auth", mock_server.uri()),
            format!("{}/method/users.get", mock_server.uri()),
        );
    let provider = VkProvider::new(
        provider_config,
        OAuth2Config::default().with_http_timeout(5),
        Arc::new(InMemoryStateStore::new()),
    )
    .unwrap();

    let server = TestServer::new(router(AppState {
        provider: Arc::new(provider),
    }))
    .unwrap();

    (mock_server, server)
}

/// Follow the login redirect by hand and return its query parameters.
async fn start_login(server: &TestServer, device_id: &str) -> HashMap<String, String> {
    let response = server
        .get("/auth/vk/login")
        .add_query_param("device_id", device_id)
        .await;
    response.assert_status(StatusCode::SEE_OTHER);

    let location = response.header("location");
    let url = Url::parse(location.to_str().unwrap()).unwrap();
    url.query_pairs().into_owned().collect()
}

#[tokio::test]
async fn test_health() {
    let (_mock_server, server) = setup().await;

    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("ok");
}

#[tokio::test]
async fn test_providers_lists_vk() {
    let (_mock_server, server) = setup().await;

    let response = server.get("/auth/providers").await;
    response.assert_status_ok();

    let providers: serde_json::Value = response.json();
    assert_eq!(providers[0]["id"], "vk");
    assert_eq!(providers[0]["type"], "oauth");
    assert_eq!(providers[0]["checks"], serde_json::json!(["pkce", "state"]));
}

#[tokio::test]
async fn test_login_redirects_to_vk_with_device_id() {
    let (_mock_server, server) = setup().await;

    let params = start_login(&server, "device-xyz").await;
    assert_eq!(params.get("device_id").map(String::as_str), Some("device-xyz"));
    assert_eq!(params.get("code_challenge_method").map(String::as_str), Some("S256"));
    assert!(params.contains_key("state"));
}

#[tokio::test]
async fn test_callback_returns_profile() {
    let (mock_server, server) = setup().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/auth"))
        .and(body_string_contains("device_id=device-xyz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "vk_access_token",
            "expires_in": 3600,
            "user_id": 42
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/method/users.get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "response": [{
                "id": 42,
                "first_name": "Ada",
                "last_name": "Lovelace",
                "photo_100": "http://x/y.png"
            }]
        })))
        .mount(&mock_server)
        .await;

    let params = start_login(&server, "device-xyz").await;

    // The host strips device_id from the callback; only code and state come back
    let response = server
        .get("/auth/vk/callback")
        .add_query_param("code", "auth-code")
        .add_query_param("state", &params["state"])
        .await;
    response.assert_status_ok();

    let profile: serde_json::Value = response.json();
    assert_eq!(profile["id"], 42);
    assert_eq!(profile["name"], "Ada Lovelace");
    assert_eq!(profile["email"], serde_json::Value::Null);
    assert_eq!(profile["image"], "http://x/y.png");
}

#[tokio::test]
async fn test_failed_exchange_shows_generic_page() {
    let (mock_server, server) = setup().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/auth"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Code is invalid or expired"
        })))
        .mount(&mock_server)
        .await;

    let params = start_login(&server, "device-xyz").await;

    let response = server
        .get("/auth/vk/callback")
        .add_query_param("code", "stale-code")
        .add_query_param("state", &params["state"])
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let page = response.text();
    assert!(page.contains("Authentication failed"));
    assert!(!page.contains("invalid_grant"));
}

#[tokio::test]
async fn test_callback_with_unknown_state_is_rejected() {
    let (_mock_server, server) = setup().await;

    let response = server
        .get("/auth/vk/callback?code=c&state=never-issued")
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}
