#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use userhub_api::auth::jwt::JwtConfig;
use userhub_api::config::{Environment, ServerConfig, SessionConfig};
use userhub_api::notifications::mailer::{EmailError, LogMailer, Mailer};
use userhub_api::router::build_app_router;
use userhub_api::state::AppState;
use userhub_db::memory::{MemoryOtpStore, MemorySessionStore, MemoryUserStore};

/// Build a test `ServerConfig` with safe defaults.
///
/// Development environment (no `Secure` cookies), distinct JWT secrets and a
/// 30-second request timeout.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        environment: Environment::Development,
        jwt: JwtConfig {
            access_secret: "test-access-secret".to_string(),
            refresh_secret: "test-refresh-secret".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 365,
        },
        session: SessionConfig {
            lifetime_days: 365,
            cookie_name: "userhub.sid".to_string(),
            secret: "test-session-secret".to_string(),
            cleanup_interval_hours: 1,
            store_timeout_secs: 5,
        },
    }
}

/// The router plus direct handles on the in-memory stores behind it.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub sessions: Arc<MemorySessionStore>,
    pub users: Arc<MemoryUserStore>,
    pub otps: Arc<MemoryOtpStore>,
}

/// Build the full application router over in-memory stores, with the same
/// middleware stack `main.rs` uses.
pub fn build_test_app() -> TestApp {
    build_test_app_with_mailer(Arc::new(LogMailer))
}

pub fn build_test_app_with_mailer(mailer: Arc<dyn Mailer>) -> TestApp {
    let config = test_config();
    let sessions = Arc::new(MemorySessionStore::new());
    let users = Arc::new(MemoryUserStore::new());
    let otps = Arc::new(MemoryOtpStore::new());

    let state = AppState::new(
        config.clone(),
        sessions.clone(),
        users.clone(),
        otps.clone(),
        mailer,
    );
    let router = build_app_router(state.clone(), &config);

    TestApp {
        router,
        state,
        sessions,
        users,
        otps,
    }
}

/// A mailer whose transport is always down.
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), EmailError> {
        Err(EmailError::Build("transport unavailable".to_string()))
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn get_auth(app: &Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// GET with a raw `Cookie` header and no bearer token.
pub async fn get_with_cookie(app: &Router, uri: &str, cookie: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    json_request(app, Method::POST, uri, None, body).await
}

pub async fn post_json_auth(
    app: &Router,
    uri: &str,
    token: &str,
    body: serde_json::Value,
) -> Response<Body> {
    json_request(app, Method::POST, uri, Some(token), body).await
}

pub async fn json_request(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: serde_json::Value,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();
    send(app, request).await
}

/// Request with a bearer token and an empty body.
pub async fn empty_auth(app: &Router, method: Method, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Every `Set-Cookie` header of the response.
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// The full `Set-Cookie` line for `name`, if the response set it.
pub fn set_cookie_line(response: &Response<Body>, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    set_cookies(response)
        .into_iter()
        .find(|line| line.starts_with(&prefix))
}

/// The `name=value` pair of a cookie the response set, ready for a `Cookie` header.
pub fn cookie_pair(response: &Response<Body>, name: &str) -> Option<String> {
    set_cookie_line(response, name).map(|line| line.split(';').next().unwrap().to_string())
}

// ---------------------------------------------------------------------------
// Flow helpers
// ---------------------------------------------------------------------------

pub const TEST_PASSWORD: &str = "correct-horse";

/// Sign up through the API. Returns the `data` object of the response.
pub async fn signup(app: &Router, email: &str) -> serde_json::Value {
    let body = serde_json::json!({
        "email": email,
        "password": TEST_PASSWORD,
        "firstname": "Test",
        "lastname": "User",
    });
    let response = post_json(app, "/api/v1/users", body).await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

/// Log in through the API. Returns the raw response so cookies can be read.
pub async fn login(app: &Router, email: &str, password: &str) -> Response<Body> {
    let body = serde_json::json!({ "email": email, "password": password });
    post_json(app, "/api/v1/auth/login", body).await
}

/// Sign up and log in, returning `(access_token, refresh_token)`.
pub async fn signup_and_login(app: &Router, email: &str) -> (String, String) {
    signup(app, email).await;
    let response = login(app, email, TEST_PASSWORD).await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let json = body_json(response).await;
    let tokens = &json["data"]["tokens"];
    (
        tokens["access_token"].as_str().unwrap().to_string(),
        tokens["refresh_token"].as_str().unwrap().to_string(),
    )
}
