#![allow(dead_code)]

use axum::body::Body;
use axum::response::Response;
use axum::Router;
use bytes::Bytes;
use http::header::{AUTHORIZATION, ORIGIN};
use http::{Method, Request};
use tower::ServiceExt;

use stowage_daemon::http_server;
use stowage_daemon::{ServiceConfig, ServiceState, TokenConfig};

pub const OWNER_TOKEN: &str = "owner-token";
pub const READER_TOKEN: &str = "reader-token";
pub const NOTES_TOKEN: &str = "notes-token";
pub const GOOD_ORIGIN: &str = "https://app.example";
pub const EVIL_ORIGIN: &str = "https://evil.example";

fn token(token: &str, scopes: &[&str]) -> TokenConfig {
    TokenConfig {
        token: token.to_string(),
        scopes: scopes.iter().map(|scope| scope.to_string()).collect(),
    }
}

/// State over an in-memory store with three tokens and one allowed origin.
pub async fn setup_state() -> ServiceState {
    let mut config = ServiceConfig::ephemeral("daemon-tests");
    config.cors.allowed_origins = vec![GOOD_ORIGIN.to_string()];
    config.tokens = vec![
        token(OWNER_TOKEN, &["*:rw"]),
        token(READER_TOKEN, &["*:r"]),
        token(NOTES_TOKEN, &["notes:rw"]),
    ];
    ServiceState::from_config(&config).await.unwrap()
}

pub fn app(state: ServiceState) -> Router {
    let http_config = http_server::Config::new(
        "127.0.0.1:0".parse().unwrap(),
        tracing::Level::DEBUG,
        1024 * 1024,
    );
    http_server::router(&http_config, state)
}

pub async fn setup_app() -> Router {
    app(setup_state().await)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

pub fn anonymous(method: Method, uri: &str) -> http::request::Builder {
    Request::builder().method(method).uri(uri)
}

pub fn authed(method: Method, uri: &str, token: &str) -> http::request::Builder {
    anonymous(method, uri).header(AUTHORIZATION, format!("Bearer {}", token))
}

pub fn from_origin(builder: http::request::Builder, origin: &str) -> http::request::Builder {
    builder.header(ORIGIN, origin)
}

/// `PUT` as the owner, returning the response.
pub async fn put(app: &Router, uri: &str, content_type: &str, body: &'static str) -> Response {
    let request = authed(Method::PUT, uri, OWNER_TOKEN)
        .header(http::header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

pub async fn body_bytes(response: Response) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn header<'a>(response: &'a Response, name: http::header::HeaderName) -> &'a str {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}
