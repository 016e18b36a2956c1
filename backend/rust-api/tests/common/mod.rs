#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use devquest_api::{
    config::{Config, PointsConfig, StorageBackend},
    create_router,
    middlewares::auth::{JwtClaims, JwtService},
    services::{content_service::ContentStore, AppState},
    store::MemoryStore,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const METRICS_AUTH: &str = "metrics:secret";

pub fn test_config() -> Config {
    Config {
        bind_addr: "127.0.0.1:0".to_string(),
        storage_backend: StorageBackend::Memory,
        mongo_uri: String::new(),
        mongo_database: "devquest_test".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        content_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/content").to_string(),
        metrics_auth: METRICS_AUTH.to_string(),
        points: PointsConfig::default(),
    }
}

pub fn create_test_app() -> Router {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let config = test_config();
    let content =
        ContentStore::load_dir(&config.content_dir).expect("Failed to load fixture content");
    let app_state = Arc::new(AppState::from_parts(
        config,
        Arc::new(MemoryStore::new()),
        content,
    ));

    create_router(app_state)
}

pub fn token_for(user_id: &str) -> String {
    let now = Utc::now().timestamp() as usize;
    JwtService::new(JWT_SECRET)
        .generate_token(&JwtClaims {
            sub: user_id.to_string(),
            exp: now + 3600,
            iat: now,
        })
        .expect("Failed to sign test token")
}

/// Sends an authenticated request and decodes the JSON body.
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    user_id: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token_for(user_id)));

    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

pub fn attempt_uri(lesson_id: &str, exercise_id: &str) -> String {
    format!(
        "/api/v1/courses/rust-basics/lessons/{}/exercises/{}/attempt",
        lesson_id, exercise_id
    )
}
