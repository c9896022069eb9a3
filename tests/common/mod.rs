// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use user_auth_api::config::Config;
use user_auth_api::db::{FirestoreDb, MemoryStore};
use user_auth_api::models::{NewUser, Role};
use user_auth_api::routes::create_router;
use user_auth_api::services::notification::{EmailMessage, EmailSender};
use user_auth_api::services::{NotificationError, Notifier};
use user_auth_api::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection against the emulator.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a test app over an in-memory store with notifications disabled.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with(Config::test_default(), Notifier::disabled())
}

/// Create a test app with a specific configuration and notifier.
#[allow(dead_code)]
pub fn create_test_app_with(config: Config, notifier: Notifier) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(
        config,
        Arc::new(MemoryStore::new()),
        notifier,
    ));
    (create_router(state.clone()), state)
}

/// Build a JSON request, optionally with a bearer token.
#[allow(dead_code)]
pub fn json_request(
    method: Method,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Send a request and decode the JSON response body.
#[allow(dead_code)]
pub async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

/// Register through the API and return the response `data`.
#[allow(dead_code)]
pub async fn register(app: &axum::Router, email: &str, password: &str, name: &str) -> Value {
    let (status, body) = send(
        app,
        json_request(
            Method::POST,
            "/api/auth/register",
            Some(serde_json::json!({ "email": email, "password": password, "name": name })),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
    body["data"].clone()
}

/// Create a user with the given role directly and return an access token.
#[allow(dead_code)]
pub async fn token_for_role(state: &AppState, email: &str, role: Role) -> (String, String) {
    let user = state
        .users
        .create(NewUser {
            email: email.to_string(),
            password: "password123".to_string(),
            name: "Test User".to_string(),
            role: Some(role),
        })
        .await
        .unwrap();
    let tokens = state.auth.issue_token_pair(&user).await.unwrap();
    (user.id, tokens.access_token)
}

/// Email sender that records every message.
#[derive(Default)]
#[allow(dead_code)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<EmailMessage>>,
}

#[async_trait]
impl EmailSender for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), NotificationError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

/// Email sender that always fails.
#[allow(dead_code)]
pub struct FailingMailer;

#[async_trait]
impl EmailSender for FailingMailer {
    async fn send(&self, _message: EmailMessage) -> Result<(), NotificationError> {
        Err(NotificationError::Provider("SMTP connection refused".to_string()))
    }
}

/// Email sender that takes a long time before succeeding.
#[allow(dead_code)]
pub struct SlowMailer(pub Duration);

#[async_trait]
impl EmailSender for SlowMailer {
    async fn send(&self, _message: EmailMessage) -> Result<(), NotificationError> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}
