// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end session tests over HTTP.
//!
//! These tests verify that:
//! 1. Register, login, refresh and logout behave as a client expects
//! 2. Login failures do not reveal whether an email is registered
//! 3. Protected routes reject missing or invalid tokens

use axum::http::{Method, StatusCode};
use serde_json::json;
use user_auth_api::config::Config;
use user_auth_api::models::UserPatch;
use user_auth_api::services::Notifier;

mod common;
use common::{create_test_app, create_test_app_with, json_request, register, send};

#[tokio::test]
async fn test_register_then_login() {
    let (app, _) = create_test_app();

    let data = register(&app, "alice@example.com", "secret123", "Alice").await;
    let access = data["accessToken"].as_str().unwrap();
    let refresh = data["refreshToken"].as_str().unwrap();
    assert!(!access.is_empty());
    assert!(!refresh.is_empty());
    assert_ne!(access, refresh);

    let user = &data["user"];
    assert_eq!(user["email"], "alice@example.com");
    assert_eq!(user["name"], "Alice");
    assert_eq!(user["role"], "USER");
    assert_eq!(user["isActive"], true);
    assert!(user.get("password").is_none());
    assert!(user.get("passwordHash").is_none());
    assert!(user.get("password_hash").is_none());

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "email": "alice@example.com", "password": "secret123" })),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["user"]["id"], user["id"]);

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "email": "alice@example.com", "password": "wrong" })),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "AUTHENTICATION_ERROR");
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let (app, _) = create_test_app();
    register(&app, "alice@example.com", "secret123", "Alice").await;

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/register",
            Some(json!({ "email": "alice@example.com", "password": "different", "name": "Other" })),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT_ERROR");
    assert_eq!(body["message"], "User with this email already exists");
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let (app, _) = create_test_app();
    register(&app, "alice@example.com", "secret123", "Alice").await;

    let (status_unknown, body_unknown) = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "email": "nobody@example.com", "password": "secret123" })),
            None,
        ),
    )
    .await;
    let (status_wrong, body_wrong) = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "email": "alice@example.com", "password": "nope123" })),
            None,
        ),
    )
    .await;

    assert_eq!(status_unknown, StatusCode::UNAUTHORIZED);
    assert_eq!(status_wrong, StatusCode::UNAUTHORIZED);
    assert_eq!(body_unknown, body_wrong);
    assert_eq!(body_wrong["message"], "Invalid credentials");
}

#[tokio::test]
async fn test_inactive_account_login_forbidden() {
    let (app, state) = create_test_app();
    let data = register(&app, "alice@example.com", "secret123", "Alice").await;
    let id = data["user"]["id"].as_str().unwrap();

    state
        .users
        .update(
            id,
            UserPatch {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "email": "alice@example.com", "password": "secret123" })),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "AUTHORIZATION_ERROR");

    // Wrong password on an inactive account still looks like bad credentials
    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "email": "alice@example.com", "password": "wrong123" })),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_logout_cycle() {
    let (app, _) = create_test_app();
    let data = register(&app, "alice@example.com", "secret123", "Alice").await;
    let user_id = data["user"]["id"].as_str().unwrap().to_string();
    let refresh = data["refreshToken"].as_str().unwrap().to_string();

    // Refresh tokens are reusable until logout
    for _ in 0..2 {
        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/api/auth/refresh-token",
                Some(json!({ "refreshToken": refresh })),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let access = body["data"]["accessToken"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            json_request(Method::GET, "/api/auth/profile", None, Some(&access)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["id"], user_id.as_str());
    }

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/logout",
            Some(json!({ "refreshToken": refresh })),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logged out successfully");

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/refresh-token",
            Some(json!({ "refreshToken": refresh })),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid refresh token");

    // Logging out twice is harmless
    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/logout",
            Some(json!({ "refreshToken": refresh })),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_with_garbage_token() {
    let (app, _) = create_test_app();

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/refresh-token",
            Some(json!({ "refreshToken": "not.a.token" })),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid refresh token");
}

#[tokio::test]
async fn test_access_token_is_not_a_refresh_token() {
    let (app, _) = create_test_app();
    let data = register(&app, "alice@example.com", "secret123", "Alice").await;

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/refresh-token",
            Some(json!({ "refreshToken": data["accessToken"] })),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        json_request(
            Method::GET,
            "/api/auth/profile",
            None,
            data["refreshToken"].as_str(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_profile_requires_token() {
    let (app, _) = create_test_app();

    let (status, body) = send(
        &app,
        json_request(Method::GET, "/api/auth/profile", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired token");

    let (status, _) = send(
        &app,
        json_request(Method::GET, "/api/auth/profile", None, Some("garbage")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_validation_errors() {
    let (app, _) = create_test_app();

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/register",
            Some(json!({ "email": "not-an-email", "password": "123", "name": "A" })),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, ["email", "name", "password"]);

    // Missing fields and unknown roles are rejected before validation rules
    for payload in [
        json!({ "email": "a@example.com", "password": "secret123" }),
        json!({ "email": "a@example.com", "password": "secret123", "name": "Al", "role": "ROOT" }),
    ] {
        let (status, body) = send(
            &app,
            json_request(Method::POST, "/api/auth/register", Some(payload), None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }
}

#[tokio::test]
async fn test_register_with_role() {
    let (app, _) = create_test_app();

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/auth/register",
            Some(json!({
                "email": "mod@example.com",
                "password": "secret123",
                "name": "Mod",
                "role": "MODERATOR"
            })),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["user"]["role"], "MODERATOR");
}

#[tokio::test]
async fn test_health_and_unknown_route() {
    let (app, _) = create_test_app();

    let (status, body) = send(&app, json_request(Method::GET, "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["uptime"].as_f64().unwrap() >= 0.0);
    assert!(body["timestamp"].as_str().is_some());

    let (status, body) = send(&app, json_request(Method::GET, "/api/nope", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Route not found");
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_security_headers_on_api_responses() {
    let (app, _) = create_test_app();

    let response = tower::ServiceExt::oneshot(
        app,
        json_request(Method::GET, "/health", None, None),
    )
    .await
    .unwrap();
    assert_eq!(
        response.headers().get("X-Content-Type-Options").unwrap(),
        "nosniff"
    );
    assert_eq!(response.headers().get("X-Frame-Options").unwrap(), "DENY");
}

#[tokio::test]
async fn test_rate_limit_rejects_excess_requests() {
    let mut config = Config::test_default();
    config.rate_limit.max_requests = 2;
    let (app, _) = create_test_app_with(config, Notifier::disabled());

    for _ in 0..2 {
        let (status, _) = send(&app, json_request(Method::GET, "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let response = tower::ServiceExt::oneshot(
        app.clone(),
        json_request(Method::GET, "/health", None, None),
    )
    .await
    .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().get("retry-after").is_some());

    // A different forwarded client has its own budget
    let mut request = json_request(Method::GET, "/health", None, None);
    request
        .headers_mut()
        .insert("x-forwarded-for", "203.0.113.9".parse().unwrap());
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
}
