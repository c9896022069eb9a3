// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Concurrent registration test.
//!
//! Many simultaneous registrations with the same email must produce
//! exactly one account.

use axum::http::{Method, StatusCode};
use serde_json::json;
use user_auth_api::models::UserQuery;

mod common;
use common::{create_test_app, json_request, send};

const ATTEMPTS: usize = 16;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registrations_single_winner() {
    let (app, state) = create_test_app();

    let handles: Vec<_> = (0..ATTEMPTS)
        .map(|i| {
            let app = app.clone();
            tokio::spawn(async move {
                send(
                    &app,
                    json_request(
                        Method::POST,
                        "/api/auth/register",
                        Some(json!({
                            "email": "race@example.com",
                            "password": "secret123",
                            "name": format!("Racer {i}")
                        })),
                        None,
                    ),
                )
                .await
                .0
            })
        })
        .collect();

    let mut created = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::CREATED => created += 1,
            StatusCode::CONFLICT => conflicts += 1,
            other => panic!("unexpected status {other}"),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(conflicts, ATTEMPTS - 1);

    let (_, total) = state
        .store
        .list_users(&UserQuery {
            search: Some("race@example.com".to_string()),
            ..UserQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 1);
}
