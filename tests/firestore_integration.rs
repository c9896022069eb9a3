// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running
//! (`FIRESTORE_EMULATOR_HOST` set); they are skipped otherwise.

use chrono::{Duration, Utc};
use std::sync::Arc;
use user_auth_api::db::Store;
use user_auth_api::error::AppError;
use user_auth_api::models::refresh_token::hash_token;
use user_auth_api::models::{RefreshTokenRecord, Role, UserChanges, UserQuery, UserRecord};

mod common;
use common::test_db;

/// Unique email per test run so tests don't collide in a shared emulator.
fn unique_email(tag: &str) -> String {
    format!("{}-{}@example.com", tag, uuid::Uuid::new_v4().simple())
}

fn test_user(email: &str) -> UserRecord {
    UserRecord::new(
        email.to_string(),
        "$2b$04$notarealhashbutlongenoughforthistest.............".to_string(),
        "Test User".to_string(),
        Role::User,
    )
}

// ═══════════════════════════════════════════════════════════════════════════
// USER TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_user_insert_and_lookup() {
    require_emulator!();

    let db = test_db().await;
    let email = unique_email("lookup");

    assert!(db.find_user_by_email(&email).await.unwrap().is_none());

    let user = db.insert_user(test_user(&email)).await.unwrap();

    let by_id = db.find_user_by_id(&user.id).await.unwrap().unwrap();
    assert_eq!(by_id.email, email);
    let by_email = db.find_user_by_email(&email).await.unwrap().unwrap();
    assert_eq!(by_email.id, user.id);

    assert!(db.delete_user(&user.id).await.unwrap());
}

#[tokio::test]
async fn test_duplicate_email_rejected() {
    require_emulator!();

    let db = test_db().await;
    let email = unique_email("dup");

    let first = db.insert_user(test_user(&email)).await.unwrap();
    let err = db.insert_user(test_user(&email)).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    db.delete_user(&first.id).await.unwrap();
}

#[tokio::test]
async fn test_concurrent_inserts_single_winner() {
    require_emulator!();

    let db: Arc<dyn Store> = Arc::new(test_db().await);
    let email = unique_email("race");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let db = db.clone();
            let user = test_user(&email);
            tokio::spawn(async move { db.insert_user(user).await })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(user) => winners.push(user),
            Err(AppError::Conflict(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(winners.len(), 1);

    db.delete_user(&winners[0].id).await.unwrap();
}

#[tokio::test]
async fn test_email_change_moves_reservation() {
    require_emulator!();

    let db = test_db().await;
    let old_email = unique_email("old");
    let new_email = unique_email("new");

    let user = db.insert_user(test_user(&old_email)).await.unwrap();
    let updated = db
        .update_user(
            &user.id,
            UserChanges {
                email: Some(new_email.clone()),
                ..UserChanges::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.email, new_email);

    assert!(db.find_user_by_email(&old_email).await.unwrap().is_none());
    assert_eq!(
        db.find_user_by_email(&new_email).await.unwrap().unwrap().id,
        user.id
    );

    // The old email can be registered again
    let other = db.insert_user(test_user(&old_email)).await.unwrap();

    db.delete_user(&user.id).await.unwrap();
    db.delete_user(&other.id).await.unwrap();
}

#[tokio::test]
async fn test_update_writes_only_changed_fields() {
    require_emulator!();

    let db = test_db().await;
    let user = db.insert_user(test_user(&unique_email("mask"))).await.unwrap();

    // Writes to disjoint fields both survive
    db.update_user(
        &user.id,
        UserChanges {
            password_hash: Some("new-hash".to_string()),
            is_active: Some(false),
            ..UserChanges::default()
        },
    )
    .await
    .unwrap();
    let updated = db
        .update_user(
            &user.id,
            UserChanges {
                fcm_token: Some("device-1".to_string()),
                ..UserChanges::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.password_hash, "new-hash");
    assert!(!updated.is_active);
    assert_eq!(updated.fcm_token.as_deref(), Some("device-1"));

    db.delete_user(&user.id).await.unwrap();
}

#[tokio::test]
async fn test_update_missing_user_does_not_create_it() {
    require_emulator!();

    let db = test_db().await;
    let id = uuid::Uuid::new_v4().to_string();
    let err = db
        .update_user(
            &id,
            UserChanges {
                name: Some("Ghost".to_string()),
                ..UserChanges::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert!(db.find_user_by_id(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_users_filters() {
    require_emulator!();

    let db = test_db().await;
    let tag = uuid::Uuid::new_v4().simple().to_string();
    let email = format!("{tag}@example.com");
    let mut record = test_user(&email);
    record.role = Role::Moderator;
    let user = db.insert_user(record).await.unwrap();

    let (users, total) = db
        .list_users(&UserQuery {
            search: Some(tag),
            role: Some(Role::Moderator),
            ..UserQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(users[0].id, user.id);

    db.delete_user(&user.id).await.unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════
// REFRESH TOKEN TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_refresh_tokens_cascade_on_delete() {
    require_emulator!();

    let db = test_db().await;
    let user = db.insert_user(test_user(&unique_email("cascade"))).await.unwrap();
    let expires_at = Utc::now() + Duration::days(7);

    for token in ["token-a", "token-b"] {
        let token = format!("{token}-{}", user.id);
        db.insert_refresh_token(RefreshTokenRecord::new(&token, &user.id, expires_at))
            .await
            .unwrap();
    }
    let hash_a = hash_token(&format!("token-a-{}", user.id));
    assert!(db.find_refresh_token(&hash_a).await.unwrap().is_some());

    assert!(db.delete_user(&user.id).await.unwrap());
    assert!(db.find_refresh_token(&hash_a).await.unwrap().is_none());
    assert_eq!(db.delete_refresh_tokens_for_user(&user.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_refresh_token_for_missing_user_rejected() {
    require_emulator!();

    let db = test_db().await;
    let err = db
        .insert_refresh_token(RefreshTokenRecord::new(
            "orphan",
            "no-such-user",
            Utc::now() + Duration::days(1),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_delete_refresh_token_idempotent() {
    require_emulator!();

    let db = test_db().await;
    let user = db.insert_user(test_user(&unique_email("logout"))).await.unwrap();
    let token = format!("logout-{}", user.id);
    db.insert_refresh_token(RefreshTokenRecord::new(
        &token,
        &user.id,
        Utc::now() + Duration::days(1),
    ))
    .await
    .unwrap();

    assert_eq!(db.delete_refresh_token(&hash_token(&token)).await.unwrap(), 1);
    assert_eq!(db.delete_refresh_token(&hash_token(&token)).await.unwrap(), 0);

    db.delete_user(&user.id).await.unwrap();
}
