// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Email and push notification routes.
//!
//! Unlike the welcome email sent on registration, these sends are awaited
//! and provider failures are reported to the caller.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::routes::response::{ApiResponse, ValidatedJson};
use crate::services::notification::{templates, BatchReport, PushMessage, PushReceipt};
use crate::AppState;
use axum::{
    extract::State,
    routing::{patch, post},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

/// Send routes (admin only).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/notifications/email/welcome", post(send_welcome_email))
        .route(
            "/api/notifications/email/password-reset",
            post(send_password_reset_email),
        )
        .route(
            "/api/notifications/email/verification",
            post(send_verification_email),
        )
        .route("/api/notifications/email/custom", post(send_custom_email))
        .route("/api/notifications/push/device", post(send_to_device))
        .route("/api/notifications/push/devices", post(send_to_devices))
        .route("/api/notifications/push/topic", post(send_to_topic))
        .route(
            "/api/notifications/push/topic/subscribe",
            post(subscribe_to_topic),
        )
        .route(
            "/api/notifications/push/topic/unsubscribe",
            post(unsubscribe_from_topic),
        )
}

/// Routes for any authenticated user.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/notifications/fcm-token", patch(update_fcm_token))
}

// ─── Email ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct WelcomeEmailRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetEmailRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Reset token is required"))]
    pub reset_token: String,
    #[validate(url(message = "Invalid reset URL"))]
    pub reset_url: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerificationEmailRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Verification token is required"))]
    pub verification_token: String,
    #[validate(url(message = "Invalid verification URL"))]
    pub verification_url: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CustomEmailRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Subject is required"))]
    pub subject: String,
    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,
}

async fn send_welcome_email(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<WelcomeEmailRequest>,
) -> Result<ApiResponse<()>> {
    state
        .notifier
        .send_email(templates::welcome(&req.email, &req.name))
        .await?;
    Ok(ApiResponse::message("Welcome email sent successfully"))
}

async fn send_password_reset_email(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<PasswordResetEmailRequest>,
) -> Result<ApiResponse<()>> {
    // The token is already embedded in the URL by the caller
    tracing::debug!(token_len = req.reset_token.len(), "Password reset email");
    state
        .notifier
        .send_email(templates::password_reset(
            &req.email,
            &req.name,
            &req.reset_url,
        ))
        .await?;
    Ok(ApiResponse::message("Password reset email sent successfully"))
}

async fn send_verification_email(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<VerificationEmailRequest>,
) -> Result<ApiResponse<()>> {
    tracing::debug!(
        token_len = req.verification_token.len(),
        "Verification email"
    );
    state
        .notifier
        .send_email(templates::verification(
            &req.email,
            &req.name,
            &req.verification_url,
        ))
        .await?;
    Ok(ApiResponse::message("Verification email sent successfully"))
}

async fn send_custom_email(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CustomEmailRequest>,
) -> Result<ApiResponse<()>> {
    state
        .notifier
        .send_email(templates::custom(&req.email, &req.subject, &req.message))
        .await?;
    Ok(ApiResponse::message("Email sent successfully"))
}

// ─── Push ────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct DevicePushRequest {
    #[validate(length(min = 1, message = "Device token is required"))]
    pub token: String,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Body is required"))]
    pub body: String,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DevicesPushRequest {
    #[validate(length(min = 1, message = "At least one device token is required"))]
    pub tokens: Vec<String>,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Body is required"))]
    pub body: String,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TopicPushRequest {
    #[validate(length(min = 1, message = "Topic is required"))]
    pub topic: String,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Body is required"))]
    pub body: String,
    #[serde(default)]
    pub data: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TopicMembershipRequest {
    #[validate(length(min = 1, message = "At least one device token is required"))]
    pub tokens: Vec<String>,
    #[validate(length(min = 1, message = "Topic is required"))]
    pub topic: String,
}

async fn send_to_device(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<DevicePushRequest>,
) -> Result<ApiResponse<PushReceipt>> {
    let message = PushMessage {
        title: req.title,
        body: req.body,
        data: req.data,
    };
    let receipt = state
        .notifier
        .push()?
        .send_to_device(&req.token, &message)
        .await?;
    Ok(ApiResponse::with_message(
        "Notification sent successfully",
        receipt,
    ))
}

async fn send_to_devices(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<DevicesPushRequest>,
) -> Result<ApiResponse<BatchReport>> {
    let message = PushMessage {
        title: req.title,
        body: req.body,
        data: req.data,
    };
    let report = state
        .notifier
        .push()?
        .send_to_devices(&req.tokens, &message)
        .await?;
    tracing::info!(
        success = report.success_count,
        failure = report.failure_count,
        "Multicast push sent"
    );
    Ok(ApiResponse::with_message(
        "Notifications sent successfully",
        report,
    ))
}

async fn send_to_topic(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<TopicPushRequest>,
) -> Result<ApiResponse<PushReceipt>> {
    let message = PushMessage {
        title: req.title,
        body: req.body,
        data: req.data,
    };
    let receipt = state
        .notifier
        .push()?
        .send_to_topic(&req.topic, &message)
        .await?;
    Ok(ApiResponse::with_message(
        "Topic notification sent successfully",
        receipt,
    ))
}

async fn subscribe_to_topic(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<TopicMembershipRequest>,
) -> Result<ApiResponse<BatchReport>> {
    let report = state
        .notifier
        .push()?
        .subscribe_to_topic(&req.tokens, &req.topic)
        .await?;
    Ok(ApiResponse::with_message(
        "Subscribed to topic successfully",
        report,
    ))
}

async fn unsubscribe_from_topic(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<TopicMembershipRequest>,
) -> Result<ApiResponse<BatchReport>> {
    let report = state
        .notifier
        .push()?
        .unsubscribe_from_topic(&req.tokens, &req.topic)
        .await?;
    Ok(ApiResponse::with_message(
        "Unsubscribed from topic successfully",
        report,
    ))
}

// ─── Device Token ────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FcmTokenRequest {
    #[validate(length(min = 1, message = "FCM token is required"))]
    pub fcm_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FcmTokenResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub fcm_token: String,
}

async fn update_fcm_token(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(req): ValidatedJson<FcmTokenRequest>,
) -> Result<ApiResponse<FcmTokenResponse>> {
    let updated = state
        .users
        .update_fcm_token(&user.id, req.fcm_token.clone())
        .await?;
    Ok(ApiResponse::with_message(
        "FCM token updated successfully",
        FcmTokenResponse {
            id: updated.id,
            email: updated.email,
            name: updated.name,
            fcm_token: req.fcm_token,
        },
    ))
}
