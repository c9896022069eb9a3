// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Registration, login and session routes.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{NewUser, Role, User};
use crate::routes::response::{ApiResponse, ValidatedJson};
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// Public session routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh-token", post(refresh_token))
        .route("/api/auth/logout", post(logout))
}

/// Routes that need a valid access token.
/// The auth middleware is applied in routes/mod.rs.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/auth/profile", get(profile))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// User plus a fresh token pair.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenResponse {
    pub access_token: String,
}

async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<ApiResponse<SessionResponse>> {
    let user = state
        .auth
        .register(NewUser {
            email: req.email,
            password: req.password,
            name: req.name,
            role: req.role,
        })
        .await?;
    let tokens = state.auth.issue_token_pair(&user).await?;

    Ok(ApiResponse::created(
        "User registered successfully",
        SessionResponse {
            user,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        },
    ))
}

async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<ApiResponse<SessionResponse>> {
    let user = state.auth.login(&req.email, &req.password).await?;
    let tokens = state.auth.issue_token_pair(&user).await?;

    Ok(ApiResponse::with_message(
        "Login successful",
        SessionResponse {
            user,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        },
    ))
}

async fn refresh_token(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RefreshTokenRequest>,
) -> Result<ApiResponse<AccessTokenResponse>> {
    let access_token = state.auth.refresh(&req.refresh_token).await?;
    Ok(ApiResponse::ok(AccessTokenResponse { access_token }))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RefreshTokenRequest>,
) -> Result<ApiResponse<()>> {
    state.auth.logout(&req.refresh_token).await?;
    Ok(ApiResponse::message("Logged out successfully"))
}

async fn profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<ApiResponse<User>> {
    let profile = state.auth.profile(&user.id).await?;
    Ok(ApiResponse::ok(profile))
}
