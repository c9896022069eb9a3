// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Administrative user management routes.

use crate::error::{AppError, Result};
use crate::models::{NewUser, Role, SortField, SortOrder, User, UserPatch, UserQuery};
use crate::routes::response::{ApiResponse, ValidatedJson};
use crate::AppState;
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// User management routes (admin only).
/// Auth and role middleware are applied in routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route(
            "/api/users/{id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/api/users/{id}/revoke-sessions", post(revoke_sessions))
}

// ─── Listing ─────────────────────────────────────────────────

/// Query parameters for listing users.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub search: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

impl From<ListUsersParams> for UserQuery {
    fn from(params: ListUsersParams) -> Self {
        UserQuery {
            search: params.search.filter(|s| !s.trim().is_empty()),
            role: params.role,
            is_active: params.is_active,
            sort_by: params
                .sort_by
                .as_deref()
                .and_then(SortField::parse)
                .unwrap_or_default(),
            order: params
                .order
                .as_deref()
                .map(SortOrder::parse_lenient)
                .unwrap_or_default(),
            ..UserQuery::default()
        }
        .with_paging(params.page, params.limit)
    }
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    params: std::result::Result<Query<ListUsersParams>, QueryRejection>,
) -> Result<ApiResponse<Vec<User>>> {
    let Query(params) = params.map_err(|e| AppError::validation(e.body_text()))?;
    let (users, meta) = state.users.list(&params.into()).await?;
    Ok(ApiResponse::paginated(
        "Users retrieved successfully",
        users,
        meta,
    ))
}

// ─── Single User ─────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeSessionsResponse {
    pub revoked_sessions: u64,
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<User>> {
    Ok(ApiResponse::ok(state.users.get(&id).await?))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> Result<ApiResponse<User>> {
    let user = state
        .users
        .create(NewUser {
            email: req.email,
            password: req.password,
            name: req.name,
            role: req.role,
        })
        .await?;
    Ok(ApiResponse::created("User created successfully", user))
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> Result<ApiResponse<User>> {
    let user = state
        .users
        .update(
            &id,
            UserPatch {
                email: req.email,
                password: req.password,
                name: req.name,
                role: req.role,
                is_active: req.is_active,
            },
        )
        .await?;
    Ok(ApiResponse::with_message("User updated successfully", user))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>> {
    state.users.delete(&id).await?;
    Ok(ApiResponse::message("User deleted successfully"))
}

async fn revoke_sessions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<RevokeSessionsResponse>> {
    // 404 for unknown users rather than a silent zero
    state.users.get(&id).await?;
    let revoked_sessions = state.auth.revoke_all_sessions(&id).await?;
    Ok(ApiResponse::with_message(
        "All sessions revoked successfully",
        RevokeSessionsResponse { revoked_sessions },
    ))
}
