// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bearer token authentication and role authorization middleware.

use crate::error::AppError;
use crate::models::Role;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Roles allowed on administrative routes.
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Authenticated user extracted from the access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub role: Role,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Middleware that requires a valid access token.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| AppError::Authentication("Invalid or expired token".to_string()))?;

    let claims = state.auth.verify_access_token(token)?;

    request.extensions_mut().insert(AuthUser {
        id: claims.id,
        email: claims.email,
        role: claims.role,
    });

    Ok(next.run(request).await)
}

/// Middleware that admits only the given roles.
///
/// Must run after [`require_auth`].
pub async fn authorize(
    State(allowed): State<&'static [Role]>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(user) = request.extensions().get::<AuthUser>() else {
        return Err(AppError::Authentication(
            "Authentication required".to_string(),
        ));
    };

    if !allowed.contains(&user.role) {
        tracing::debug!(user_id = %user.id, role = %user.role, "Insufficient permissions");
        return Err(AppError::Authorization(
            "Insufficient permissions".to_string(),
        ));
    }

    Ok(next.run(request).await)
}
