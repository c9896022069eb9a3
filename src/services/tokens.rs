// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access and refresh token signing (HS256, separate secrets).

use crate::config::JwtConfig;
use crate::error::AppError;
use crate::models::Role;
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by an access token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    /// User ID
    pub id: String,
    pub email: String,
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Claims carried by a refresh token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RefreshClaims {
    /// User ID
    pub id: String,
    /// Unique per issuance, so two refresh tokens never collide
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Why a token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    Invalid,
}

/// A freshly issued refresh token and its signed expiry.
#[derive(Debug, Clone)]
pub struct IssuedRefreshToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies both token kinds.
#[derive(Clone)]
pub struct TokenSigner {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenSigner {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(&config.secret),
            access_decoding: DecodingKey::from_secret(&config.secret),
            refresh_encoding: EncodingKey::from_secret(&config.refresh_secret),
            refresh_decoding: DecodingKey::from_secret(&config.refresh_secret),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
        }
    }

    /// Sign an access token carrying the user's identity and role.
    pub fn issue_access(&self, id: &str, email: &str, role: Role) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = AccessClaims {
            id: id.to_string(),
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: now
                .checked_add_signed(self.access_ttl)
                .context("access token lifetime out of range")?
                .timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.access_encoding)
            .context("failed to sign access token")?;
        Ok(token)
    }

    /// Sign a refresh token for `user_id`.
    pub fn issue_refresh(&self, user_id: &str) -> Result<IssuedRefreshToken, AppError> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.refresh_ttl)
            .context("refresh token lifetime out of range")?;
        let claims = RefreshClaims {
            id: user_id.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.refresh_encoding)
            .context("failed to sign refresh token")?;

        Ok(IssuedRefreshToken {
            token,
            // Whole seconds, matching the signed `exp`
            expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or(expires_at),
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        verify(token, &self.access_decoding)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        verify(token, &self.refresh_decoding)
    }
}

fn verify<T>(token: &str, key: &DecodingKey) -> Result<T, TokenError>
where
    T: for<'de> Deserialize<'de>,
{
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    decode::<T>(token, key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })
}
