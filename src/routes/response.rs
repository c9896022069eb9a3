// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Response envelope and validated request extractors.

use crate::error::{AppError, FieldError};
use crate::models::PaginationMeta;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use validator::{Validate, ValidationErrors};

/// Success envelope: `{success: true, message, data}` plus `meta` for
/// paginated results.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    #[serde(skip)]
    status: StatusCode,
    success: bool,
    message: String,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<PaginationMeta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self::with_message("Success", data)
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::OK,
            success: true,
            message: message.into(),
            data: Some(data),
            meta: None,
        }
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::with_message(message, data)
        }
    }

    pub fn paginated(message: impl Into<String>, data: T, meta: PaginationMeta) -> Self {
        Self {
            meta: Some(meta),
            ..Self::with_message(message, data)
        }
    }
}

impl ApiResponse<()> {
    /// Envelope with `data: null`.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            success: true,
            message: message.into(),
            data: None,
            meta: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// JSON body that has been deserialized and passed `validator` checks.
///
/// Malformed bodies, missing fields and failed rules all surface as
/// `VALIDATION_ERROR`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(json_rejection)?;

        value.validate().map_err(|errors| {
            let errors = field_errors(&errors);
            tracing::debug!(fields = errors.len(), "Request validation failed");
            AppError::Validation {
                message: "Validation failed".to_string(),
                errors,
            }
        })?;

        Ok(ValidatedJson(value))
    }
}

fn json_rejection(rejection: JsonRejection) -> AppError {
    tracing::debug!(error = %rejection, "Rejected request body");
    AppError::validation(rejection.body_text())
}

/// Flatten `validator` output into a list sorted by field name.
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut out: Vec<FieldError> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| FieldError {
                field: field.to_string(),
                message: e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field)),
            })
        })
        .collect();
    out.sort_by(|a, b| a.field.cmp(&b.field));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::{routing::post, Router};
    use serde::Deserialize;
    use tower::ServiceExt; // for oneshot

    #[derive(Deserialize, Validate)]
    struct Signup {
        #[validate(email(message = "Invalid email"))]
        email: String,
        #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
        password: String,
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn app() -> Router {
        Router::new().route(
            "/",
            post(|ValidatedJson(s): ValidatedJson<Signup>| async move {
                ApiResponse::created("Created", s.email)
            }),
        )
    }

    fn request(body: &str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_body() {
        let response = app()
            .oneshot(request(r#"{"email":"a@example.com","password":"secret1"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Created");
        assert_eq!(body["data"], "a@example.com");
        assert!(body.get("meta").is_none());
    }

    #[tokio::test]
    async fn test_rule_failures_are_listed() {
        let response = app()
            .oneshot(request(r#"{"email":"nope","password":"123"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["code"], "VALIDATION_ERROR");
        let errors = body["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0]["field"], "email");
        assert_eq!(errors[1]["field"], "password");
        assert_eq!(
            errors[1]["message"],
            "Password must be at least 6 characters"
        );
    }

    #[tokio::test]
    async fn test_missing_field_is_validation_error() {
        let response = app()
            .oneshot(request(r#"{"email":"a@example.com"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_message_only_envelope() {
        let response = ApiResponse::message("Done").into_response();
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert!(body["data"].is_null());
    }
}
