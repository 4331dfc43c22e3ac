use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Per-field validation messages keyed by field name.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Err(Validation) when any field collected a message.
    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(FieldErrors),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Generic login failure: one shape for unknown user and bad password.
    pub fn auth_failed() -> Self {
        Self::Unauthorized("Authentication Failed".into())
    }

    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(fields) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "errors": fields }))).into_response()
            }
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "message": message }))).into_response()
            }
            ApiError::Forbidden(message) => {
                (StatusCode::FORBIDDEN, Json(json!({ "message": message }))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "message": message }))).into_response()
            }
            ApiError::Internal(err) => {
                error!(error = %err, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "message": "Internal Server Error" })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn auth_failed_is_generic_401() {
        let response = ApiError::auth_failed().into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Authentication Failed");
    }

    #[tokio::test]
    async fn validation_collects_per_field_messages() {
        let mut fields = FieldErrors::new();
        fields.add("email", "Enter a valid email address.");
        fields.add("password", "Ensure this field has at least 8 characters.");
        fields.add("password", "second message");
        let response = ApiError::Validation(fields).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["errors"]["email"][0], "Enter a valid email address.");
        assert_eq!(body["errors"]["password"][1], "second message");
    }

    #[tokio::test]
    async fn not_found_and_forbidden_shapes_differ_in_status_only() {
        let nf = ApiError::not_found("Recipe").into_response();
        assert_eq!(nf.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(nf).await["message"], "Recipe not found");

        let fb = ApiError::Forbidden("administrator role required".into()).into_response();
        assert_eq!(fb.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(fb).await["message"], "administrator role required");
    }

    #[tokio::test]
    async fn internal_hides_the_cause() {
        let response = ApiError::Internal(anyhow::anyhow!("db exploded")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["message"], "Internal Server Error");
    }

    #[test]
    fn empty_field_errors_pass_through() {
        assert!(FieldErrors::new().into_result().is_ok());
    }
}
