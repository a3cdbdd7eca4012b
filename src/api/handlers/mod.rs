//! API handlers and shared utilities for Rollcall.
//!
//! This module organizes the service's route handlers and provides the
//! response envelope, the error taxonomy, and small validation helpers shared
//! by the enrollment and membership endpoints.

pub(crate) mod auth;
pub mod enrollments;
pub mod groups;
pub mod health;

#[cfg(test)]
pub(crate) mod test_support;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use regex::Regex;
use serde_json::json;
use std::borrow::Cow;
use tracing::error;

/// Machine-readable error codes carried in the failure envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    Forbidden,
    Conflict,
    InternalError,
}

impl ErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Forbidden => "FORBIDDEN",
            Self::Conflict => "CONFLICT",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    const fn status(self) -> StatusCode {
        match self {
            Self::ValidationError => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Conflict => StatusCode::CONFLICT,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API failure shaped as `{success:false, error:{code, message}}`.
///
/// Handlers and storage return this directly; database errors are logged
/// server-side and surfaced as a generic `INTERNAL_ERROR` without leaking
/// details.
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: Cow<'static, str>,
}

impl ApiError {
    pub fn validation(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code: ErrorCode::ValidationError,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code: ErrorCode::NotFound,
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code: ErrorCode::Forbidden,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code: ErrorCode::Conflict,
            message: message.into(),
        }
    }

    pub fn database(err: sqlx::Error) -> Self {
        error!("Database error: {err}");
        Self {
            code: ErrorCode::InternalError,
            message: Cow::Borrowed("Internal server error."),
        }
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.code.status(),
            Json(json!({
                "success": false,
                "error": {
                    "code": self.code.as_str(),
                    "message": self.message,
                }
            })),
        )
            .into_response()
    }
}

/// Success envelope shared by every endpoint: `{success:true, data, message}`.
pub fn json_ok<T: serde::Serialize>(status: StatusCode, data: T, message: &str) -> Response {
    (
        status,
        Json(json!({
            "success": true,
            "data": data,
            "message": message,
        })),
    )
        .into_response()
}

/// Staff gate shared by every mutation and listing handler: enrollment and
/// membership management is reserved for owners and instructors.
pub(crate) fn require_staff(principal: &auth::principal::Principal) -> Result<(), ApiError> {
    if principal.can_manage_enrollments() {
        Ok(())
    } else {
        tracing::warn!(
            actor = %principal.user_id,
            email = %principal.email,
            "caller without a staff role rejected"
        );
        Err(ApiError::forbidden(
            "Only owners and instructors can manage enrollments.",
        ))
    }
}

/// Returns `true` when `err` is a database unique-violation (SQLSTATE `23505`).
/// This is used to translate constraint errors into stable API `409` responses.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

/// Listing filter dates are plain `YYYY-MM-DD` strings.
pub fn valid_date(value: &str) -> bool {
    Regex::new(r"^\d{4}-\d{2}-\d{2}$").is_ok_and(|re| re.is_match(value))
}

/// Drops repeated ids, keeping first-occurrence order, so a duplicated id in a
/// bulk request cannot double-insert or double-count against headroom.
pub(crate) fn dedupe_ids(ids: &[uuid::Uuid]) -> Vec<uuid::Uuid> {
    let mut seen = std::collections::HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn valid_date_accepts_iso_day() {
        assert!(valid_date("2024-01-31"));
    }

    #[test]
    fn valid_date_rejects_timestamps() {
        assert!(!valid_date("2024-01-31T00:00:00Z"));
        assert!(!valid_date("31-01-2024"));
        assert!(!valid_date(""));
    }

    #[test]
    fn dedupe_ids_keeps_first_occurrence_order() {
        let a = uuid::Uuid::new_v4();
        let b = uuid::Uuid::new_v4();
        assert_eq!(dedupe_ids(&[a, b, a, b, a]), vec![a, b]);
        assert_eq!(dedupe_ids(&[]), Vec::<uuid::Uuid>::new());
    }

    #[test]
    fn error_codes_map_to_statuses() {
        assert_eq!(ErrorCode::ValidationError.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::Conflict.status(), StatusCode::CONFLICT);
        assert_eq!(
            ErrorCode::InternalError.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn api_error_envelope_shape() {
        let response = ApiError::conflict("Cohort has reached its enrollment limit.")
            .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "CONFLICT");
        assert_eq!(
            value["error"]["message"],
            "Cohort has reached its enrollment limit."
        );
    }

    #[test]
    fn api_error_exposes_code() {
        assert_eq!(
            ApiError::not_found("Course not found.").code(),
            ErrorCode::NotFound
        );
        assert_eq!(
            ApiError::validation("bad").code(),
            ErrorCode::ValidationError
        );
    }

    #[tokio::test]
    async fn json_ok_envelope_shape() {
        let response = json_ok(StatusCode::CREATED, json!({"id": "x"}), "Created.");
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["data"]["id"], "x");
        assert_eq!(value["message"], "Created.");
    }
}
