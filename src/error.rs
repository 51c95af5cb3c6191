use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::repository::RepositoryError;
use crate::storage::StorageError;
use crate::validation::ValidationErrors;

/// AppError
///
/// Unified error type for every fallible handler. Each variant pins down one
/// entry of the error taxonomy; the HTTP mapping lives in `status_and_body` so
/// handlers only ever say *what* went wrong, never which status that is.
#[derive(Debug)]
pub enum AppError {
    /// One or more fields failed validation; carries the per-field messages.
    Validation(ValidationErrors),
    /// No usable credential was presented, or the token/session is invalid.
    AuthRequired,
    /// Login with an unknown username or a wrong password.
    InvalidCredentials,
    /// The caller is authenticated but does not own the record.
    Forbidden,
    /// The addressed record does not exist.
    NotFound(String),
    /// A uniqueness rule was violated (currently: usernames).
    Conflict(String),
    /// Repository, storage or template failure. The detail is logged at the
    /// boundary and never leaks into the response body.
    Internal(String),
}

/// ErrorBody
///
/// JSON error envelope: `{ "code": ..., "message": ..., "errors": {...} }`,
/// where `errors` appears only on validation failures.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Stable machine-readable identifier, e.g. "validation_error".
    pub code: &'static str,
    /// Human-readable summary.
    pub message: String,
    /// Field name to list of messages, validation failures only.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub errors: Option<ValidationErrors>,
}

impl AppError {
    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{what} not found."))
    }

    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "validation_error",
                    message: "Validation failed.".to_string(),
                    errors: Some(errors),
                },
            ),
            AppError::AuthRequired => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "auth_required",
                    message: "Authentication required.".to_string(),
                    errors: None,
                },
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "invalid_credentials",
                    message: "Invalid username or password.".to_string(),
                    errors: None,
                },
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    code: "forbidden",
                    message: "You do not have permission to modify this content.".to_string(),
                    errors: None,
                },
            ),
            AppError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                ErrorBody { code: "not_found", message, errors: None },
            ),
            AppError::Conflict(message) => (
                StatusCode::CONFLICT,
                ErrorBody { code: "conflict", message, errors: None },
            ),
            AppError::Internal(detail) => {
                tracing::error!("request failed with internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "internal_error",
                        message: "Something went wrong.".to_string(),
                        errors: None,
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::DuplicateUsername => {
                AppError::Conflict("Username is already taken.".to_string())
            }
            RepositoryError::Database(err) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate_new;
    use crate::models::ContentInput;

    #[test]
    fn validation_errors_map_to_400_with_field_detail() {
        let errors = validate_new(&ContentInput::default(), uuid::Uuid::new_v4(), "a")
            .unwrap_err();
        let (status, body) = AppError::Validation(errors).status_and_body();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "validation_error");

        let json = serde_json::to_value(&body).unwrap();
        assert!(json["errors"]["title"].is_array());
    }

    #[test]
    fn taxonomy_maps_to_expected_statuses() {
        let cases = [
            (AppError::AuthRequired, StatusCode::UNAUTHORIZED),
            (AppError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AppError::Forbidden, StatusCode::FORBIDDEN),
            (AppError::not_found("Content"), StatusCode::NOT_FOUND),
            (AppError::Conflict("taken".into()), StatusCode::CONFLICT),
        ];
        for (err, expected) in cases {
            let (status, _) = err.status_and_body();
            assert_eq!(status, expected);
        }
    }

    #[test]
    fn internal_detail_never_reaches_the_body() {
        let (status, body) = AppError::Internal("connection refused".into()).status_and_body();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message, "Something went wrong.");

        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("connection refused"));
        assert!(!json.contains("errors"));
    }
}
