use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// One rejected input field, as reported in a 422 body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: Option<String>,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        FieldError {
            field: Some(field.to_string()),
            message: message.into(),
        }
    }

    /// Builds a field error out of a decoder message, naming the field when
    /// the message carries a path or a `missing field` note.
    pub fn from_decoder(message: String) -> Self {
        FieldError {
            field: field_from_decoder_message(&message),
            message,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    DbError(#[from] sqlx::Error),
    #[error("document encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("document must be a JSON object")]
    InvalidDocument,
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("storage unavailable")]
    StorageUnavailable,
    #[error("validation failed")]
    Validation(Vec<FieldError>),
    #[error("{1}")]
    Rejected(StatusCode, String),
}

impl AppError {
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::DbError(_)
            | AppError::Encoding(_)
            | AppError::InvalidDocument
            | AppError::InvalidFilter(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Rejected(status, _) => *status,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Validation(detail) => json!({ "detail": detail }),
            AppError::StorageUnavailable => {
                tracing::warn!("request needs storage but no database is configured");
                json!({ "error": "storage unavailable" })
            }
            AppError::Rejected(_, msg) => json!({ "error": msg }),
            e => {
                tracing::error!(error = %e, "request failed");
                json!({ "error": "internal server error" })
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
                AppError::Validation(vec![FieldError::from_decoder(rejection.body_text())])
            }
            other => AppError::Rejected(other.status(), other.body_text()),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(vec![FieldError::from_decoder(rejection.body_text())])
    }
}

fn field_from_decoder_message(message: &str) -> Option<String> {
    if let Some(rest) = message.split("missing field `").nth(1) {
        return rest.split('`').next().map(str::to_string);
    }
    // "<prefix>: <path>: <cause>" where the path is a plain identifier
    let mut parts = message.splitn(3, ": ");
    let _prefix = parts.next()?;
    let path = parts.next()?;
    parts.next()?;
    let is_path = !path.is_empty()
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '[' || c == ']');
    is_path.then(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_missing_fields() {
        let field = field_from_decoder_message(
            "Failed to deserialize the JSON body into the target type: missing field `title` at line 1 column 2",
        );
        assert_eq!(field.as_deref(), Some("title"));
    }

    #[test]
    fn names_fields_from_decoder_path() {
        let field = field_from_decoder_message(
            "Failed to deserialize the JSON body into the target type: all_day: invalid type: string \"yes\", expected a boolean at line 1 column 20",
        );
        assert_eq!(field.as_deref(), Some("all_day"));
    }

    #[test]
    fn leaves_field_empty_for_syntax_errors() {
        let field = field_from_decoder_message(
            "Failed to parse the request body as JSON: EOF while parsing an object at line 1 column 1",
        );
        assert_eq!(field, None);
    }

    #[test]
    fn maps_errors_to_statuses() {
        assert_eq!(
            AppError::invalid_field("url", "bad").status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::StorageUnavailable.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::InvalidDocument.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
