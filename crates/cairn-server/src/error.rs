//! # Server Error
//!
//! Maps store and request errors to HTTP responses. Bodies are JSON
//! objects with a status code and message; internal details are logged,
//! not returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cairn_core::CairnError;
use thiserror::Error;

/// Handler error.
#[derive(Error, Debug)]
pub enum AppError {
    /// The block is not held by this server (410).
    #[error("no such block: {0}")]
    Gone(String),

    /// Missing or malformed form fields, or bytes that do not match the
    /// expected name (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Authenticator missing or wrong (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Store or runtime failure (500). The message is logged only.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Gone(_) => StatusCode::GONE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CairnError> for AppError {
    fn from(err: CairnError) -> Self {
        match err {
            CairnError::NoSuchBlock { name } => Self::Gone(name),
            CairnError::InvalidArgument(msg) | CairnError::Format(msg) => Self::BadRequest(msg),
            CairnError::UnsupportedAlgorithm(alg) => {
                Self::BadRequest(format!("unsupported algorithm: {alg}"))
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = serde_json::json!({
            "error": {
                "code": status.as_u16(),
                "message": message,
            }
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_statuses() {
        let gone: AppError = CairnError::no_such_block("n").into();
        assert_eq!(gone.status(), StatusCode::GONE);

        let bad: AppError = CairnError::InvalidArgument("x".into()).into();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let io: AppError = CairnError::Io(std::io::Error::other("disk")).into();
        assert_eq!(io.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn internal_detail_is_not_returned() {
        let resp = AppError::Internal("secret path /var/x".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
