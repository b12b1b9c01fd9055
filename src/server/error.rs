//! HTTP error mapping

use crate::auth::VerifyError;
use crate::storage::StorageError;
use crate::telemetry::ValidationError;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Errors returned by request handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid ingest token")]
    InvalidToken,

    #[error("ingest token expired")]
    TokenExpired,

    #[error("ingest token does not belong to this session")]
    SessionMismatch,

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Out-of-range query parameters
    #[error(transparent)]
    InvalidQuery(ValidationError),

    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingToken | ApiError::InvalidToken | ApiError::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::SessionMismatch => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) | ApiError::Storage(StorageError::NotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            ApiError::Rejected { status, .. } => *status,
            ApiError::Storage(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingToken => "missing_token",
            ApiError::InvalidToken => "invalid_token",
            ApiError::TokenExpired => "token_expired",
            ApiError::SessionMismatch => "session_mismatch",
            ApiError::NotFound(_) | ApiError::Storage(StorageError::NotFound(_)) => "not_found",
            ApiError::Validation(_) | ApiError::InvalidQuery(_) | ApiError::Rejected { .. } => {
                "invalid_request"
            }
            ApiError::Storage(_) | ApiError::Internal(_) => "internal_error",
        }
    }
}

impl From<VerifyError> for ApiError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::Malformed(_) | VerifyError::InvalidSignature => ApiError::InvalidToken,
            VerifyError::Expired { .. } => ApiError::TokenExpired,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Rejected {
            status: StatusCode::BAD_REQUEST,
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let body = ErrorBody {
            error: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_errors_are_unauthorized() {
        let malformed = ApiError::from(VerifyError::Malformed("bad".to_string()));
        let forged = ApiError::from(VerifyError::InvalidSignature);
        let expired = ApiError::from(VerifyError::Expired { exp: 0 });

        assert_eq!(malformed.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(malformed.code(), "invalid_token");
        assert_eq!(forged.code(), "invalid_token");
        assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(expired.code(), "token_expired");
    }

    #[test]
    fn test_storage_error_mapping() {
        let missing = ApiError::from(StorageError::NotFound("Session not found: x".to_string()));
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.to_string(), "not found: Session not found: x");

        let db = ApiError::from(StorageError::Database("connection reset".to_string()));
        assert_eq!(db.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(db.code(), "internal_error");
    }

    #[test]
    fn test_validation_status() {
        let body = ApiError::from(ValidationError::new("nickname", "must not be empty"));
        assert_eq!(body.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.code(), "invalid_request");
        assert_eq!(body.to_string(), "invalid nickname: must not be empty");

        let query = ApiError::InvalidQuery(ValidationError::new("page", "must be at least 1"));
        assert_eq!(query.status(), StatusCode::BAD_REQUEST);
        assert_eq!(query.code(), "invalid_request");
    }

    #[test]
    fn test_mismatch_is_forbidden() {
        assert_eq!(ApiError::SessionMismatch.status(), StatusCode::FORBIDDEN);
    }
}
