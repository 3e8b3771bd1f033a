//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("storage error: {0}")]
    Storage(#[from] stow_storage::StorageError),

    #[error("metadata error: {0}")]
    Metadata(#[from] stow_metadata::MetadataError),

    #[error(transparent)]
    Core(#[from] stow_core::Error),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal_error",
            Self::Storage(_) => "storage_error",
            Self::Metadata(_) => "metadata_error",
            Self::Core(e) => match e {
                stow_core::Error::AlreadyCompleted => "already_completed",
                stow_core::Error::AlreadyTerminal { .. } => "session_terminal",
                stow_core::Error::SessionExpired => "session_expired",
                stow_core::Error::RateLimitExceeded { .. } => "rate_limit_exceeded",
                stow_core::Error::DuplicatePartNumber(_) => "duplicate_part",
                stow_core::Error::IncompleteParts { .. } => "incomplete_parts",
                stow_core::Error::ChecksumMismatch { .. } => "checksum_mismatch",
                stow_core::Error::FileNotFoundInStorage(_) => "object_missing",
                _ => "invalid_request",
            },
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Storage(e) => match e {
                stow_storage::StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                stow_storage::StorageError::UploadNotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Metadata(e) => match e {
                stow_metadata::MetadataError::NotFound(_) => StatusCode::NOT_FOUND,
                stow_metadata::MetadataError::AlreadyExists(_) => StatusCode::CONFLICT,
                stow_metadata::MetadataError::Constraint(_) => StatusCode::CONFLICT,
                stow_metadata::MetadataError::VersionConflict { .. } => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Core(e) => match e {
                stow_core::Error::AlreadyCompleted => StatusCode::CONFLICT,
                stow_core::Error::AlreadyTerminal { .. } => StatusCode::CONFLICT,
                stow_core::Error::DuplicatePartNumber(_) => StatusCode::CONFLICT,
                stow_core::Error::MultipartAborted => StatusCode::CONFLICT,
                stow_core::Error::SessionExpired => StatusCode::GONE,
                stow_core::Error::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
                stow_core::Error::IncompleteParts { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                stow_core::Error::FileNotFoundInStorage(_) => StatusCode::UNPROCESSABLE_ENTITY,
                stow_core::Error::MissingProviderUploadId => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_expected_statuses() {
        let cases = [
            (
                ApiError::Core(stow_core::Error::AlreadyCompleted),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::Core(stow_core::Error::SessionExpired),
                StatusCode::GONE,
            ),
            (
                ApiError::Core(stow_core::Error::RateLimitExceeded {
                    tenant_id: "t".to_string(),
                    current: 10,
                    max: 10,
                }),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                ApiError::Core(stow_core::Error::DuplicatePartNumber(2)),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::Core(stow_core::Error::IncompleteParts {
                    missing: 1,
                    total: 3,
                }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{err}");
        }
    }

    #[test]
    fn version_conflict_maps_to_conflict() {
        let err = ApiError::Metadata(stow_metadata::MetadataError::VersionConflict {
            session_id: "s".to_string(),
            expected: 1,
        });
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }
}
