//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid session id: {0}")]
    InvalidSessionId(String),

    #[error("invalid idempotency key: {0}")]
    InvalidIdempotencyKey(String),

    #[error("invalid file: {0}")]
    InvalidFile(String),

    #[error("session expired")]
    SessionExpired,

    #[error("session already completed")]
    AlreadyCompleted,

    #[error("session is terminal: {status}")]
    AlreadyTerminal { status: String },

    #[error("not a multipart session")]
    NotMultipart,

    #[error("multipart upload id not assigned by the provider")]
    MissingProviderUploadId,

    #[error("invalid total parts: {total} (must be between 1 and {max})")]
    InvalidTotalParts { total: u32, max: u32 },

    #[error("invalid part number: {part} (must be between 1 and {total})")]
    InvalidPartNumber { part: u32, total: u32 },

    #[error("duplicate part number: {0}")]
    DuplicatePartNumber(u32),

    #[error("invalid part: {0}")]
    InvalidPart(String),

    #[error("incomplete parts: {missing} of {total} missing")]
    IncompleteParts { missing: u32, total: u32 },

    #[error("multipart upload aborted")]
    MultipartAborted,

    #[error("rate limit exceeded for tenant {tenant_id}: {current} of {max} sessions active")]
    RateLimitExceeded {
        tenant_id: String,
        current: u64,
        max: u64,
    },

    #[error("object not found in storage: {0}")]
    FileNotFoundInStorage(String),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
