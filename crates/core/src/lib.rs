//! Core domain types and shared logic for the Stow upload coordination server.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Upload session aggregate and its status lifecycle
//! - Multipart upload tracking and part completeness
//! - Idempotency keys for creation deduplication
//! - Tenant rate-limit snapshots
//! - File asset records derived from completed uploads

pub mod api;
pub mod asset;
pub mod config;
pub mod error;
pub mod idempotency;
pub mod multipart;
pub mod ratelimit;
pub mod session;

pub use asset::FileAsset;
pub use error::{Error, Result};
pub use idempotency::IdempotencyKey;
pub use multipart::{CompletedPart, MultipartStatus, MultipartUpload};
pub use ratelimit::RateLimitSnapshot;
pub use session::{SessionId, SessionStatus, UploadKind, UploadSession};

/// Minimum multipart part size: 5 MiB (provider constraint).
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum multipart part size: 5 GiB (provider constraint).
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Maximum number of parts in a multipart upload (provider constraint).
pub const MAX_TOTAL_PARTS: u32 = 10_000;
