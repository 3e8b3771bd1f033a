//! Object store trait for upload coordination.

use crate::error::StorageResult;
use async_trait::async_trait;
use std::time::Duration;
use time::OffsetDateTime;

/// Object metadata from a head request. The authoritative record of
/// what storage actually holds, as opposed to client declarations.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Object size in bytes.
    pub size: u64,
    /// Provider ETag.
    pub etag: String,
    /// Last modification time, if available.
    pub last_modified: Option<OffsetDateTime>,
    /// Content type, if available.
    pub content_type: Option<String>,
}

/// One confirmed part submitted to the provider's multipart-complete call.
#[derive(Debug, Clone)]
pub struct UploadPart {
    /// Part number, 1-based.
    pub part_number: u32,
    /// Provider-issued ETag for the part.
    pub etag: String,
}

/// Result of a provider multipart-complete call.
#[derive(Debug, Clone)]
pub struct CompletedObject {
    /// ETag of the assembled object.
    pub etag: String,
    /// Provider-reported location, if any.
    pub location: Option<String>,
}

/// Abstraction over object storage backends.
///
/// Bytes never flow through this interface: clients upload directly via
/// presigned URLs. The server only coordinates (initiate, presign,
/// complete) and verifies (head, exists).
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get object metadata. Returns NotFound if the object doesn't exist.
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta>;

    /// Presign a single-shot PUT for direct client upload.
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Presign a GET for direct client download.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    /// Start a provider multipart upload, returning the provider-assigned
    /// upload id.
    async fn initiate_multipart(&self, key: &str, content_type: &str) -> StorageResult<String>;

    /// Presign an UploadPart request for one numbered part.
    async fn presign_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Submit the accumulated parts to the provider's multipart-complete
    /// API. Not safe to blindly retry: a successful-but-unacknowledged
    /// completion must be detected via `exists`/`head` first.
    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[UploadPart],
    ) -> StorageResult<CompletedObject>;

    /// Abort a provider multipart upload, discarding uploaded parts.
    async fn abort_multipart(&self, key: &str, upload_id: &str) -> StorageResult<()>;

    /// Get the backend name for logging/diagnostics.
    fn backend_name(&self) -> &'static str;

    /// Verify backend connectivity and accessibility.
    ///
    /// Default implementation returns Ok. Backends should override to
    /// perform lightweight connectivity checks at startup.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}
