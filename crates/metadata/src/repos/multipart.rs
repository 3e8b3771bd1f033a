//! Multipart upload repository.

use crate::error::MetadataResult;
use crate::models::{MultipartRow, PartRow};
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for multipart upload tracking.
#[async_trait]
pub trait MultipartRepo: Send + Sync {
    /// Create the multipart record for a session.
    async fn create_multipart(&self, multipart: &MultipartRow) -> MetadataResult<()>;

    /// Get the multipart record for a session.
    async fn get_multipart(&self, session_id: Uuid) -> MetadataResult<Option<MultipartRow>>;

    /// Get recorded parts for a session, ordered by part number.
    async fn get_parts(&self, session_id: Uuid) -> MetadataResult<Vec<PartRow>>;

    /// Record a confirmed part. A duplicate part number violates the
    /// primary key and surfaces as a constraint error (backstop behind
    /// the domain-level duplicate check).
    async fn add_part(&self, part: &PartRow) -> MetadataResult<()>;

    /// Update the multipart lifecycle status.
    async fn update_multipart_status(
        &self,
        session_id: Uuid,
        status: &str,
    ) -> MetadataResult<()>;
}
