//! Upload session repository.

use crate::error::MetadataResult;
use crate::models::SessionRow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for upload session operations.
#[async_trait]
pub trait SessionRepo: Send + Sync {
    /// Create a new upload session at version 0.
    async fn create_session(&self, session: &SessionRow) -> MetadataResult<()>;

    /// Get an upload session by ID.
    async fn get_session(&self, session_id: Uuid) -> MetadataResult<Option<SessionRow>>;

    /// Look up the session holding an idempotency key, if any.
    async fn find_by_idempotency_key(&self, key: &str) -> MetadataResult<Option<SessionRow>>;

    /// Compare-and-swap write of a session's mutable columns.
    ///
    /// The write succeeds only if the stored version still equals
    /// `expected_version`; on success the stored version becomes
    /// `expected_version + 1`. A stale version yields
    /// `MetadataError::VersionConflict`; callers re-read and decide
    /// whether the new state already satisfies them.
    async fn update_session(
        &self,
        session: &SessionRow,
        expected_version: i64,
    ) -> MetadataResult<()>;

    /// Get live sessions whose deadline passed, oldest first.
    async fn find_expired(
        &self,
        now: OffsetDateTime,
        limit: u32,
    ) -> MetadataResult<Vec<SessionRow>>;

    /// Count live (pending or active) sessions for a tenant.
    async fn count_active_sessions(&self, tenant_id: &str) -> MetadataResult<u64>;
}
