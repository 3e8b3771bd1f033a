//! File asset repository.

use crate::error::MetadataResult;
use crate::models::AssetRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for file asset records.
#[async_trait]
pub trait AssetRepo: Send + Sync {
    /// Persist the asset for a session, at most once.
    ///
    /// Keyed by session id with ignore-duplicate semantics: returns
    /// `true` if this call inserted the row, `false` if a concurrent
    /// confirmation already did. Never overwrites.
    async fn save_asset(&self, asset: &AssetRow) -> MetadataResult<bool>;

    /// Get the asset for a session.
    async fn get_asset(&self, session_id: Uuid) -> MetadataResult<Option<AssetRow>>;
}
