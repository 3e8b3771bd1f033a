//! File asset records derived from completed uploads.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::session::SessionId;

/// The durable record of a finished upload, built from authoritative
/// storage metadata (headObject) rather than client declarations.
///
/// Persisted at most once per session; the store keys inserts by
/// session id so racing confirmations cannot duplicate it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAsset {
    /// Session the asset was derived from.
    pub session_id: SessionId,
    /// Object key in storage.
    pub storage_key: String,
    /// Authoritative object size from storage.
    pub size: u64,
    /// Provider ETag.
    pub etag: String,
    /// Content type reported by storage, falling back to the declared one.
    pub content_type: String,
    /// When the asset was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
