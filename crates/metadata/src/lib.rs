//! Metadata store abstraction and implementations for Stow.
//!
//! This crate provides the control-plane data model:
//! - Upload sessions with version-guarded (CAS) writes
//! - Multipart upload and part tracking
//! - File asset records with exactly-once persistence

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use repos::{AssetRepo, MultipartRepo, SessionRepo};
pub use store::{MetadataStore, SqliteStore};

use std::sync::Arc;
use stow_core::config::MetadataConfig;

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    match config {
        MetadataConfig::Sqlite {
            path,
            query_timeout_secs,
        } => {
            let store = SqliteStore::new(path, *query_timeout_secs).await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
    }
}
