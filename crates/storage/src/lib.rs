//! Object storage port and backends for Stow.
//!
//! Uploads and downloads bypass the server entirely: this crate only
//! presigns URLs, coordinates provider multipart uploads, and verifies
//! object presence after the fact.

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::{MemoryBackend, S3Backend};
pub use error::{StorageError, StorageResult};
pub use traits::{CompletedObject, ObjectMeta, ObjectStore, UploadPart};

use std::sync::Arc;
use stow_core::config::StorageConfig;

/// Create an object store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    match config {
        StorageConfig::Memory => Ok(Arc::new(MemoryBackend::new()) as Arc<dyn ObjectStore>),
        StorageConfig::S3 {
            bucket,
            endpoint,
            region,
            prefix,
            access_key_id,
            secret_access_key,
            force_path_style,
        } => {
            let backend = S3Backend::new(
                bucket,
                endpoint.clone(),
                region.clone(),
                prefix.clone(),
                access_key_id.clone(),
                secret_access_key.clone(),
                *force_path_style,
            )
            .await?;
            Ok(Arc::new(backend) as Arc<dyn ObjectStore>)
        }
    }
}
