//! In-memory storage backend.
//!
//! Holds object metadata and multipart state in process memory. Presigned
//! URLs are synthetic (`memory://` scheme); bytes are never stored. Useful
//! for tests and local development where the coordination flow matters but
//! real object storage does not.

use crate::error::{StorageError, StorageResult};
use crate::traits::{CompletedObject, ObjectMeta, ObjectStore, UploadPart};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::instrument;

#[derive(Debug, Clone)]
struct StoredObject {
    size: u64,
    etag: String,
    content_type: Option<String>,
    last_modified: OffsetDateTime,
}

#[derive(Debug, Clone)]
struct PendingMultipart {
    key: String,
    content_type: String,
    /// part_number -> (etag, size)
    parts: HashMap<u32, (String, u64)>,
}

/// In-memory object store.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: RwLock<HashMap<String, StoredObject>>,
    multiparts: RwLock<HashMap<String, PendingMultipart>>,
    upload_counter: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an object as present, as if a client had uploaded it through
    /// a presigned URL. Intended for tests.
    pub async fn put_object(&self, key: &str, size: u64, etag: &str, content_type: &str) {
        let mut objects = self.objects.write().await;
        objects.insert(
            key.to_string(),
            StoredObject {
                size,
                etag: etag.to_string(),
                content_type: Some(content_type.to_string()),
                last_modified: OffsetDateTime::now_utc(),
            },
        );
    }

    /// Record a part as uploaded to a pending multipart upload, as if a
    /// client had PUT it through a presigned part URL. Intended for tests.
    pub async fn register_part(
        &self,
        upload_id: &str,
        part_number: u32,
        etag: &str,
        size: u64,
    ) -> StorageResult<()> {
        let mut multiparts = self.multiparts.write().await;
        let pending = multiparts
            .get_mut(upload_id)
            .ok_or_else(|| StorageError::UploadNotFound(upload_id.to_string()))?;
        pending
            .parts
            .insert(part_number, (etag.to_string(), size));
        Ok(())
    }

    /// Number of live multipart uploads. Intended for tests.
    pub async fn pending_multipart_count(&self) -> usize {
        self.multiparts.read().await.len()
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        let objects = self.objects.read().await;
        let obj = objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(ObjectMeta {
            size: obj.size,
            etag: obj.etag.clone(),
            last_modified: Some(obj.last_modified),
            content_type: obj.content_type.clone(),
        })
    }

    async fn presign_put(
        &self,
        key: &str,
        _content_type: &str,
        expires_in: std::time::Duration,
    ) -> StorageResult<String> {
        Ok(format!(
            "memory://put/{}?expires={}",
            key,
            expires_in.as_secs()
        ))
    }

    async fn presign_get(&self, key: &str, expires_in: std::time::Duration) -> StorageResult<String> {
        if !self.objects.read().await.contains_key(key) {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(format!(
            "memory://get/{}?expires={}",
            key,
            expires_in.as_secs()
        ))
    }

    #[instrument(skip(self), fields(backend = "memory"))]
    async fn initiate_multipart(&self, key: &str, content_type: &str) -> StorageResult<String> {
        let id = self.upload_counter.fetch_add(1, Ordering::Relaxed);
        let upload_id = format!("mem-upload-{id:08}");
        let mut multiparts = self.multiparts.write().await;
        multiparts.insert(
            upload_id.clone(),
            PendingMultipart {
                key: key.to_string(),
                content_type: content_type.to_string(),
                parts: HashMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn presign_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        expires_in: std::time::Duration,
    ) -> StorageResult<String> {
        if !self.multiparts.read().await.contains_key(upload_id) {
            return Err(StorageError::UploadNotFound(upload_id.to_string()));
        }
        Ok(format!(
            "memory://part/{}?uploadId={}&partNumber={}&expires={}",
            key,
            upload_id,
            part_number,
            expires_in.as_secs()
        ))
    }

    #[instrument(skip(self, parts), fields(backend = "memory", parts = parts.len()))]
    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[UploadPart],
    ) -> StorageResult<CompletedObject> {
        let mut multiparts = self.multiparts.write().await;
        let pending = multiparts
            .get(upload_id)
            .ok_or_else(|| StorageError::UploadNotFound(upload_id.to_string()))?;

        if pending.key != key {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        let mut total_size = 0u64;
        for part in parts {
            let (etag, size) = pending.parts.get(&part.part_number).ok_or_else(|| {
                StorageError::InvalidPart(format!("part {} was never uploaded", part.part_number))
            })?;
            if *etag != part.etag {
                return Err(StorageError::InvalidPart(format!(
                    "etag mismatch for part {}",
                    part.part_number
                )));
            }
            total_size += size;
        }

        let etag = format!("{:x}-{}", total_size ^ 0xfeed_beef, parts.len());
        let content_type = pending.content_type.clone();

        // Insert the assembled object before releasing the multiparts
        // lock so a racing caller never sees the upload gone while the
        // object is not yet visible.
        let mut objects = self.objects.write().await;
        objects.insert(
            key.to_string(),
            StoredObject {
                size: total_size,
                etag: etag.clone(),
                content_type: Some(content_type),
                last_modified: OffsetDateTime::now_utc(),
            },
        );
        drop(objects);
        multiparts.remove(upload_id);

        Ok(CompletedObject {
            etag,
            location: Some(format!("memory://{key}")),
        })
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) -> StorageResult<()> {
        let mut multiparts = self.multiparts.write().await;
        match multiparts.remove(upload_id) {
            Some(pending) if pending.key == key => Ok(()),
            Some(pending) => {
                // Mismatched key: put it back and report.
                multiparts.insert(upload_id.to_string(), pending);
                Err(StorageError::InvalidKey(key.to_string()))
            }
            None => Err(StorageError::UploadNotFound(upload_id.to_string())),
        }
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
