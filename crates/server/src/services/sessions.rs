//! Session creation, part tracking, and download URL issuance.

use crate::error::{ApiError, ApiResult};
use std::sync::Arc;
use std::time::Duration;
use stow_core::api::{
    BatchDownloadItem, BatchDownloadRequest, BatchDownloadResponse, CreateSessionRequest,
    CreateSessionResponse, MarkPartRequest, PartProgressResponse, PartUrl, SessionResponse,
};
use stow_core::config::AppConfig;
use stow_core::{
    CompletedPart, IdempotencyKey, MultipartUpload, RateLimitSnapshot, SessionId, SessionStatus,
    UploadKind, UploadSession,
};
use stow_metadata::models::{MultipartRow, PartRow, SessionRow, multipart_into_domain};
use stow_metadata::{MetadataError, MetadataStore};
use stow_storage::ObjectStore;
use time::OffsetDateTime;

/// Creates sessions, records confirmed parts, and issues download URLs.
///
/// Completion is not handled here; see [`crate::services::confirm`].
pub struct SessionService {
    config: Arc<AppConfig>,
    storage: Arc<dyn ObjectStore>,
    metadata: Arc<dyn MetadataStore>,
}

impl SessionService {
    pub fn new(
        config: Arc<AppConfig>,
        storage: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        Self {
            config,
            storage,
            metadata,
        }
    }

    /// Create an upload session and presign its upload URLs.
    ///
    /// The idempotency key is resolved before the rate-limit check so
    /// that a retried request never burns a concurrency slot.
    #[tracing::instrument(skip(self, req), fields(tenant_id = %req.tenant_id))]
    pub async fn create(&self, req: CreateSessionRequest) -> ApiResult<CreateSessionResponse> {
        self.validate_create(&req)?;

        let idempotency_key = req
            .idempotency_key
            .as_deref()
            .map(IdempotencyKey::parse)
            .transpose()?;

        if let Some(key) = &idempotency_key
            && let Some(existing) = self.resolve_idempotent(key).await?
        {
            return Ok(existing);
        }

        let snapshot = self.rate_limit_snapshot(&req.tenant_id).await?;
        if !snapshot.allowed {
            return Err(stow_core::Error::RateLimitExceeded {
                tenant_id: snapshot.tenant_id,
                current: snapshot.current_count,
                max: snapshot.max_allowed,
            }
            .into());
        }

        let kind = req.kind.unwrap_or_else(|| {
            UploadKind::for_size(req.file_size, self.config.limits.multipart_threshold_bytes)
        });
        let content_type = req
            .content_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let mut session = UploadSession::new(
            req.tenant_id.clone(),
            req.file_name.clone(),
            req.file_size,
            content_type,
            kind,
            String::new(),
            idempotency_key,
            self.config.limits.session_ttl(),
        );
        session.storage_key = storage_key(&session.tenant_id, &session.id, &session.file_name);
        session.checksum = req.checksum.clone();

        let expiry = self.config.server.presign_expiry();
        let (upload_url, part_urls, multipart_row) = match kind {
            UploadKind::Single => {
                let url = self
                    .storage
                    .presign_put(&session.storage_key, &session.content_type, expiry)
                    .await?;
                (Some(url), Vec::new(), None)
            }
            UploadKind::Multipart => {
                let total_parts = req.total_parts.ok_or_else(|| {
                    ApiError::BadRequest(
                        "total_parts is required for multipart sessions".to_string(),
                    )
                })?;
                // Bounds-check before touching the provider so an invalid
                // request never leaves a dangling provider upload.
                if total_parts == 0 || total_parts > stow_core::MAX_TOTAL_PARTS {
                    return Err(stow_core::Error::InvalidTotalParts {
                        total: total_parts,
                        max: stow_core::MAX_TOTAL_PARTS,
                    }
                    .into());
                }

                let provider_upload_id = self
                    .storage
                    .initiate_multipart(&session.storage_key, &session.content_type)
                    .await?;
                let multipart = MultipartUpload::initiate(
                    session.id,
                    provider_upload_id,
                    total_parts,
                    session.created_at,
                )?;

                let mut urls = Vec::with_capacity(total_parts as usize);
                for part_number in 1..=total_parts {
                    let url = self
                        .storage
                        .presign_part(
                            &session.storage_key,
                            &multipart.provider_upload_id,
                            part_number,
                            expiry,
                        )
                        .await?;
                    urls.push(PartUrl { part_number, url });
                }

                let row = MultipartRow {
                    session_id: *session.id.as_uuid(),
                    provider_upload_id: multipart.provider_upload_id.clone(),
                    total_parts: total_parts as i64,
                    status: multipart.status.as_str().to_string(),
                    created_at: multipart.created_at,
                };
                (None, urls, Some(row))
            }
        };

        let row = SessionRow::from_domain(&session);
        match self.metadata.create_session(&row).await {
            Ok(()) => {}
            Err(MetadataError::AlreadyExists(_)) if session.idempotency_key.is_some() => {
                // Lost a creation race on the key. Discard the provider
                // upload we opened and return the winner's session.
                if let Some(mp) = &multipart_row {
                    let _ = self
                        .storage
                        .abort_multipart(&session.storage_key, &mp.provider_upload_id)
                        .await;
                }
                let key = session
                    .idempotency_key
                    .clone()
                    .ok_or_else(|| ApiError::Internal("idempotency key vanished".to_string()))?;
                if let Some(existing) = self.resolve_idempotent(&key).await? {
                    return Ok(existing);
                }
                return Err(ApiError::Conflict(format!(
                    "idempotency key {key} is already in use"
                )));
            }
            Err(e) => return Err(e.into()),
        }
        if let Some(mp) = &multipart_row {
            self.metadata.create_multipart(mp).await?;
        }

        tracing::info!(
            session_id = %session.id,
            kind = kind.as_str(),
            file_size = session.file_size,
            "session created"
        );

        Ok(CreateSessionResponse {
            session_id: session.id,
            status: session.status,
            kind,
            storage_key: session.storage_key,
            expires_at: session.expires_at,
            upload_url,
            part_urls,
            created: true,
        })
    }

    /// Get the client view of a session, with part progress for
    /// multipart sessions.
    pub async fn get(&self, session_id: &str) -> ApiResult<SessionResponse> {
        let session = self.load_session(session_id).await?;
        let mut resp = SessionResponse::from_session(&session);
        if session.kind == UploadKind::Multipart
            && let Some(row) = self.metadata.get_multipart(*session.id.as_uuid()).await?
        {
            let parts = self.metadata.get_parts(*session.id.as_uuid()).await?;
            resp.total_parts = Some(row.total_parts as u32);
            resp.parts_received = Some(parts.len() as u32);
        }
        Ok(resp)
    }

    /// Record one uploaded part for a multipart session.
    ///
    /// The first recorded part activates the session. Resubmitting an
    /// already-recorded part number is a hard error.
    #[tracing::instrument(skip(self, req), fields(part_number = req.part_number))]
    pub async fn mark_part_uploaded(
        &self,
        session_id: &str,
        req: MarkPartRequest,
    ) -> ApiResult<PartProgressResponse> {
        let mut session = self.load_session(session_id).await?;
        if session.kind != UploadKind::Multipart {
            return Err(stow_core::Error::NotMultipart.into());
        }
        // The session row is the authority on terminality; the multipart
        // status is only updated best-effort during cleanup and can lag.
        if session.status.is_terminal() {
            return Err(stow_core::Error::AlreadyTerminal {
                status: session.status.as_str().to_string(),
            }
            .into());
        }
        let now = OffsetDateTime::now_utc();
        if session.is_expired(now) {
            return Err(stow_core::Error::SessionExpired.into());
        }

        let mut multipart = self.load_multipart(&session).await?;
        let part = CompletedPart::new(req.part_number, req.etag, req.size, now)?;
        let prev_status = multipart.status;
        multipart.add_part(part.clone())?;

        let part_row = PartRow {
            session_id: *session.id.as_uuid(),
            part_number: part.part_number as i64,
            etag: part.etag.clone(),
            size_bytes: part.size as i64,
            created_at: part.created_at,
        };
        // The primary key is the backstop against a racing duplicate that
        // slipped past the in-memory check.
        match self.metadata.add_part(&part_row).await {
            Ok(()) => {}
            Err(MetadataError::Constraint(_)) => {
                return Err(stow_core::Error::DuplicatePartNumber(part.part_number).into());
            }
            Err(e) => return Err(e.into()),
        }
        if multipart.status != prev_status {
            self.metadata
                .update_multipart_status(*session.id.as_uuid(), multipart.status.as_str())
                .await?;
        }

        if session.status == SessionStatus::Pending {
            session.activate()?;
            let row = SessionRow::from_domain(&session);
            match self.metadata.update_session(&row, session.version).await {
                // A racing writer already moved the session on; the part is
                // recorded either way and later operations see the real status.
                Ok(()) | Err(MetadataError::VersionConflict { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(PartProgressResponse {
            session_id: session.id,
            received: multipart.parts.len() as u32,
            total: multipart.total_parts,
            complete: multipart.is_complete(),
            status: multipart.status,
        })
    }

    /// Compute the advisory rate-limit snapshot for a tenant.
    pub async fn check_rate_limit(&self, tenant_id: &str) -> ApiResult<RateLimitSnapshot> {
        self.rate_limit_snapshot(tenant_id).await
    }

    /// Presign download URLs for a batch of completed sessions.
    ///
    /// The batch size guard runs before any lookups; per-item failures
    /// are reported inline instead of failing the whole batch.
    pub async fn batch_download_urls(
        &self,
        req: BatchDownloadRequest,
    ) -> ApiResult<BatchDownloadResponse> {
        let max = self.config.limits.max_batch_urls;
        if req.session_ids.len() > max {
            return Err(ApiError::BadRequest(format!(
                "batch of {} exceeds the limit of {max} download urls",
                req.session_ids.len()
            )));
        }

        let expiry = self.config.server.presign_expiry();
        let mut items = Vec::with_capacity(req.session_ids.len());
        for raw in &req.session_ids {
            let item = match self.download_url(raw, expiry).await {
                Ok(url) => BatchDownloadItem {
                    session_id: raw.clone(),
                    url: Some(url),
                    error: None,
                },
                Err(e) => BatchDownloadItem {
                    session_id: raw.clone(),
                    url: None,
                    error: Some(e.to_string()),
                },
            };
            items.push(item);
        }
        Ok(BatchDownloadResponse { items })
    }

    async fn download_url(&self, raw: &str, expiry: Duration) -> ApiResult<String> {
        let session = self.load_session(raw).await?;
        if session.status != SessionStatus::Completed {
            return Err(ApiError::Conflict(format!(
                "session {} is {}, not completed",
                session.id,
                session.status.as_str()
            )));
        }
        Ok(self.storage.presign_get(&session.storage_key, expiry).await?)
    }

    fn validate_create(&self, req: &CreateSessionRequest) -> ApiResult<()> {
        if req.tenant_id.trim().is_empty() {
            return Err(ApiError::BadRequest("tenant_id must not be empty".to_string()));
        }
        if req.file_name.trim().is_empty() {
            return Err(stow_core::Error::InvalidFile("file name must not be empty".to_string()).into());
        }
        if req.file_name.contains('/') || req.file_name.contains("..") {
            return Err(stow_core::Error::InvalidFile(
                "file name must not contain path separators".to_string(),
            )
            .into());
        }
        if req.file_size == 0 {
            return Err(stow_core::Error::InvalidFile("file size must be > 0".to_string()).into());
        }
        if req.file_size > self.config.limits.max_file_size {
            return Err(stow_core::Error::InvalidFile(format!(
                "file size {} exceeds the maximum of {}",
                req.file_size, self.config.limits.max_file_size
            ))
            .into());
        }
        Ok(())
    }

    /// Resolve an idempotency key against existing sessions.
    ///
    /// A live holder is returned as-is with fresh URLs; a completed
    /// holder is a hard error so callers notice the retry is pointless;
    /// any other terminal holder is likewise rejected with its status.
    async fn resolve_idempotent(
        &self,
        key: &IdempotencyKey,
    ) -> ApiResult<Option<CreateSessionResponse>> {
        let Some(row) = self.metadata.find_by_idempotency_key(key.as_str()).await? else {
            return Ok(None);
        };
        let session = row.into_domain()?;
        match session.status {
            SessionStatus::Completed => Err(stow_core::Error::AlreadyCompleted.into()),
            status if status.is_terminal() => Err(stow_core::Error::AlreadyTerminal {
                status: status.as_str().to_string(),
            }
            .into()),
            _ => {
                tracing::debug!(
                    session_id = %session.id,
                    "idempotency key matched a live session, returning it"
                );
                Ok(Some(self.reissue_urls(session).await?))
            }
        }
    }

    /// Re-presign upload URLs for an existing live session.
    async fn reissue_urls(&self, session: UploadSession) -> ApiResult<CreateSessionResponse> {
        let expiry = self.config.server.presign_expiry();
        let (upload_url, part_urls) = match session.kind {
            UploadKind::Single => {
                let url = self
                    .storage
                    .presign_put(&session.storage_key, &session.content_type, expiry)
                    .await?;
                (Some(url), Vec::new())
            }
            UploadKind::Multipart => {
                let multipart = self.load_multipart(&session).await?;
                let recorded: Vec<u32> =
                    multipart.parts.iter().map(|p| p.part_number).collect();
                let mut urls = Vec::new();
                for part_number in 1..=multipart.total_parts {
                    if recorded.contains(&part_number) {
                        continue;
                    }
                    let url = self
                        .storage
                        .presign_part(
                            &session.storage_key,
                            &multipart.provider_upload_id,
                            part_number,
                            expiry,
                        )
                        .await?;
                    urls.push(PartUrl { part_number, url });
                }
                (None, urls)
            }
        };

        Ok(CreateSessionResponse {
            session_id: session.id,
            status: session.status,
            kind: session.kind,
            storage_key: session.storage_key,
            expires_at: session.expires_at,
            upload_url,
            part_urls,
            created: false,
        })
    }

    async fn rate_limit_snapshot(&self, tenant_id: &str) -> ApiResult<RateLimitSnapshot> {
        let count = self.metadata.count_active_sessions(tenant_id).await?;
        Ok(RateLimitSnapshot::compute(
            tenant_id.to_string(),
            count,
            self.config.limits.max_concurrent_per_tenant,
        ))
    }

    async fn load_session(&self, session_id: &str) -> ApiResult<UploadSession> {
        let id = SessionId::parse(session_id)?;
        let row = self
            .metadata
            .get_session(*id.as_uuid())
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("session {id} not found")))?;
        Ok(row.into_domain()?)
    }

    async fn load_multipart(&self, session: &UploadSession) -> ApiResult<MultipartUpload> {
        let row = self
            .metadata
            .get_multipart(*session.id.as_uuid())
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!(
                    "multipart upload for session {} not found",
                    session.id
                ))
            })?;
        let parts = self.metadata.get_parts(*session.id.as_uuid()).await?;
        Ok(multipart_into_domain(row, parts)?)
    }
}

/// Object key layout: one prefix per tenant, one directory per session.
fn storage_key(tenant_id: &str, session_id: &SessionId, file_name: &str) -> String {
    format!("{tenant_id}/{session_id}/{file_name}")
}
