//! Confirmation concurrency controller.
//!
//! Every transition to a terminal status is a version-guarded write. A
//! writer that loses the conditional update re-reads the session and
//! either converges (the racer completed it) or reports the terminal
//! status it found. The file asset insert is keyed by session id, so at
//! most one confirmation persists it.

use crate::error::{ApiError, ApiResult};
use crate::notify::Notifier;
use std::sync::Arc;
use stow_core::api::SessionResponse;
use stow_core::{
    FileAsset, MultipartStatus, MultipartUpload, SessionId, SessionStatus, UploadKind,
    UploadSession,
};
use stow_metadata::models::{AssetRow, SessionRow, multipart_into_domain};
use stow_metadata::{MetadataError, MetadataStore};
use stow_storage::{ObjectMeta, ObjectStore, StorageError, UploadPart};
use time::OffsetDateTime;

/// Drives sessions to their terminal statuses.
pub struct ConfirmationService {
    storage: Arc<dyn ObjectStore>,
    metadata: Arc<dyn MetadataStore>,
    notifier: Arc<dyn Notifier>,
}

impl ConfirmationService {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            storage,
            metadata,
            notifier,
        }
    }

    /// Confirm an upload, dispatching on the session kind.
    ///
    /// Idempotent: confirming an already-completed session returns it
    /// unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn confirm(&self, session_id: &str) -> ApiResult<SessionResponse> {
        let session = self.load_session(session_id).await?;
        match session.kind {
            UploadKind::Single => self.confirm_single(session).await,
            UploadKind::Multipart => self.confirm_multipart(session).await,
        }
    }

    async fn confirm_single(&self, session: UploadSession) -> ApiResult<SessionResponse> {
        if session.status == SessionStatus::Completed {
            return Ok(SessionResponse::from_session(&session));
        }
        self.require_confirmable(&session)?;

        // The head call is the verification step: storage, not the
        // client, is the authority on what was actually uploaded.
        let meta = match self.storage.head(&session.storage_key).await {
            Ok(meta) => meta,
            Err(StorageError::NotFound(_)) => {
                return Err(
                    stow_core::Error::FileNotFoundInStorage(session.storage_key.clone()).into(),
                );
            }
            Err(e) => return Err(e.into()),
        };
        session.verify_checksum(&meta.etag)?;

        self.finalize(session, meta).await
    }

    async fn confirm_multipart(&self, session: UploadSession) -> ApiResult<SessionResponse> {
        if session.status == SessionStatus::Completed {
            return Ok(SessionResponse::from_session(&session));
        }
        self.require_confirmable(&session)?;

        let multipart = self.load_multipart(&session).await?;
        match multipart.status {
            MultipartStatus::Aborted => return Err(stow_core::Error::MultipartAborted.into()),
            MultipartStatus::Expired => return Err(stow_core::Error::SessionExpired.into()),
            _ => {}
        }
        // Completeness gate runs before any provider call; an
        // under-filled upload must never reach CompleteMultipartUpload.
        multipart.require_complete()?;

        if multipart.status != MultipartStatus::Completed {
            self.complete_with_provider(&session, &multipart).await?;
        }

        let meta = match self.storage.head(&session.storage_key).await {
            Ok(meta) => meta,
            Err(StorageError::NotFound(_)) => {
                return Err(
                    stow_core::Error::FileNotFoundInStorage(session.storage_key.clone()).into(),
                );
            }
            Err(e) => return Err(e.into()),
        };

        self.finalize(session, meta).await
    }

    /// Submit the parts to the provider, tolerating a racer that
    /// already finished the provider upload.
    async fn complete_with_provider(
        &self,
        session: &UploadSession,
        multipart: &MultipartUpload,
    ) -> ApiResult<()> {
        let parts: Vec<UploadPart> = multipart
            .sorted_parts()
            .into_iter()
            .map(|p| UploadPart {
                part_number: p.part_number,
                etag: p.etag,
            })
            .collect();

        match self
            .storage
            .complete_multipart(
                &session.storage_key,
                &multipart.provider_upload_id,
                &parts,
            )
            .await
        {
            Ok(_) => {
                self.metadata
                    .update_multipart_status(
                        *session.id.as_uuid(),
                        MultipartStatus::Completed.as_str(),
                    )
                    .await?;
                Ok(())
            }
            Err(StorageError::UploadNotFound(_)) => {
                // A concurrent confirmation got there first. If the
                // assembled object exists, converge on it; otherwise the
                // upload was aborted or expired underneath us.
                if self.storage.exists(&session.storage_key).await? {
                    Ok(())
                } else {
                    Err(stow_core::Error::MultipartAborted.into())
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Explicitly fail a live session, recording the reason and
    /// notifying downstream.
    #[tracing::instrument(skip(self, reason))]
    pub async fn fail(&self, session_id: &str, reason: &str) -> ApiResult<SessionResponse> {
        let mut session = self.load_session(session_id).await?;
        loop {
            let now = OffsetDateTime::now_utc();
            session.fail(now)?;
            let mut row = SessionRow::from_domain(&session);
            row.error_reason = Some(reason.to_string());
            match self.metadata.update_session(&row, session.version).await {
                Ok(()) => {
                    session.version += 1;
                    if session.kind == UploadKind::Multipart {
                        self.abort_provider(&session).await;
                    }
                    self.notifier
                        .session_failed(session.id, &session.tenant_id, reason)
                        .await;
                    return Ok(SessionResponse::from_session(&session));
                }
                Err(MetadataError::VersionConflict { .. }) => {
                    session = self.reload(&session.id).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Cancel a live session and discard any provider multipart upload.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, session_id: &str) -> ApiResult<SessionResponse> {
        let mut session = self.load_session(session_id).await?;
        loop {
            session.cancel()?;
            let row = SessionRow::from_domain(&session);
            match self.metadata.update_session(&row, session.version).await {
                Ok(()) => {
                    session.version += 1;
                    if session.kind == UploadKind::Multipart {
                        self.abort_provider(&session).await;
                    }
                    return Ok(SessionResponse::from_session(&session));
                }
                Err(MetadataError::VersionConflict { .. }) => {
                    session = self.reload(&session.id).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// CAS completion loop shared by both confirmation paths.
    ///
    /// The asset row lands before the session flips. A failure between
    /// the two writes leaves the session live and retryable, never
    /// completed without its asset. The notification follows the asset
    /// insert, the one write that happens exactly once.
    async fn finalize(
        &self,
        mut session: UploadSession,
        meta: ObjectMeta,
    ) -> ApiResult<SessionResponse> {
        let now = OffsetDateTime::now_utc();
        session.complete(meta.etag.clone(), now)?;

        let asset = FileAsset {
            session_id: session.id,
            storage_key: session.storage_key.clone(),
            size: meta.size,
            etag: meta.etag.clone(),
            content_type: meta
                .content_type
                .clone()
                .unwrap_or_else(|| session.content_type.clone()),
            created_at: now,
        };
        let inserted = self
            .metadata
            .save_asset(&AssetRow::from_domain(&asset))
            .await?;

        loop {
            let row = SessionRow::from_domain(&session);
            match self.metadata.update_session(&row, session.version).await {
                Ok(()) => {
                    session.version += 1;
                    if inserted {
                        self.notifier
                            .session_completed(session.id, &session.tenant_id)
                            .await;
                    }
                    return Ok(SessionResponse::from_session(&session));
                }
                Err(MetadataError::VersionConflict { .. }) => {
                    // Lost the write. Re-read: if the racer completed the
                    // session, converge on its result; a live session just
                    // means an interleaved activation, so retry.
                    let fresh = self.reload(&session.id).await?;
                    match fresh.status {
                        SessionStatus::Completed => {
                            if inserted {
                                self.notifier
                                    .session_completed(fresh.id, &fresh.tenant_id)
                                    .await;
                            }
                            return Ok(SessionResponse::from_session(&fresh));
                        }
                        status if status.is_terminal() => {
                            return Err(stow_core::Error::AlreadyTerminal {
                                status: status.as_str().to_string(),
                            }
                            .into());
                        }
                        _ => {
                            session = fresh;
                            session.complete(meta.etag.clone(), OffsetDateTime::now_utc())?;
                        }
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Best-effort provider cleanup for failed or cancelled multipart
    /// sessions. Errors are logged, never propagated: the session's
    /// terminal status is already durable.
    async fn abort_provider(&self, session: &UploadSession) {
        let multipart = match self.metadata.get_multipart(*session.id.as_uuid()).await {
            Ok(Some(row)) => row,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(session_id = %session.id, error = %e, "multipart lookup failed during cleanup");
                return;
            }
        };
        if multipart.status == MultipartStatus::Completed.as_str()
            || multipart.status == MultipartStatus::Aborted.as_str()
        {
            return;
        }
        if let Err(e) = self
            .storage
            .abort_multipart(&session.storage_key, &multipart.provider_upload_id)
            .await
        {
            tracing::warn!(session_id = %session.id, error = %e, "provider abort failed");
        }
        if let Err(e) = self
            .metadata
            .update_multipart_status(*session.id.as_uuid(), MultipartStatus::Aborted.as_str())
            .await
        {
            tracing::warn!(session_id = %session.id, error = %e, "multipart status update failed");
        }
    }

    fn require_confirmable(&self, session: &UploadSession) -> ApiResult<()> {
        if session.status.is_terminal() {
            return Err(stow_core::Error::AlreadyTerminal {
                status: session.status.as_str().to_string(),
            }
            .into());
        }
        // A live-but-overdue session rejects confirmation even though the
        // sweep has not visited it yet; the deadline is the authority.
        if session.is_expired(OffsetDateTime::now_utc()) {
            return Err(stow_core::Error::SessionExpired.into());
        }
        Ok(())
    }

    async fn load_session(&self, session_id: &str) -> ApiResult<UploadSession> {
        let id = SessionId::parse(session_id)?;
        self.reload(&id).await
    }

    async fn reload(&self, id: &SessionId) -> ApiResult<UploadSession> {
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
