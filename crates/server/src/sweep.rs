//! Background expiration sweep.
//!
//! Periodically marks overdue live sessions as expired. Each write is
//! version-guarded, so a confirmation racing the sweep wins cleanly:
//! the sweep's conditional update simply doesn't land and the session
//! stays completed.

use crate::notify::Notifier;
use crate::state::AppState;
use std::sync::Arc;
use stow_core::{MultipartStatus, UploadKind};
use stow_metadata::models::SessionRow;
use stow_metadata::{MetadataError, MetadataStore};
use stow_storage::ObjectStore;
use time::OffsetDateTime;
use tokio::task::JoinHandle;

/// Spawn the periodic sweep task.
pub fn spawn_sweep(state: AppState) -> JoinHandle<()> {
    let interval = state.config.sweep.interval();
    let batch_size = state.config.sweep.batch_size;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let expired = expire_due_sessions(
                &state.metadata,
                &state.storage,
                &state.notifier,
                OffsetDateTime::now_utc(),
                batch_size,
            )
            .await;
            if expired > 0 {
                tracing::info!(count = expired, "sweep expired sessions");
            }
        }
    })
}

/// Expire one batch of overdue live sessions. Returns how many were
/// actually transitioned.
pub async fn expire_due_sessions(
    metadata: &Arc<dyn MetadataStore>,
    storage: &Arc<dyn ObjectStore>,
    notifier: &Arc<dyn Notifier>,
    now: OffsetDateTime,
    batch_size: u32,
) -> usize {
    let rows = match metadata.find_expired(now, batch_size).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!(error = %e, "sweep query failed");
            return 0;
        }
    };

    let mut expired = 0;
    for row in rows {
        let mut session = match row.into_domain() {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "skipping undecodable session row");
                continue;
            }
        };
        let expected_version = session.version;
        session.expire();

        let update = SessionRow::from_domain(&session);
        match metadata.update_session(&update, expected_version).await {
            Ok(()) => {
                expired += 1;
                if session.kind == UploadKind::Multipart {
                    expire_provider_upload(metadata, storage, &session).await;
                }
                notifier.session_expired(session.id, &session.tenant_id).await;
            }
            // A concurrent confirmation bumped the version between our
            // read and write; its terminal status stands.
            Err(MetadataError::VersionConflict { .. }) => {}
            Err(e) => {
                tracing::warn!(session_id = %session.id, error = %e, "sweep update failed");
            }
        }
    }
    expired
}

/// Discard the provider-side multipart upload for an expired session.
/// Best-effort; the session is already durably expired.
async fn expire_provider_upload(
    metadata: &Arc<dyn MetadataStore>,
    storage: &Arc<dyn ObjectStore>,
    session: &stow_core::UploadSession,
) {
    let row = match metadata.get_multipart(*session.id.as_uuid()).await {
        Ok(Some(row)) => row,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(session_id = %session.id, error = %e, "multipart lookup failed during sweep");
            return;
        }
    };
    if row.status == MultipartStatus::Completed.as_str()
        || row.status == MultipartStatus::Aborted.as_str()
        || row.status == MultipartStatus::Expired.as_str()
    {
        return;
    }
    if let Err(e) = storage
        .abort_multipart(&session.storage_key, &row.provider_upload_id)
        .await
    {
        tracing::warn!(session_id = %session.id, error = %e, "provider abort failed during sweep");
    }
    if let Err(e) = metadata
        .update_multipart_status(*session.id.as_uuid(), MultipartStatus::Expired.as_str())
        .await
    {
        tracing::warn!(session_id = %session.id, error = %e, "multipart status update failed during sweep");
    }
}
