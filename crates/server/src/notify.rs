//! Session lifecycle notifications.

use async_trait::async_trait;
use stow_core::SessionId;

/// Sink for session lifecycle events.
///
/// Notification is best-effort: delivery failures must not roll back
/// the state transition that triggered them.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// A session reached `Completed`.
    async fn session_completed(&self, session_id: SessionId, tenant_id: &str);

    /// A session was explicitly failed.
    async fn session_failed(&self, session_id: SessionId, tenant_id: &str, reason: &str);

    /// The sweep marked a session expired.
    async fn session_expired(&self, session_id: SessionId, tenant_id: &str);
}

/// Notifier that records events to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn session_completed(&self, session_id: SessionId, tenant_id: &str) {
        tracing::info!(session_id = %session_id, tenant_id = %tenant_id, "session completed");
    }

    async fn session_failed(&self, session_id: SessionId, tenant_id: &str, reason: &str) {
        tracing::warn!(
            session_id = %session_id,
            tenant_id = %tenant_id,
            reason = %reason,
            "session failed"
        );
    }

    async fn session_expired(&self, session_id: SessionId, tenant_id: &str) {
        tracing::info!(session_id = %session_id, tenant_id = %tenant_id, "session expired");
    }
}
