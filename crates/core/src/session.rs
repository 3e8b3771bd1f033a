//! Upload session aggregate and lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::idempotency::IdempotencyKey;

/// Unique identifier for an upload session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidSessionId(e.to_string()))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the object reaches storage: one presigned PUT or numbered parts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    /// One object, one presigned PUT.
    Single,
    /// Provider multipart protocol with numbered parts.
    Multipart,
}

impl UploadKind {
    /// Select the kind from the declared size when the caller did not choose.
    pub fn for_size(file_size: u64, multipart_threshold: u64) -> Self {
        if file_size >= multipart_threshold {
            Self::Multipart
        } else {
            Self::Single
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Multipart => "multipart",
        }
    }
}

/// Upload session status.
///
/// `Pending` and `Active` are live; the other four are terminal and
/// mutually exclusive. No transition leaves a terminal status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Session created, presigned URLs issued, no bytes confirmed yet.
    Pending,
    /// At least one part confirmed (multipart) or client signalled start.
    Active,
    /// Upload verified and finalized.
    Completed,
    /// Explicitly failed with a reason.
    Failed,
    /// Passed its deadline without completing.
    Expired,
    /// Cancelled by the client.
    Cancelled,
}

impl SessionStatus {
    /// Check if the session can still accept mutations.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Pending | Self::Active)
    }

    /// Check if the session reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Expired | Self::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }
}

/// An upload session tracking one logical file upload from creation to
/// a terminal outcome.
///
/// `version` increments on every persisted mutation; writers must pass
/// the version they read so the store can reject stale writes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadSession {
    /// Unique session identifier.
    pub id: SessionId,
    /// Tenant scope for rate limiting and isolation.
    pub tenant_id: String,
    /// Original file name as declared by the client.
    pub file_name: String,
    /// Declared file size in bytes.
    pub file_size: u64,
    /// Declared content type.
    pub content_type: String,
    /// Single-shot or multipart.
    pub kind: UploadKind,
    /// Target object key in storage.
    pub storage_key: String,
    /// Current status.
    pub status: SessionStatus,
    /// Deduplication key for retried creation requests.
    pub idempotency_key: Option<IdempotencyKey>,
    /// Client-declared checksum, verified against the provider ETag at confirmation.
    pub checksum: Option<String>,
    /// Provider ETag recorded at completion.
    pub etag: Option<String>,
    /// Optimistic-concurrency version, bumped by every persisted write.
    pub version: i64,
    /// When the session was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the session expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    /// When the session completed, if it did.
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

impl UploadSession {
    /// Create a new session in the initial status.
    ///
    /// Persistence is the orchestrating service's concern; this only
    /// constructs the aggregate.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: String,
        file_name: String,
        file_size: u64,
        content_type: String,
        kind: UploadKind,
        storage_key: String,
        idempotency_key: Option<IdempotencyKey>,
        ttl: time::Duration,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: SessionId::new(),
            tenant_id,
            file_name,
            file_size,
            content_type,
            kind,
            storage_key,
            status: SessionStatus::Pending,
            idempotency_key,
            checksum: None,
            etag: None,
            version: 0,
            created_at: now,
            expires_at: now + ttl,
            completed_at: None,
        }
    }

    /// Check if the session passed its deadline.
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now > self.expires_at
    }

    /// Mark the session active. No-op if already active.
    pub fn activate(&mut self) -> crate::Result<()> {
        match self.status {
            SessionStatus::Pending | SessionStatus::Active => {
                self.status = SessionStatus::Active;
                Ok(())
            }
            SessionStatus::Completed => Err(crate::Error::AlreadyCompleted),
            status => Err(crate::Error::AlreadyTerminal {
                status: status.as_str().to_string(),
            }),
        }
    }

    /// Transition to `Completed`, recording the provider ETag.
    ///
    /// Allowed only from a live status and only before the deadline.
    pub fn complete(&mut self, etag: String, now: OffsetDateTime) -> crate::Result<()> {
        match self.status {
            SessionStatus::Completed => return Err(crate::Error::AlreadyCompleted),
            SessionStatus::Pending | SessionStatus::Active => {}
            status => {
                return Err(crate::Error::AlreadyTerminal {
                    status: status.as_str().to_string(),
                });
            }
        }
        if self.is_expired(now) {
            return Err(crate::Error::SessionExpired);
        }
        self.status = SessionStatus::Completed;
        self.etag = Some(etag);
        self.completed_at = Some(now);
        Ok(())
    }

    /// Transition to `Failed`. Allowed only from a live status.
    pub fn fail(&mut self, now: OffsetDateTime) -> crate::Result<()> {
        match self.status {
            SessionStatus::Pending | SessionStatus::Active => {
                self.status = SessionStatus::Failed;
                self.completed_at = Some(now);
                Ok(())
            }
            SessionStatus::Completed => Err(crate::Error::AlreadyCompleted),
            status => Err(crate::Error::AlreadyTerminal {
                status: status.as_str().to_string(),
            }),
        }
    }

    /// Transition to `Cancelled`. Allowed only from a live status.
    pub fn cancel(&mut self) -> crate::Result<()> {
        match self.status {
            SessionStatus::Pending | SessionStatus::Active => {
                self.status = SessionStatus::Cancelled;
                Ok(())
            }
            SessionStatus::Completed => Err(crate::Error::AlreadyCompleted),
            status => Err(crate::Error::AlreadyTerminal {
                status: status.as_str().to_string(),
            }),
        }
    }

    /// Transition to `Expired`. Idempotent no-op when already terminal.
    pub fn expire(&mut self) {
        if self.status.is_live() {
            self.status = SessionStatus::Expired;
        }
    }

    /// Check the declared checksum against a provider ETag, if one was declared.
    pub fn verify_checksum(&self, provider_etag: &str) -> crate::Result<()> {
        if let Some(expected) = &self.checksum {
            // Provider ETags for simple PUTs are quoted MD5 hex; compare unquoted.
            let actual = provider_etag.trim_matches('"');
            if expected.trim_matches('"') != actual {
                return Err(crate::Error::ChecksumMismatch {
                    expected: expected.clone(),
                    actual: actual.to_string(),
                });
            }
        }
        Ok(())
    }
}
