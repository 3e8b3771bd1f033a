//! API request and response types for the session control plane.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::multipart::MultipartStatus;
use crate::session::{SessionId, SessionStatus, UploadKind, UploadSession};

/// Request to create an upload session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    /// Tenant the session belongs to.
    pub tenant_id: String,
    /// Original file name.
    pub file_name: String,
    /// Declared file size in bytes.
    pub file_size: u64,
    /// Declared content type. Defaults to application/octet-stream.
    pub content_type: Option<String>,
    /// Explicit upload kind. When absent, chosen from the declared size.
    pub kind: Option<UploadKind>,
    /// Number of parts for multipart uploads.
    pub total_parts: Option<u32>,
    /// Deduplication key for retried creation requests.
    pub idempotency_key: Option<String>,
    /// Client-declared checksum, verified at confirmation.
    pub checksum: Option<String>,
}

/// One presigned part-upload URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartUrl {
    pub part_number: u32,
    pub url: String,
}

/// Response to session creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub kind: UploadKind,
    pub storage_key: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    /// Presigned PUT URL for single-shot uploads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,
    /// Presigned part URLs for multipart uploads, one per declared part.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub part_urls: Vec<PartUrl>,
    /// False when an existing session was returned for the idempotency key.
    pub created: bool,
}

/// Session state as reported to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: SessionId,
    pub tenant_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub content_type: String,
    pub kind: UploadKind,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    /// Parts confirmed so far, for multipart sessions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parts_received: Option<u32>,
    /// Declared part count, for multipart sessions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_parts: Option<u32>,
}

impl SessionResponse {
    /// Build the client view from the domain aggregate.
    pub fn from_session(session: &UploadSession) -> Self {
        Self {
            session_id: session.id,
            tenant_id: session.tenant_id.clone(),
            file_name: session.file_name.clone(),
            file_size: session.file_size,
            content_type: session.content_type.clone(),
            kind: session.kind,
            status: session.status,
            etag: session.etag.clone(),
            created_at: session.created_at,
            expires_at: session.expires_at,
            completed_at: session.completed_at,
            parts_received: None,
            total_parts: None,
        }
    }
}

/// Request to record one uploaded part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkPartRequest {
    /// Part number, 1-based.
    pub part_number: u32,
    /// Provider ETag returned by the part upload.
    pub etag: String,
    /// Part size in bytes.
    pub size: u64,
}

/// Part progress after recording a part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartProgressResponse {
    pub session_id: SessionId,
    pub received: u32,
    pub total: u32,
    pub complete: bool,
    pub status: MultipartStatus,
}

/// Request to fail a session with a reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailSessionRequest {
    pub reason: String,
}

/// Request for a batch of presigned download URLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchDownloadRequest {
    pub session_ids: Vec<String>,
}

/// One entry in a batch download response. Failed lookups carry an
/// error string instead of failing the whole batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchDownloadItem {
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Batch download response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchDownloadResponse {
    pub items: Vec<BatchDownloadItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_optional_fields() {
        let json = r#"{"tenant_id":"t","file_name":"a.bin","file_size":1024}"#;
        let req: CreateSessionRequest = serde_json::from_str(json).unwrap();
        assert!(req.kind.is_none());
        assert!(req.idempotency_key.is_none());
        assert!(req.total_parts.is_none());
    }

    #[test]
    fn test_create_response_omits_empty_upload_fields() {
        let resp = CreateSessionResponse {
            session_id: SessionId::new(),
            status: SessionStatus::Pending,
            kind: UploadKind::Multipart,
            storage_key: "t/key".to_string(),
            expires_at: OffsetDateTime::now_utc(),
            upload_url: None,
            part_urls: vec![PartUrl {
                part_number: 1,
                url: "https://example".to_string(),
            }],
            created: true,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("upload_url"));
        assert!(json.contains("part_urls"));
    }
}
