//! Database models mapping to the metadata schema.

use crate::error::{MetadataError, MetadataResult};
use sqlx::FromRow;
use stow_core::{
    CompletedPart, FileAsset, IdempotencyKey, MultipartStatus, MultipartUpload, SessionId,
    SessionStatus, UploadKind, UploadSession,
};
use time::OffsetDateTime;
use uuid::Uuid;

/// Upload session record.
#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub session_id: Uuid,
    pub tenant_id: String,
    pub file_name: String,
    pub file_size: i64,
    pub content_type: String,
    pub kind: String,
    pub storage_key: String,
    pub status: String,
    pub idempotency_key: Option<String>,
    pub checksum: Option<String>,
    pub etag: Option<String>,
    /// Optimistic-concurrency version; every CAS write bumps it by one.
    pub version: i64,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub completed_at: Option<OffsetDateTime>,
    pub error_reason: Option<String>,
}

impl SessionRow {
    /// Build a row from the domain aggregate.
    pub fn from_domain(session: &UploadSession) -> Self {
        Self {
            session_id: *session.id.as_uuid(),
            tenant_id: session.tenant_id.clone(),
            file_name: session.file_name.clone(),
            file_size: session.file_size as i64,
            content_type: session.content_type.clone(),
            kind: session.kind.as_str().to_string(),
            storage_key: session.storage_key.clone(),
            status: session.status.as_str().to_string(),
            idempotency_key: session.idempotency_key.as_ref().map(|k| k.as_str().to_string()),
            checksum: session.checksum.clone(),
            etag: session.etag.clone(),
            version: session.version,
            created_at: session.created_at,
            expires_at: session.expires_at,
            completed_at: session.completed_at,
            error_reason: None,
        }
    }

    /// Reconstitute the domain aggregate from the row.
    pub fn into_domain(self) -> MetadataResult<UploadSession> {
        let idempotency_key = self
            .idempotency_key
            .as_deref()
            .map(IdempotencyKey::parse)
            .transpose()
            .map_err(|e| MetadataError::InvalidRow(e.to_string()))?;

        Ok(UploadSession {
            id: SessionId::parse(&self.session_id.to_string())
                .map_err(|e| MetadataError::InvalidRow(e.to_string()))?,
            tenant_id: self.tenant_id,
            file_name: self.file_name,
            file_size: self.file_size as u64,
            content_type: self.content_type,
            kind: parse_kind(&self.kind)?,
            storage_key: self.storage_key,
            status: parse_session_status(&self.status)?,
            idempotency_key,
            checksum: self.checksum,
            etag: self.etag,
            version: self.version,
            created_at: self.created_at,
            expires_at: self.expires_at,
            completed_at: self.completed_at,
        })
    }
}

/// Multipart upload record, one-to-one with a multipart session.
#[derive(Debug, Clone, FromRow)]
pub struct MultipartRow {
    pub session_id: Uuid,
    pub provider_upload_id: String,
    pub total_parts: i64,
    pub status: String,
    pub created_at: OffsetDateTime,
}

/// Confirmed part record.
#[derive(Debug, Clone, FromRow)]
pub struct PartRow {
    pub session_id: Uuid,
    pub part_number: i64,
    pub etag: String,
    pub size_bytes: i64,
    pub created_at: OffsetDateTime,
}

/// Assemble the domain multipart aggregate from its rows.
pub fn multipart_into_domain(
    row: MultipartRow,
    part_rows: Vec<PartRow>,
) -> MetadataResult<MultipartUpload> {
    let session_id = SessionId::parse(&row.session_id.to_string())
        .map_err(|e| MetadataError::InvalidRow(e.to_string()))?;

    let parts = part_rows
        .into_iter()
        .map(|p| CompletedPart {
            part_number: p.part_number as u32,
            etag: p.etag,
            size: p.size_bytes as u64,
            created_at: p.created_at,
        })
        .collect();

    Ok(MultipartUpload {
        session_id,
        provider_upload_id: row.provider_upload_id,
        total_parts: row.total_parts as u32,
        status: parse_multipart_status(&row.status)?,
        parts,
        created_at: row.created_at,
    })
}

/// File asset record.
#[derive(Debug, Clone, FromRow)]
pub struct AssetRow {
    pub session_id: Uuid,
    pub storage_key: String,
    pub size_bytes: i64,
    pub etag: String,
    pub content_type: String,
    pub created_at: OffsetDateTime,
}

impl AssetRow {
    pub fn from_domain(asset: &FileAsset) -> Self {
        Self {
            session_id: *asset.session_id.as_uuid(),
            storage_key: asset.storage_key.clone(),
            size_bytes: asset.size as i64,
            etag: asset.etag.clone(),
            content_type: asset.content_type.clone(),
            created_at: asset.created_at,
        }
    }

    pub fn into_domain(self) -> MetadataResult<FileAsset> {
        Ok(FileAsset {
            session_id: SessionId::parse(&self.session_id.to_string())
                .map_err(|e| MetadataError::InvalidRow(e.to_string()))?,
            storage_key: self.storage_key,
            size: self.size_bytes as u64,
            etag: self.etag,
            content_type: self.content_type,
            created_at: self.created_at,
        })
    }
}

fn parse_kind(s: &str) -> MetadataResult<UploadKind> {
    match s {
        "single" => Ok(UploadKind::Single),
        "multipart" => Ok(UploadKind::Multipart),
        other => Err(MetadataError::InvalidRow(format!(
            "unknown upload kind '{other}'"
        ))),
    }
}

fn parse_session_status(s: &str) -> MetadataResult<SessionStatus> {
    match s {
        "pending" => Ok(SessionStatus::Pending),
        "active" => Ok(SessionStatus::Active),
        "completed" => Ok(SessionStatus::Completed),
        "failed" => Ok(SessionStatus::Failed),
        "expired" => Ok(SessionStatus::Expired),
        "cancelled" => Ok(SessionStatus::Cancelled),
        other => Err(MetadataError::InvalidRow(format!(
            "unknown session status '{other}'"
        ))),
    }
}

fn parse_multipart_status(s: &str) -> MetadataResult<MultipartStatus> {
    match s {
        "initiated" => Ok(MultipartStatus::Initiated),
        "uploading" => Ok(MultipartStatus::Uploading),
        "completed" => Ok(MultipartStatus::Completed),
        "aborted" => Ok(MultipartStatus::Aborted),
        "expired" => Ok(MultipartStatus::Expired),
        other => Err(MetadataError::InvalidRow(format!(
            "unknown multipart status '{other}'"
        ))),
    }
}
