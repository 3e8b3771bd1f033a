use super::server::TestServer;
use serde_json::{Value, json};
use stow_metadata::SessionRepo;
use stow_metadata::models::SessionRow;
use time::OffsetDateTime;
use uuid::Uuid;

pub const MIB: u64 = 1024 * 1024;
pub const PART_SIZE: u64 = 5 * MIB;

pub fn create_single_request(tenant: &str, file_name: &str, file_size: u64) -> Value {
    json!({
        "tenant_id": tenant,
        "file_name": file_name,
        "file_size": file_size,
        "content_type": "application/octet-stream",
        "kind": "single",
    })
}

pub fn create_multipart_request(
    tenant: &str,
    file_name: &str,
    file_size: u64,
    total_parts: u32,
) -> Value {
    json!({
        "tenant_id": tenant,
        "file_name": file_name,
        "file_size": file_size,
        "content_type": "application/zip",
        "kind": "multipart",
        "total_parts": total_parts,
    })
}

/// Insert a session row directly, bypassing the creation service. Used
/// to stage sessions in states the API cannot produce on demand, like
/// overdue-but-live ones.
pub async fn seed_session(
    server: &TestServer,
    tenant: &str,
    status: &str,
    expires_at: OffsetDateTime,
) -> Uuid {
    seed_session_kind(server, tenant, status, "single", expires_at).await
}

pub async fn seed_session_kind(
    server: &TestServer,
    tenant: &str,
    status: &str,
    kind: &str,
    expires_at: OffsetDateTime,
) -> Uuid {
    let session_id = Uuid::new_v4();
    let now = OffsetDateTime::now_utc();
    let row = SessionRow {
        session_id,
        tenant_id: tenant.to_string(),
        file_name: "seeded.bin".to_string(),
        file_size: 1024,
        content_type: "application/octet-stream".to_string(),
        kind: kind.to_string(),
        storage_key: format!("{tenant}/{session_id}/seeded.bin"),
        status: status.to_string(),
        idempotency_key: None,
        checksum: None,
        etag: None,
        version: 0,
        created_at: now,
        expires_at,
        completed_at: None,
        error_reason: None,
    };
    server.state.metadata.create_session(&row).await.unwrap();
    session_id
}
