//! Metadata store trait and SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::{AssetRow, MultipartRow, PartRow, SessionRow};
use crate::repos::{AssetRepo, MultipartRepo, SessionRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: SessionRepo + MultipartRepo + AssetRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    #[allow(dead_code)] // Reserved for future timeout wrapper implementation
    query_timeout_secs: u64,
}

impl SqliteStore {
    /// Create a new SQLite store.
    pub async fn new(
        path: impl AsRef<Path>,
        query_timeout_secs: Option<u64>,
    ) -> MetadataResult<Self> {
        let path = path.as_ref();
        let query_timeout_secs = query_timeout_secs.unwrap_or(600);

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MetadataError::Config(e.to_string()))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection avoids
            // persistent "database is locked" failures under axum concurrency.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self {
            pool,
            query_timeout_secs,
        };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        // raw_sql runs the whole batch; prepared queries stop at the
        // first statement.
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl SessionRepo for SqliteStore {
    async fn create_session(&self, session: &SessionRow) -> MetadataResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO upload_sessions (
                session_id, tenant_id, file_name, file_size, content_type,
                kind, storage_key, status, idempotency_key, checksum, etag,
                version, created_at, expires_at, completed_at, error_reason
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.session_id)
        .bind(&session.tenant_id)
        .bind(&session.file_name)
        .bind(session.file_size)
        .bind(&session.content_type)
        .bind(&session.kind)
        .bind(&session.storage_key)
        .bind(&session.status)
        .bind(&session.idempotency_key)
        .bind(&session.checksum)
        .bind(&session.etag)
        .bind(session.version)
        .bind(session.created_at)
        .bind(session.expires_at)
        .bind(session.completed_at)
        .bind(&session.error_reason)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(MetadataError::AlreadyExists(format!(
                "session {} or its idempotency key already exists",
                session.session_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_session(&self, session_id: Uuid) -> MetadataResult<Option<SessionRow>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM upload_sessions WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_by_idempotency_key(&self, key: &str) -> MetadataResult<Option<SessionRow>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM upload_sessions WHERE idempotency_key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_session(
        &self,
        session: &SessionRow,
        expected_version: i64,
    ) -> MetadataResult<()> {
        // The conditional UPDATE is the whole concurrency protocol: the
        // write lands only if nobody else bumped the version since the
        // caller's read.
        let result = sqlx::query(
            r#"
            UPDATE upload_sessions
            SET status = ?, checksum = ?, etag = ?, completed_at = ?,
                error_reason = ?, version = ?
            WHERE session_id = ? AND version = ?
            "#,
        )
        .bind(&session.status)
        .bind(&session.checksum)
        .bind(&session.etag)
        .bind(session.completed_at)
        .bind(&session.error_reason)
        .bind(expected_version + 1)
        .bind(session.session_id)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish a missing session from a stale version.
            if self.get_session(session.session_id).await?.is_none() {
                return Err(MetadataError::NotFound(format!(
                    "session {} not found",
                    session.session_id
                )));
            }
            return Err(MetadataError::VersionConflict {
                session_id: session.session_id.to_string(),
                expected: expected_version,
            });
        }
        Ok(())
    }

    async fn find_expired(
        &self,
        now: OffsetDateTime,
        limit: u32,
    ) -> MetadataResult<Vec<SessionRow>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT * FROM upload_sessions
            WHERE status IN ('pending', 'active') AND expires_at < ?
            ORDER BY expires_at ASC
            LIMIT ?
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_active_sessions(&self, tenant_id: &str) -> MetadataResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM upload_sessions WHERE tenant_id = ? AND status IN ('pending', 'active')",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }
}

#[async_trait]
impl MultipartRepo for SqliteStore {
    async fn create_multipart(&self, multipart: &MultipartRow) -> MetadataResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO multipart_uploads (
                session_id, provider_upload_id, total_parts, status, created_at
            ) VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(multipart.session_id)
        .bind(&multipart.provider_upload_id)
        .bind(multipart.total_parts)
        .bind(&multipart.status)
        .bind(multipart.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(MetadataError::AlreadyExists(format!(
                "multipart upload for session {} already exists",
                multipart.session_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_multipart(&self, session_id: Uuid) -> MetadataResult<Option<MultipartRow>> {
        let row = sqlx::query_as::<_, MultipartRow>(
            "SELECT * FROM multipart_uploads WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_parts(&self, session_id: Uuid) -> MetadataResult<Vec<PartRow>> {
        let rows = sqlx::query_as::<_, PartRow>(
            "SELECT * FROM multipart_parts WHERE session_id = ? ORDER BY part_number ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn add_part(&self, part: &PartRow) -> MetadataResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO multipart_parts (
                session_id, part_number, etag, size_bytes, created_at
            ) VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(part.session_id)
        .bind(part.part_number)
        .bind(&part.etag)
        .bind(part.size_bytes)
        .bind(part.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(MetadataError::Constraint(format!(
                "part {} already recorded for session {}",
                part.part_number, part.session_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_multipart_status(
        &self,
        session_id: Uuid,
        status: &str,
    ) -> MetadataResult<()> {
        let result =
            sqlx::query("UPDATE multipart_uploads SET status = ? WHERE session_id = ?")
                .bind(status)
                .bind(session_id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(format!(
                "multipart upload for session {session_id} not found"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl AssetRepo for SqliteStore {
    async fn save_asset(&self, asset: &AssetRow) -> MetadataResult<bool> {
        // INSERT OR IGNORE keyed by session_id: the losing confirmation
        // writer observes inserted == false and must not treat it as failure.
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO file_assets (
                session_id, storage_key, size_bytes, etag, content_type, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(asset.session_id)
        .bind(&asset.storage_key)
        .bind(asset.size_bytes)
        .bind(&asset.etag)
        .bind(&asset.content_type)
        .bind(asset.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_asset(&self, session_id: Uuid) -> MetadataResult<Option<AssetRow>> {
        let row = sqlx::query_as::<_, AssetRow>("SELECT * FROM file_assets WHERE session_id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}

/// SQL schema for SQLite.
const SCHEMA_SQL: &str = r#"
-- Upload sessions
CREATE TABLE IF NOT EXISTS upload_sessions (
    session_id BLOB PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    file_name TEXT NOT NULL,
    file_size INTEGER NOT NULL,
    content_type TEXT NOT NULL,
    kind TEXT NOT NULL,
    storage_key TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    idempotency_key TEXT UNIQUE,
    checksum TEXT,
    etag TEXT,
    -- Optimistic concurrency: every write must match the version it read.
    version INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    completed_at TEXT,
    error_reason TEXT
);
CREATE INDEX IF NOT EXISTS idx_upload_sessions_status ON upload_sessions(status, expires_at);
CREATE INDEX IF NOT EXISTS idx_upload_sessions_tenant ON upload_sessions(tenant_id, status);

-- Multipart uploads, one-to-one with multipart sessions
CREATE TABLE IF NOT EXISTS multipart_uploads (
    session_id BLOB PRIMARY KEY REFERENCES upload_sessions(session_id) ON DELETE CASCADE,
    provider_upload_id TEXT NOT NULL,
    total_parts INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'initiated',
    created_at TEXT NOT NULL
);

-- Confirmed parts
CREATE TABLE IF NOT EXISTS multipart_parts (
    session_id BLOB NOT NULL REFERENCES multipart_uploads(session_id) ON DELETE CASCADE,
    part_number INTEGER NOT NULL,
    etag TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (session_id, part_number)
);

-- File assets, at most one per session
CREATE TABLE IF NOT EXISTS file_assets (
    session_id BLOB PRIMARY KEY REFERENCES upload_sessions(session_id),
    storage_key TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    etag TEXT NOT NULL,
    content_type TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn build_store() -> (tempfile::TempDir, SqliteStore) {
        let temp = tempdir().unwrap();
        let store = SqliteStore::new(temp.path().join("metadata.db"), None)
            .await
            .unwrap();
        (temp, store)
    }

    fn sample_row(tenant: &str, key: Option<&str>) -> SessionRow {
        let now = OffsetDateTime::now_utc();
        SessionRow {
            session_id: Uuid::new_v4(),
            tenant_id: tenant.to_string(),
            file_name: "report.pdf".to_string(),
            file_size: 1024,
            content_type: "application/pdf".to_string(),
            kind: "single".to_string(),
            storage_key: format!("{tenant}/report.pdf"),
            status: "pending".to_string(),
            idempotency_key: key.map(|k| k.to_string()),
            checksum: None,
            etag: None,
            version: 0,
            created_at: now,
            expires_at: now + time::Duration::minutes(30),
            completed_at: None,
            error_reason: None,
        }
    }

    #[tokio::test]
    async fn session_roundtrip() {
        let (_temp, store) = build_store().await;
        let row = sample_row("tenant-a", Some("key-1"));
        store.create_session(&row).await.unwrap();

        let fetched = store.get_session(row.session_id).await.unwrap().unwrap();
        assert_eq!(fetched.tenant_id, "tenant-a");
        assert_eq!(fetched.version, 0);

        let by_key = store
            .find_by_idempotency_key("key-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_key.session_id, row.session_id);
        assert!(
            store
                .find_by_idempotency_key("missing")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn duplicate_idempotency_key_rejected() {
        let (_temp, store) = build_store().await;
        store
            .create_session(&sample_row("tenant-a", Some("key-1")))
            .await
            .unwrap();
        let err = store
            .create_session(&sample_row("tenant-a", Some("key-1")))
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn cas_update_rejects_stale_version() {
        let (_temp, store) = build_store().await;
        let mut row = sample_row("tenant-a", None);
        store.create_session(&row).await.unwrap();

        row.status = "completed".to_string();
        row.etag = Some("etag".to_string());
        store.update_session(&row, 0).await.unwrap();

        let stored = store.get_session(row.session_id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.status, "completed");

        // A second writer that read version 0 must lose.
        let err = store.update_session(&row, 0).await.unwrap_err();
        assert!(matches!(err, MetadataError::VersionConflict { .. }));

        // An unknown session is NotFound, not a conflict.
        let ghost = sample_row("tenant-a", None);
        let err = store.update_session(&ghost, 0).await.unwrap_err();
        assert!(matches!(err, MetadataError::NotFound(_)));
    }

    #[tokio::test]
    async fn find_expired_skips_terminal_sessions() {
        let (_temp, store) = build_store().await;
        let now = OffsetDateTime::now_utc();

        let mut stale = sample_row("tenant-a", None);
        stale.expires_at = now - time::Duration::minutes(1);
        store.create_session(&stale).await.unwrap();

        let mut done = sample_row("tenant-a", None);
        done.expires_at = now - time::Duration::minutes(1);
        done.status = "completed".to_string();
        store.create_session(&done).await.unwrap();

        let fresh = sample_row("tenant-a", None);
        store.create_session(&fresh).await.unwrap();

        let expired = store.find_expired(now, 100).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].session_id, stale.session_id);
    }

    #[tokio::test]
    async fn count_active_sessions_scopes_by_tenant_and_status() {
        let (_temp, store) = build_store().await;
        store
            .create_session(&sample_row("tenant-a", None))
            .await
            .unwrap();
        let mut active = sample_row("tenant-a", None);
        active.status = "active".to_string();
        store.create_session(&active).await.unwrap();
        let mut failed = sample_row("tenant-a", None);
        failed.status = "failed".to_string();
        store.create_session(&failed).await.unwrap();
        store
            .create_session(&sample_row("tenant-b", None))
            .await
            .unwrap();

        assert_eq!(store.count_active_sessions("tenant-a").await.unwrap(), 2);
        assert_eq!(store.count_active_sessions("tenant-b").await.unwrap(), 1);
        assert_eq!(store.count_active_sessions("tenant-c").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn multipart_parts_roundtrip_and_duplicate_guard() {
        let (_temp, store) = build_store().await;
        let session = sample_row("tenant-a", None);
        store.create_session(&session).await.unwrap();

        let now = OffsetDateTime::now_utc();
        let mp = MultipartRow {
            session_id: session.session_id,
            provider_upload_id: "provider-1".to_string(),
            total_parts: 3,
            status: "initiated".to_string(),
            created_at: now,
        };
        store.create_multipart(&mp).await.unwrap();
        assert!(matches!(
            store.create_multipart(&mp).await.unwrap_err(),
            MetadataError::AlreadyExists(_)
        ));

        let part = PartRow {
            session_id: session.session_id,
            part_number: 2,
            etag: "etag-2".to_string(),
            size_bytes: 5 * 1024 * 1024,
            created_at: now,
        };
        store.add_part(&part).await.unwrap();
        assert!(matches!(
            store.add_part(&part).await.unwrap_err(),
            MetadataError::Constraint(_)
        ));

        let parts = store.get_parts(session.session_id).await.unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].part_number, 2);

        store
            .update_multipart_status(session.session_id, "uploading")
            .await
            .unwrap();
        let fetched = store
            .get_multipart(session.session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.status, "uploading");
    }

    #[tokio::test]
    async fn save_asset_is_insert_or_ignore() {
        let (_temp, store) = build_store().await;
        let session = sample_row("tenant-a", None);
        store.create_session(&session).await.unwrap();

        let asset = AssetRow {
            session_id: session.session_id,
            storage_key: session.storage_key.clone(),
            size_bytes: 1024,
            etag: "etag".to_string(),
            content_type: "application/pdf".to_string(),
            created_at: OffsetDateTime::now_utc(),
        };

        assert!(store.save_asset(&asset).await.unwrap());
        // Second writer loses quietly.
        assert!(!store.save_asset(&asset).await.unwrap());

        let fetched = store
            .get_asset(session.session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.etag, "etag");
    }
}
