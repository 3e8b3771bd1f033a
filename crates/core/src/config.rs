//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Presigned URL validity in seconds.
    #[serde(default = "default_presign_expiry_secs")]
    pub presign_expiry_secs: u64,
    /// Enable request tracing.
    #[serde(default)]
    pub enable_tracing: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_presign_expiry_secs() -> u64 {
    300 // 5 minutes
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            presign_expiry_secs: default_presign_expiry_secs(),
            enable_tracing: false,
        }
    }
}

impl ServerConfig {
    /// Get the presign expiry as a std Duration.
    pub fn presign_expiry(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.presign_expiry_secs)
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (tests and local development only; presigned
    /// URLs are synthetic and not externally reachable).
    Memory,
    /// S3-compatible storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// AWS access key ID. Falls back to AWS_ACCESS_KEY_ID env var if not set.
        /// WARNING: Prefer env vars or IAM roles over storing secrets in config files.
        access_key_id: Option<String>,
        /// AWS secret access key. Falls back to AWS_SECRET_ACCESS_KEY env var if not set.
        secret_access_key: Option<String>,
        /// Force path-style URLs (`endpoint/bucket/key`). Required for MinIO
        /// and some S3-compatible services; AWS S3 requires virtual-hosted
        /// style (false).
        #[serde(default)]
        force_path_style: bool,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Memory
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                access_key_id,
                secret_access_key,
                ..
            } => match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                (Some(_), Some(_)) | (None, None) => Ok(()),
                _ => Err(
                    "s3 config requires both access_key_id and secret_access_key when either is set"
                        .to_string(),
                ),
            },
            StorageConfig::Memory => Ok(()),
        }
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database.
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// Query timeout in seconds (advisory only - SQLite cannot
        /// force-cancel queries).
        #[serde(default = "default_sqlite_query_timeout_secs")]
        query_timeout_secs: Option<u64>,
    },
}

fn default_sqlite_query_timeout_secs() -> Option<u64> {
    Some(600)
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/metadata.db"),
            query_timeout_secs: default_sqlite_query_timeout_secs(),
        }
    }
}

/// Session and tenant limits.
///
/// Process-wide and immutable after startup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum concurrent live sessions per tenant. The check is
    /// advisory (computed from a count, not a reserved semaphore), so
    /// under concurrent creation the ceiling can be transiently
    /// exceeded; this is an accepted trade-off.
    #[serde(default = "default_max_concurrent_per_tenant")]
    pub max_concurrent_per_tenant: u64,
    /// Session time-to-live in minutes.
    #[serde(default = "default_session_ttl_minutes")]
    pub session_ttl_minutes: u64,
    /// Maximum declared file size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Declared sizes at or above this become multipart uploads when
    /// the caller does not choose a kind.
    #[serde(default = "default_multipart_threshold_bytes")]
    pub multipart_threshold_bytes: u64,
    /// Maximum items in one batch download-URL request.
    #[serde(default = "default_max_batch_urls")]
    pub max_batch_urls: usize,
}

fn default_max_concurrent_per_tenant() -> u64 {
    10
}

fn default_session_ttl_minutes() -> u64 {
    30
}

fn default_max_file_size() -> u64 {
    50 * 1024 * 1024 * 1024 // 50 GiB
}

fn default_multipart_threshold_bytes() -> u64 {
    100 * 1024 * 1024 // 100 MiB
}

fn default_max_batch_urls() -> usize {
    100
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_per_tenant: default_max_concurrent_per_tenant(),
            session_ttl_minutes: default_session_ttl_minutes(),
            max_file_size: default_max_file_size(),
            multipart_threshold_bytes: default_multipart_threshold_bytes(),
            max_batch_urls: default_max_batch_urls(),
        }
    }
}

impl LimitsConfig {
    /// Get the session TTL as a Duration.
    pub fn session_ttl(&self) -> Duration {
        // Saturate at i64::MAX to prevent overflow wrapping to negative
        let minutes = i64::try_from(self.session_ttl_minutes).unwrap_or(i64::MAX);
        Duration::minutes(minutes)
    }

    /// Validate limit configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_per_tenant == 0 {
            return Err(
                "limits.max_concurrent_per_tenant must be >= 1 (0 would reject every creation)"
                    .to_string(),
            );
        }
        if self.session_ttl_minutes == 0 {
            return Err("limits.session_ttl_minutes must be >= 1".to_string());
        }
        if self.max_batch_urls == 0 {
            return Err("limits.max_batch_urls must be >= 1".to_string());
        }
        Ok(())
    }
}

/// Expiration sweep configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Enable the background expiration sweep.
    #[serde(default = "default_sweep_enabled")]
    pub enabled: bool,
    /// Interval in seconds between sweep runs.
    #[serde(default = "default_sweep_interval_secs")]
    pub interval_secs: u64,
    /// Maximum sessions expired per run.
    #[serde(default = "default_sweep_batch_size")]
    pub batch_size: u32,
}

fn default_sweep_enabled() -> bool {
    true
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_sweep_batch_size() -> u32 {
    500
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: default_sweep_enabled(),
            interval_secs: default_sweep_interval_secs(),
            batch_size: default_sweep_batch_size(),
        }
    }
}

impl SweepConfig {
    /// Get the sweep interval as a std Duration.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }

    /// Validate sweep configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.enabled && self.interval_secs == 0 {
            return Err("sweep.interval_secs cannot be 0. \
                 This would cause a panic when creating the sweep timer. \
                 Use a value >= 1 second."
                .to_string());
        }
        if self.batch_size == 0 {
            return Err("sweep.batch_size must be >= 1".to_string());
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Metadata store configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Session and tenant limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Expiration sweep configuration.
    #[serde(default)]
    pub sweep: SweepConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            metadata: MetadataConfig::default(),
            limits: LimitsConfig::default(),
            sweep: SweepConfig::default(),
        }
    }
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses memory storage and SQLite metadata.
    pub fn for_testing() -> Self {
        Self::default()
    }

    /// Validate the whole configuration, returning the first error.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()?;
        self.limits.validate()?;
        self.sweep.validate()?;
        Ok(())
    }
}
