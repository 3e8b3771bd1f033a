//! Application state shared across handlers.

use crate::notify::Notifier;
use crate::services::confirm::ConfirmationService;
use crate::services::sessions::SessionService;
use std::sync::Arc;
use stow_core::config::AppConfig;
use stow_metadata::MetadataStore;
use stow_storage::ObjectStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Object storage backend.
    pub storage: Arc<dyn ObjectStore>,
    /// Metadata store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Lifecycle notification sink.
    pub notifier: Arc<dyn Notifier>,
    /// Session creation and part tracking.
    pub sessions: Arc<SessionService>,
    /// Confirmation concurrency controller.
    pub confirm: Arc<ConfirmationService>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Panics
    ///
    /// Panics if configuration validation fails; a server with invalid
    /// limits must not start.
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn ObjectStore>,
        metadata: Arc<dyn MetadataStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        if let Err(error) = config.validate() {
            panic!("invalid configuration: {error}");
        }

        let config = Arc::new(config);
        let confirm = Arc::new(ConfirmationService::new(
            storage.clone(),
            metadata.clone(),
            notifier.clone(),
        ));
        let sessions = Arc::new(SessionService::new(
            config.clone(),
            storage.clone(),
            metadata.clone(),
        ));

        Self {
            config,
            storage,
            metadata,
            notifier,
            sessions,
            confirm,
        }
    }
}
