use super::CountingNotifier;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::Value;
use std::sync::Arc;
use stow_core::config::AppConfig;
use stow_metadata::{MetadataStore, SqliteStore};
use stow_storage::{MemoryBackend, ObjectStore};
use stow_server::{AppState, create_router};
use tempfile::TempDir;
use tower::ServiceExt;

/// In-process test server over memory storage and a temp SQLite store.
pub struct TestServer {
    pub state: AppState,
    pub router: Router,
    /// Concrete handle so tests can seed objects and parts.
    pub backend: Arc<MemoryBackend>,
    pub notifier: Arc<CountingNotifier>,
    _temp: TempDir,
}

impl TestServer {
    pub async fn spawn() -> Self {
        Self::with_config(AppConfig::for_testing()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let temp = tempfile::tempdir().unwrap();
        let backend = Arc::new(MemoryBackend::new());
        let storage: Arc<dyn ObjectStore> = backend.clone();
        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(temp.path().join("metadata.db"), None)
                .await
                .unwrap(),
        );
        let notifier = Arc::new(CountingNotifier::default());

        let state = AppState::new(config, storage, metadata, notifier.clone());
        let router = create_router(state.clone());

        Self {
            state,
            router,
            backend,
            notifier,
            _temp: temp,
        }
    }

    /// Send a JSON request through the router without binding a socket.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.request(Method::GET, path, None).await
    }
}
