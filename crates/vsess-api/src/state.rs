//! Application state.

use std::sync::Arc;

use vsess_media::FfmpegToolkit;
use vsess_storage::{InMemoryRegistry, LocalStore, StorageResult};

use crate::config::{ApiConfig, SessionConfig};
use crate::services::SessionService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub session: Arc<SessionService>,
}

impl AppState {
    /// Create application state backed by FFmpeg and the local store.
    pub async fn new(config: ApiConfig, session_config: &SessionConfig) -> StorageResult<Self> {
        let store = LocalStore::open(&session_config.storage_root).await?;
        let toolkit = FfmpegToolkit::new(session_config.encoding(), session_config.timeouts());
        let session = SessionService::new(
            session_config,
            store,
            Arc::new(InMemoryRegistry::new()),
            Arc::new(toolkit),
        );

        Ok(Self::with_session(config, session))
    }

    /// Create application state around an existing session service.
    pub fn with_session(config: ApiConfig, session: SessionService) -> Self {
        Self {
            config,
            session: Arc::new(session),
        }
    }
}
