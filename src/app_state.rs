use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::JobStore;
use crate::services::{
    credentials::{CredentialError, CredentialIssuer},
    dispatcher::{DetectionDispatcher, Dispatch},
    lifecycle::JobLifecycle,
    query::JobQuery,
    storage::{BlobStorage, StorageError},
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    pub lifecycle: Arc<JobLifecycle>,
    pub query: Arc<JobQuery>,
    pub credentials: Arc<CredentialIssuer>,
    pub storage: Arc<BlobStorage>,
    /// Accept requests without a platform identity header.
    pub allow_anonymous: bool,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn JobStore>,
        dispatcher: Arc<dyn Dispatch>,
    ) -> Result<Self, StateError> {
        let credentials = Arc::new(CredentialIssuer::new(config)?);
        let storage = Arc::new(BlobStorage::new(credentials.clone())?);

        Ok(Self {
            lifecycle: Arc::new(JobLifecycle::new(config, store.clone(), dispatcher)),
            query: Arc::new(JobQuery::new(store.clone())),
            store,
            credentials,
            storage,
            allow_anonymous: config.is_development(),
        })
    }

    /// State wired to the real detection server client.
    pub fn with_detection_server(
        config: &AppConfig,
        store: Arc<dyn JobStore>,
    ) -> Result<Self, StateError> {
        let dispatcher = DetectionDispatcher::new(config).map_err(StateError::Http)?;
        Self::new(config, store, Arc::new(dispatcher))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Failed to build HTTP client: {0}")]
    Http(reqwest::Error),
}
