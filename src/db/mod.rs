use async_trait::async_trait;
use futures::stream::BoxStream;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use crate::models::job::JobRecord;

pub mod memory;
pub mod queries;

pub use memory::MemoryJobStore;
pub use queries::PgJobStore;

/// Initialize PostgreSQL connection pool
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))
}

/// Document store holding one status record per job, keyed by job ID.
///
/// Writes are whole-document; there is no concurrency token, so concurrent
/// writers to the same job race and the last one wins.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new record. Fails if the ID already exists.
    async fn create(&self, record: &JobRecord) -> Result<(), StoreError>;

    async fn get(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError>;

    /// Replace an existing record wholesale.
    async fn replace(&self, record: &JobRecord) -> Result<(), StoreError>;

    /// Records whose `call_params.request_name` equals `owner`, newest first.
    fn list_by_owner(&self, owner: String) -> BoxStream<'_, Result<JobRecord, StoreError>>;

    /// Connectivity check for health reporting.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("job {0} already exists")]
    Conflict(String),

    #[error("job {0} does not exist")]
    Missing(String),

    #[error("stored job document is invalid: {0}")]
    Corrupt(String),
}
