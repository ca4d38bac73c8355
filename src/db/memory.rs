use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{JobStore, StoreError};
use crate::models::job::JobRecord;

/// In-process job store for local development and tests.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, JobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Corrupt("in-memory store lock poisoned".to_string())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, record: &JobRecord) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().map_err(|_| Self::poisoned())?;
        if jobs.contains_key(&record.id) {
            return Err(StoreError::Conflict(record.id.clone()));
        }
        jobs.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError> {
        let jobs = self.jobs.read().map_err(|_| Self::poisoned())?;
        Ok(jobs.get(job_id).cloned())
    }

    async fn replace(&self, record: &JobRecord) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().map_err(|_| Self::poisoned())?;
        match jobs.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StoreError::Missing(record.id.clone())),
        }
    }

    fn list_by_owner(&self, owner: String) -> BoxStream<'_, Result<JobRecord, StoreError>> {
        let mut matching: Vec<JobRecord> = match self.jobs.read() {
            Ok(jobs) => jobs
                .values()
                .filter(|job| {
                    job.call_params.get("request_name").and_then(Value::as_str) == Some(owner.as_str())
                })
                .cloned()
                .collect(),
            Err(_) => return stream::once(async { Err(Self::poisoned()) }).boxed(),
        };
        matching.sort_by(|a, b| b.job_submission_time.cmp(&a.job_submission_time));

        stream::iter(matching.into_iter().map(Ok)).boxed()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
