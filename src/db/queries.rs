use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::{JobStore, StoreError};
use crate::models::job::{JobRecord, JobStatus};

/// PostgreSQL-backed job store. Status and parameters are JSONB documents.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record_from_row(row: &PgRow) -> Result<JobRecord, StoreError> {
    let id: String = row.try_get("id")?;

    let status: Value = row.try_get("status")?;
    let status: JobStatus = serde_json::from_value(status)
        .map_err(|e| StoreError::Corrupt(format!("job {id}: {e}")))?;

    let call_params = match row.try_get::<Value, _>("call_params")? {
        Value::Object(map) => map,
        Value::Null => Default::default(),
        other => {
            return Err(StoreError::Corrupt(format!(
                "job {id}: call_params is not an object: {other}"
            )))
        }
    };

    Ok(JobRecord {
        id,
        api_instance: row.try_get("api_instance")?,
        status,
        job_submission_time: row.try_get("job_submission_time")?,
        last_updated: row.try_get("last_updated")?,
        call_params,
    })
}

fn status_json(status: &JobStatus) -> Result<Value, StoreError> {
    serde_json::to_value(status).map_err(|e| StoreError::Corrupt(e.to_string()))
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, record: &JobRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO batch_api_jobs
                (id, api_instance, status, call_params, job_submission_time, last_updated)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&record.id)
        .bind(&record.api_instance)
        .bind(status_json(&record.status)?)
        .bind(Value::Object(record.call_params.clone()))
        .bind(&record.job_submission_time)
        .bind(&record.last_updated)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(record.id.clone()));
        }
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, api_instance, status, call_params, job_submission_time, last_updated
            FROM batch_api_jobs
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn replace(&self, record: &JobRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE batch_api_jobs
            SET api_instance = $2,
                status = $3,
                call_params = $4,
                last_updated = $5
            WHERE id = $1
            "#,
        )
        .bind(&record.id)
        .bind(&record.api_instance)
        .bind(status_json(&record.status)?)
        .bind(Value::Object(record.call_params.clone()))
        .bind(&record.last_updated)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing(record.id.clone()));
        }
        Ok(())
    }

    fn list_by_owner(&self, owner: String) -> BoxStream<'_, Result<JobRecord, StoreError>> {
        sqlx::query(
            r#"
            SELECT id, api_instance, status, call_params, job_submission_time, last_updated
            FROM batch_api_jobs
            WHERE call_params->>'request_name' = $1
            ORDER BY job_submission_time DESC
            "#,
        )
        .bind(owner)
        .fetch(&self.pool)
        .map(|row| row.map_err(StoreError::from).and_then(|r| record_from_row(&r)))
        .boxed()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
