use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use super::dispatcher::{Dispatch, DispatchError, DispatchSuccess};
use crate::config::AppConfig;
use crate::db::{JobStore, StoreError};
use crate::error::AppError;
use crate::models::job::{new_job_id, prepare_call_params, JobRecord, JobStatus, RequestStatus};
use crate::models::requests::NewJobParameters;

pub const MSG_CREATED: &str = "Request received from web client. Pending upload of images to Blob container";
pub const MSG_CALLING_SERVER: &str = "Calling AI server API...";
pub const MSG_SUBMITTED: &str =
    "AI processing request submitted successfully. Processing will begin shortly.";
pub const MSG_CANCELED: &str = "Job canceled by request";

/// Result of handing an uploaded job to the detection server.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// The detection server accepted the job.
    Submitted,
    /// The server was unreachable and the masking policy is on: the failure is
    /// recorded on the job but reported to the client as a success.
    Masked { note: String },
    /// The server rejected the job, or was unreachable with masking off.
    Failed { error: String },
}

/// Owns the job state machine on this side of the system.
///
/// `created -> (created, "calling server") -> created+confirmation | problem`.
/// Running, completed and failed are written by the remote worker.
pub struct JobLifecycle {
    store: Arc<dyn JobStore>,
    dispatcher: Arc<dyn Dispatch>,
    caller_tag: String,
    api_instance: String,
    mask_transport_failures: bool,
}

impl JobLifecycle {
    pub fn new(config: &AppConfig, store: Arc<dyn JobStore>, dispatcher: Arc<dyn Dispatch>) -> Self {
        Self {
            store,
            dispatcher,
            caller_tag: config.caller_tag.clone(),
            api_instance: config.api_instance.clone(),
            mask_transport_failures: config.mask_dispatch_transport_failures,
        }
    }

    /// Create a job record in `created` state and return it.
    pub async fn create_job(&self, body: Value) -> Result<JobRecord, AppError> {
        let params = NewJobParameters::parse(body)?;

        let job_id = new_job_id();
        let call_params = prepare_call_params(&job_id, params.into_map(), &self.caller_tag);
        let record = JobRecord::new(
            job_id,
            &self.api_instance,
            JobStatus::new(RequestStatus::Created, MSG_CREATED),
            call_params,
        );

        self.store.create(&record).await?;

        metrics::counter!("jobs_created_total").increment(1);
        tracing::info!(job_id = %record.id, "Created job");
        Ok(record)
    }

    /// Replace a job's parameters wholesale.
    pub async fn update_parameters(&self, job_id: &str, body: Value) -> Result<JobRecord, AppError> {
        let params = match body {
            Value::Object(map) if !map.is_empty() => map,
            _ => return Err(AppError::Validation("Request body is required".to_string())),
        };

        let mut record = self.load(job_id).await?;
        let previous = Value::Object(record.call_params.clone());
        tracing::info!(job_id, previous = %previous, "Replacing job parameters");

        record.call_params = prepare_call_params(job_id, params, &self.caller_tag);
        self.replace(&record).await?;

        metrics::counter!("job_params_updated_total").increment(1);
        Ok(record)
    }

    /// Signal that uploads are done and hand the job to the detection server.
    pub async fn complete_upload(&self, job_id: &str) -> Result<UploadOutcome, AppError> {
        let record = self.load(job_id).await?;
        let current = record.status.request_status;
        if current == RequestStatus::Canceled || current.is_finished() {
            return Err(AppError::Validation(format!(
                "Job {job_id} is already {current} and cannot be submitted"
            )));
        }

        self.update_status(
            job_id,
            JobStatus::new(RequestStatus::Created, MSG_CALLING_SERVER),
        )
        .await?;

        let start = Instant::now();
        let result = self.dispatcher.submit(&record.call_params).await;
        metrics::histogram!("job_dispatch_seconds").record(start.elapsed().as_secs_f64());

        metrics::counter!("job_dispatch_total", "outcome" => dispatch_outcome_label(&result))
            .increment(1);

        let outcome = match result {
            Ok(_) => {
                self.update_status(job_id, JobStatus::new(RequestStatus::Created, MSG_SUBMITTED))
                    .await?;
                tracing::info!(job_id, "Job submitted to detection server");
                UploadOutcome::Submitted
            }
            Err(e) => {
                let message = match &e {
                    DispatchError::Rejected { .. } => format!("Error submitting to AI server: {e}"),
                    DispatchError::Unreachable(_) => e.to_string(),
                };
                self.update_status(job_id, JobStatus::new(RequestStatus::Problem, message.clone()))
                    .await?;

                match e {
                    DispatchError::Unreachable(_) if self.mask_transport_failures => {
                        tracing::warn!(job_id, error = %message, "Detection server unreachable; reporting success");
                        UploadOutcome::Masked { note: message }
                    }
                    DispatchError::Rejected { status, detail } => {
                        tracing::error!(job_id, status, error = %detail, "Detection server rejected job");
                        UploadOutcome::Failed { error: detail }
                    }
                    DispatchError::Unreachable(_) => {
                        tracing::error!(job_id, error = %message, "Detection server unreachable");
                        UploadOutcome::Failed { error: message }
                    }
                }
            }
        };

        Ok(outcome)
    }

    pub async fn get_status(&self, job_id: &str) -> Result<JobRecord, AppError> {
        self.load(job_id).await
    }

    /// The only way a job's status changes: whole status replaced, `last_updated` advanced.
    pub async fn update_status(&self, job_id: &str, status: JobStatus) -> Result<JobRecord, AppError> {
        let mut record = self.load(job_id).await?;
        record.set_status(status);
        self.replace(&record).await?;

        tracing::info!(
            job_id,
            request_status = %record.status.request_status,
            "Updated job status"
        );
        Ok(record)
    }

    /// Mark a job canceled. Jobs the worker already finished cannot be canceled.
    pub async fn cancel_job(&self, job_id: &str) -> Result<JobRecord, AppError> {
        let record = self.load(job_id).await?;
        match record.status.request_status {
            RequestStatus::Canceled => Ok(record),
            status if status.is_finished() => Err(AppError::Validation(format!(
                "Job {job_id} is already {status} and cannot be canceled"
            ))),
            _ => {
                self.update_status(job_id, JobStatus::new(RequestStatus::Canceled, MSG_CANCELED))
                    .await
            }
        }
    }

    async fn load(&self, job_id: &str) -> Result<JobRecord, AppError> {
        self.store
            .get(job_id)
            .await?
            .ok_or_else(|| AppError::job_not_found(job_id))
    }

    async fn replace(&self, record: &JobRecord) -> Result<(), AppError> {
        match self.store.replace(record).await {
            Ok(()) => Ok(()),
            Err(StoreError::Missing(id)) => Err(AppError::job_not_found(&id)),
            Err(e) => Err(e.into()),
        }
    }
}

/// `outcome` label of `job_dispatch_total`, independent of the masking policy.
fn dispatch_outcome_label(result: &Result<DispatchSuccess, DispatchError>) -> &'static str {
    match result {
        Ok(_) => "submitted",
        Err(DispatchError::Rejected { .. }) => "rejected",
        Err(DispatchError::Unreachable(_)) => "unreachable",
    }
}
