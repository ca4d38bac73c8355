use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{AsRefStr, Display, EnumString, VariantNames};

use crate::error::AppError;

/// Client-supplied storage credential that must never be persisted.
pub const STRIPPED_CREDENTIAL_FIELD: &str = "input_container_sas";

/// Closed vocabulary of job states.
///
/// This service writes `created`, `problem` and `canceled`. `running`,
/// `completed` and `failed` belong to the remote detection worker, which
/// updates the store directly. `submitting_job` is accepted when read but
/// never written here.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr,
    VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestStatus {
    Created,
    SubmittingJob,
    Running,
    Failed,
    Problem,
    Completed,
    Canceled,
}

impl RequestStatus {
    /// Parse a status name, rejecting anything outside the closed set.
    pub fn parse(value: &str) -> Result<Self, AppError> {
        value.parse().map_err(|_| {
            AppError::Validation(format!(
                "Invalid request_status '{}'. Must be one of: {}",
                value,
                Self::VARIANTS.join(", ")
            ))
        })
    }

    /// Terminal from the remote worker's point of view.
    pub fn is_finished(self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Failed)
    }
}

/// `{request_status, message}` pair stored on every job.
///
/// `message` is free text when written here; the remote worker may store
/// structured result metadata instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub request_status: RequestStatus,
    pub message: Value,
}

impl JobStatus {
    pub fn new(request_status: RequestStatus, message: impl Into<String>) -> Self {
        Self {
            request_status,
            message: Value::String(message.into()),
        }
    }

    /// Build a status from untyped input (e.g. a JSON body).
    pub fn from_value(value: &Value) -> Result<Self, AppError> {
        let request_status = value
            .get("request_status")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AppError::Validation(
                    "Status must contain 'request_status' and 'message' fields".to_string(),
                )
            })?;
        let message = value.get("message").cloned().ok_or_else(|| {
            AppError::Validation("Status must contain 'request_status' and 'message' fields".to_string())
        })?;

        Ok(Self {
            request_status: RequestStatus::parse(request_status)?,
            message,
        })
    }
}

/// A job status document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub api_instance: String,
    pub status: JobStatus,
    pub job_submission_time: String,
    pub last_updated: String,
    pub call_params: Map<String, Value>,
}

impl JobRecord {
    pub fn new(id: String, api_instance: &str, status: JobStatus, call_params: Map<String, Value>) -> Self {
        let now = utc_timestamp(Utc::now());
        Self {
            id,
            api_instance: api_instance.to_string(),
            status,
            job_submission_time: now.clone(),
            last_updated: now,
            call_params,
        }
    }

    /// Replace the status and advance `last_updated`.
    pub fn set_status(&mut self, status: JobStatus) {
        self.status = status;
        self.touch(Utc::now());
    }

    /// Advance `last_updated` to `now`, never moving it backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        let next = utc_timestamp(now);
        // Fixed-width timestamps compare correctly as strings.
        if next > self.last_updated {
            self.last_updated = next;
        }
    }

    pub fn image_path_prefix(&self) -> Option<&str> {
        self.call_params.get("image_path_prefix").and_then(Value::as_str)
    }
}

/// Generate a fresh job identifier (32 lowercase hex characters).
pub fn new_job_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// ISO-8601 UTC timestamp with microsecond precision and a literal `Z`,
/// e.g. `2021-02-08T20:02:05.699689Z`.
pub fn utc_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
///
/// Applied to request names at write time and to user IDs at query time, so
/// both sides agree. Idempotent.
pub fn sanitize_identifier(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Scope an image path prefix under the job's storage namespace.
pub fn scope_path_prefix(job_id: &str, prefix: Option<&str>) -> String {
    let prefix = prefix.map(|p| p.trim_start_matches('/')).unwrap_or_default();
    if prefix.is_empty() {
        job_id.to_string()
    } else if prefix == job_id || prefix.starts_with(&format!("{job_id}/")) {
        prefix.to_string()
    } else {
        format!("{job_id}/{prefix}")
    }
}

/// Server-side enrichment applied to every parameter set before it is stored.
pub fn prepare_call_params(
    job_id: &str,
    mut params: Map<String, Value>,
    caller_tag: &str,
) -> Map<String, Value> {
    params.remove(STRIPPED_CREDENTIAL_FIELD);

    let prefix = scope_path_prefix(
        job_id,
        params.get("image_path_prefix").and_then(Value::as_str),
    );
    params.insert("image_path_prefix".to_string(), Value::String(prefix));

    if let Some(Value::String(name)) = params.get("request_name") {
        let sanitized = sanitize_identifier(name);
        params.insert("request_name".to_string(), Value::String(sanitized));
    }

    params.insert("caller".to_string(), Value::String(caller_tag.to_string()));
    params
}
