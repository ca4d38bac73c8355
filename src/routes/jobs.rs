use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::TryStreamExt;
use garde::Validate;
use serde_json::Value;

use super::identity::Caller;
use crate::app_state::AppState;
use crate::error::AppError;
use crate::models::job::JobRecord;
use crate::models::requests::{
    AckResponse, CompleteUploadRequest, CompleteUploadResponse, CreateJobResponse, JobsByUserQuery,
};
use crate::models::summary::JobSummary;
use crate::services::credentials::{azcopy_command, SasPermissions};
use crate::services::lifecycle::UploadOutcome;

pub const SAS_URL_HEADER: &str = "x-sas-token-url";
pub const AZCOPY_HEADER: &str = "x-azcopy-command";

fn header_value(value: &str) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(value)
        .map_err(|e| AppError::Dependency(format!("Invalid response header value: {e}")))
}

/// POST /api/create-job: create a job and hand back an upload credential.
///
/// The job ID is in the body; the folder-scoped SAS URL and a ready-made
/// AzCopy command travel in response headers.
pub async fn create_job(
    State(state): State<AppState>,
    _caller: Caller,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = payload?;
    let record = state.lifecycle.create_job(body).await?;

    let credential = state.credentials.issue_upload_credential(
        &record.id,
        state.credentials.default_ttl_minutes(),
        SasPermissions::upload(),
    )?;
    tracing::info!(job_id = %record.id, expires_at = %credential.expires_at, "Issued upload credential");

    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static(SAS_URL_HEADER), header_value(&credential.url)?);
    headers.insert(
        HeaderName::from_static(AZCOPY_HEADER),
        header_value(&azcopy_command(&credential.url))?,
    );
    headers.insert(
        axum::http::header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("X-SAS-Token-URL, X-AzCopy-Command"),
    );

    Ok((headers, Json(CreateJobResponse { job_id: record.id })).into_response())
}

/// PUT|POST /api/create-job-update-params/{job_id}: replace a job's parameters.
pub async fn update_job_params(
    State(state): State<AppState>,
    _caller: Caller,
    Path(job_id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<AckResponse>, AppError> {
    let Json(body) = payload?;
    state.lifecycle.update_parameters(&job_id, body).await?;

    Ok(Json(AckResponse {
        success: true,
        message: "Job parameters updated successfully".to_string(),
    }))
}

/// POST /api/complete-upload: uploads finished, start detection.
pub async fn complete_upload(
    State(state): State<AppState>,
    _caller: Caller,
    payload: Result<Json<CompleteUploadRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CompleteUploadResponse>), AppError> {
    let Json(request) = payload?;
    request
        .validate()
        .map_err(|_| AppError::Validation("jobId is required".to_string()))?;

    let job_id = request.job_id;
    let outcome = state.lifecycle.complete_upload(&job_id).await?;

    let (status, response) = match outcome {
        UploadOutcome::Submitted => (
            StatusCode::OK,
            CompleteUploadResponse {
                success: true,
                message: Some("Job submitted for processing".to_string()),
                error: None,
                job_id,
            },
        ),
        UploadOutcome::Masked { note } => (
            StatusCode::OK,
            CompleteUploadResponse {
                success: true,
                message: Some(format!("Job submitted for processing. Note: {note}")),
                error: None,
                job_id,
            },
        ),
        UploadOutcome::Failed { error } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            CompleteUploadResponse {
                success: false,
                message: None,
                error: Some(error),
                job_id,
            },
        ),
    };

    Ok((status, Json(response)))
}

/// GET /api/job-status/{job_id}: the stored job record.
pub async fn get_job_status(
    State(state): State<AppState>,
    _caller: Caller,
    Path(job_id): Path<String>,
) -> Result<Json<JobRecord>, AppError> {
    Ok(Json(state.lifecycle.get_status(&job_id).await?))
}

/// POST /api/cancel-job/{job_id}
pub async fn cancel_job(
    State(state): State<AppState>,
    _caller: Caller,
    Path(job_id): Path<String>,
) -> Result<Json<JobRecord>, AppError> {
    Ok(Json(state.lifecycle.cancel_job(&job_id).await?))
}

/// GET /api/get-jobs-by-user?userId=...: job summaries, newest first.
pub async fn get_jobs_by_user(
    State(state): State<AppState>,
    _caller: Caller,
    query: Result<Query<JobsByUserQuery>, QueryRejection>,
) -> Result<Json<Vec<JobSummary>>, AppError> {
    let Query(params) = query?;
    let user_id = params.user_id.unwrap_or_default();
    let jobs: Vec<JobSummary> = state.query.list_jobs_for_user(&user_id)?.try_collect().await?;

    tracing::debug!(count = jobs.len(), "Listed jobs for user");
    Ok(Json(jobs))
}
