use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use garde::Validate;

use super::identity::Caller;
use crate::app_state::AppState;
use crate::error::AppError;
use crate::models::requests::{UploadFileRequest, UploadFileResponse};
use crate::services::storage::{decode_file_content, job_blob_path, StorageError};

fn client_or_dependency(e: StorageError) -> AppError {
    if e.is_client_error() {
        AppError::Validation(e.to_string())
    } else {
        e.into()
    }
}

/// POST /api/upload-file: proxy a base64 file into the job's folder.
pub async fn upload_file(
    State(state): State<AppState>,
    _caller: Caller,
    payload: Result<Json<UploadFileRequest>, JsonRejection>,
) -> Result<Json<UploadFileResponse>, AppError> {
    let Json(request) = payload?;
    request.validate().map_err(|_| {
        AppError::Validation("Missing required fields: jobId, fileName, fileContent".to_string())
    })?;

    let relative = request.file_path.as_deref().unwrap_or(&request.file_name);
    let blob_path = job_blob_path(&request.job_id, relative).map_err(client_or_dependency)?;
    let file = decode_file_content(&request.file_content, request.content_type.as_deref())
        .map_err(client_or_dependency)?;

    let size = file.bytes.len();
    state
        .storage
        .upload(&blob_path, file.bytes, &file.content_type)
        .await
        .map_err(client_or_dependency)?;

    metrics::counter!("files_uploaded_total").increment(1);
    tracing::info!(job_id = %request.job_id, blob_path = %blob_path, size, "Uploaded file");

    Ok(Json(UploadFileResponse {
        success: true,
        message: "File uploaded successfully".to_string(),
        blob_path,
    }))
}
