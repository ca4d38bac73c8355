use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;

/// Parameters accepted when creating a job.
///
/// Only `num_images` is interpreted here; everything else (model choice,
/// classification flags, path prefix, request name) passes through to the
/// detection server.
#[derive(Debug, Deserialize, Validate)]
pub struct NewJobParameters {
    #[garde(range(min = 0))]
    pub num_images: i64,

    #[serde(flatten)]
    #[garde(skip)]
    pub extra: Map<String, Value>,
}

impl NewJobParameters {
    pub fn parse(body: Value) -> Result<Self, AppError> {
        let invalid =
            || AppError::Validation("num_images is required and must be an integer".to_string());

        let params: Self = serde_json::from_value(body).map_err(|_| invalid())?;
        params.validate().map_err(|_| invalid())?;
        Ok(params)
    }

    pub fn into_map(self) -> Map<String, Value> {
        let mut map = self.extra;
        map.insert("num_images".to_string(), Value::from(self.num_images));
        map
    }
}

/// Body of `POST /api/complete-upload`.
#[derive(Debug, Deserialize, Validate)]
pub struct CompleteUploadRequest {
    #[serde(rename = "jobId", default)]
    #[garde(length(min = 1, max = 128))]
    pub job_id: String,
}

/// Body of `POST /api/upload-file`.
#[derive(Debug, Deserialize, Validate)]
pub struct UploadFileRequest {
    #[serde(rename = "jobId", default)]
    #[garde(length(min = 1, max = 128))]
    pub job_id: String,

    #[serde(rename = "fileName", default)]
    #[garde(length(min = 1, max = 1024))]
    pub file_name: String,

    /// Relative path inside the job folder; defaults to `fileName`.
    #[serde(rename = "filePath")]
    #[garde(skip)]
    pub file_path: Option<String>,

    /// Base64 content, optionally as a `data:<type>;base64,` URL.
    #[serde(rename = "fileContent", default)]
    #[garde(length(min = 1))]
    pub file_content: String,

    #[serde(rename = "contentType")]
    #[garde(skip)]
    pub content_type: Option<String>,
}

/// Query string of `GET /api/get-jobs-by-user`.
#[derive(Debug, Deserialize)]
pub struct JobsByUserQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// Response to `POST /api/create-job`. The upload credential travels in headers.
#[derive(Debug, Serialize)]
pub struct CreateJobResponse {
    #[serde(rename = "jobId")]
    pub job_id: String,
}

/// Generic `{success, message}` acknowledgement.
#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub success: bool,
    pub message: String,
}

/// Response to `POST /api/complete-upload`.
#[derive(Debug, Serialize)]
pub struct CompleteUploadResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "jobId")]
    pub job_id: String,
}

/// Response to `POST /api/upload-file`.
#[derive(Debug, Serialize)]
pub struct UploadFileResponse {
    pub success: bool,
    pub message: String,
    #[serde(rename = "blobPath")]
    pub blob_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_job_parameters_requires_integer_count() {
        assert!(NewJobParameters::parse(json!({})).is_err());
        assert!(NewJobParameters::parse(json!({"num_images": "5"})).is_err());
        assert!(NewJobParameters::parse(json!({"num_images": 2.5})).is_err());
        assert!(NewJobParameters::parse(json!({"num_images": -1})).is_err());
        assert!(NewJobParameters::parse(json!([1, 2])).is_err());

        let params = NewJobParameters::parse(json!({"num_images": 5, "classify": true})).unwrap();
        assert_eq!(params.num_images, 5);

        let map = params.into_map();
        assert_eq!(map["num_images"], 5);
        assert_eq!(map["classify"], true);
    }

    #[test]
    fn test_upload_request_validation() {
        let req: UploadFileRequest = serde_json::from_value(json!({
            "jobId": "abc",
            "fileName": "img.jpg",
            "fileContent": "aGVsbG8="
        }))
        .unwrap();
        assert!(req.validate().is_ok());
        assert!(req.file_path.is_none());

        let missing: UploadFileRequest =
            serde_json::from_value(json!({"jobId": "abc", "fileName": "img.jpg"})).unwrap();
        assert!(missing.validate().is_err());
    }

    #[test]
    fn test_complete_upload_request_requires_job_id() {
        let req: CompleteUploadRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_complete_upload_response_shape() {
        let value = serde_json::to_value(CompleteUploadResponse {
            success: true,
            message: Some("Job submitted for processing".to_string()),
            error: None,
            job_id: "abc".to_string(),
        })
        .unwrap();
        assert_eq!(value, json!({"success": true, "message": "Job submitted for processing", "jobId": "abc"}));
    }
}
