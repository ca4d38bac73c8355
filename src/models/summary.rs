use serde::Serialize;
use serde_json::Value;

use super::job::RequestStatus;

/// Status message as shown in the job list: plain text or a result link.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DisplayMessage {
    Text(String),
    Link { text: String, url: String },
}

impl DisplayMessage {
    pub fn link(text: impl Into<String>, url: impl Into<String>) -> Self {
        DisplayMessage::Link {
            text: text.into(),
            url: url.into(),
        }
    }
}

/// One row of `GET /api/get-jobs-by-user`.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub id: String,
    pub request_status: RequestStatus,
    pub message: DisplayMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_images: Option<Value>,
    pub job_submission_time: String,
    pub last_updated: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_name: Option<String>,
}
