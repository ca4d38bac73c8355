use chrono::DateTime;
use futures::stream::{BoxStream, StreamExt};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::db::JobStore;
use crate::error::AppError;
use crate::models::job::{sanitize_identifier, JobRecord};
use crate::models::summary::{DisplayMessage, JobSummary};

/// Read-only job listings for the web client.
pub struct JobQuery {
    store: Arc<dyn JobStore>,
}

impl JobQuery {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Jobs submitted under `user_id`, newest first.
    ///
    /// The ID is sanitized with the same rule applied to request names at
    /// creation, so `bob/x` and `bob_x` select the same jobs. The stream is
    /// lazy and can be consumed once.
    pub fn list_jobs_for_user(
        &self,
        user_id: &str,
    ) -> Result<BoxStream<'_, Result<JobSummary, AppError>>, AppError> {
        if user_id.trim().is_empty() {
            return Err(AppError::Validation("User ID is required".to_string()));
        }

        let owner = sanitize_identifier(user_id);
        tracing::debug!(user_id, sanitized = %owner, "Listing jobs for user");

        Ok(self
            .store
            .list_by_owner(owner)
            .map(|record| record.map(summarize).map_err(AppError::from))
            .boxed())
    }
}

/// Reshape a stored record for display. Never fails.
pub fn summarize(record: JobRecord) -> JobSummary {
    let image_path_prefix = record.image_path_prefix().map(str::to_string);
    let folder_name = image_path_prefix.as_deref().map(folder_name);

    JobSummary {
        request_status: record.status.request_status,
        message: display_message(&record.status.message),
        num_images: record.call_params.get("num_images").cloned(),
        job_submission_time: format_datetime(&record.job_submission_time),
        last_updated: format_datetime(&record.last_updated),
        image_path_prefix,
        folder_name,
        id: record.id,
    }
}

/// `YYYY-MM-DD HH:MM:SS`, or the input unchanged if it does not parse.
pub fn format_datetime(value: &str) -> String {
    match DateTime::parse_from_rfc3339(value) {
        Ok(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        Err(_) => value.to_string(),
    }
}

/// Folder the client uploaded into: the segment after the job ID.
pub fn folder_name(path_prefix: &str) -> String {
    let mut parts = path_prefix.split('/');
    match (parts.next(), parts.next()) {
        (Some(_), Some(folder)) => folder.to_string(),
        _ => path_prefix.to_string(),
    }
}

/// Turn a status message (text or result metadata) into text or a link.
pub fn display_message(message: &Value) -> DisplayMessage {
    match message {
        Value::String(text) => DisplayMessage::Text(text.clone()),
        Value::Object(map) => object_message(map),
        Value::Null => DisplayMessage::Text(String::new()),
        other => DisplayMessage::Text(other.to_string()),
    }
}

fn object_message(map: &Map<String, Value>) -> DisplayMessage {
    if let Some(Value::String(url)) = map.get("detections") {
        return DisplayMessage::link("View Detections", url.as_str());
    }

    if let Some(output) = map.get("output_file_urls") {
        return match output {
            Value::Object(urls) => match urls.get("detections") {
                Some(Value::String(url)) => DisplayMessage::link("View Detections", url.as_str()),
                Some(other) => DisplayMessage::link("View Detections", other.to_string()),
                None => DisplayMessage::link("View Results", "#"),
            },
            Value::String(url) => DisplayMessage::link("View Output Files", url.as_str()),
            _ => DisplayMessage::link("View Results", "#"),
        };
    }

    // First URL-valued field in document order
    map.iter()
        .find_map(|(key, value)| match value {
            Value::String(url) if url.contains("http://") || url.contains("https://") => Some(
                DisplayMessage::link(format!("View {}", title_case(&key.replace('_', " "))), url.as_str()),
            ),
            _ => None,
        })
        .unwrap_or_else(|| DisplayMessage::Text("Results available".to_string()))
}

/// Capitalize the first letter of each word, lowercase the rest.
fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut at_word_start = true;
    for c in value.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}
