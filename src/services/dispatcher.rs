use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::config::AppConfig;

/// Details of an accepted dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSuccess {
    /// Response body, if it was JSON.
    pub body: Option<Value>,
}

/// Why a dispatch did not succeed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    /// The detection server answered with something other than 200.
    #[error("{detail}")]
    Rejected { status: u16, detail: String },

    /// The detection server could not be reached or did not answer in time.
    #[error("Error making request to AI server: {0}")]
    Unreachable(String),
}

/// Forwards a job's parameters to the remote detection service.
#[async_trait]
pub trait Dispatch: Send + Sync {
    /// One attempt, no retries.
    async fn submit(&self, call_params: &Map<String, Value>) -> Result<DispatchSuccess, DispatchError>;
}

/// HTTP client for the detection server's `request_detections` endpoint.
pub struct DetectionDispatcher {
    http: Client,
    endpoint: String,
}

impl DetectionDispatcher {
    pub fn new(config: &AppConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.dispatch_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: config.ai_server_endpoint.clone(),
        })
    }
}

#[async_trait]
impl Dispatch for DetectionDispatcher {
    async fn submit(&self, call_params: &Map<String, Value>) -> Result<DispatchSuccess, DispatchError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(call_params)
            .send()
            .await
            .map_err(|e| DispatchError::Unreachable(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DispatchError::Unreachable(e.to_string()))?;

        if status == StatusCode::OK {
            return Ok(DispatchSuccess {
                body: serde_json::from_str(&text).ok(),
            });
        }

        Err(DispatchError::Rejected {
            status: status.as_u16(),
            detail: rejection_detail(status.as_u16(), &text),
        })
    }
}

/// Best description of a rejection: the JSON `error` field, else the raw body,
/// else the status code.
pub fn rejection_detail(status: u16, body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        match map.get("error") {
            Some(Value::String(error)) => return error.clone(),
            Some(error) if !error.is_null() => return error.to_string(),
            _ => {}
        }
    }
    if !body.trim().is_empty() {
        return body.to_string();
    }
    format!("AI server returned status code {status}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_detail_prefers_json_error() {
        assert_eq!(
            rejection_detail(400, r#"{"error": "num_images missing"}"#),
            "num_images missing"
        );
        assert_eq!(rejection_detail(400, r#"{"error": {"code": 7}}"#), r#"{"code":7}"#);
    }

    #[test]
    fn test_rejection_detail_falls_back_to_text() {
        assert_eq!(rejection_detail(502, "Bad Gateway"), "Bad Gateway");
        assert_eq!(
            rejection_detail(503, r#"{"message": "busy"}"#),
            r#"{"message": "busy"}"#
        );
    }

    #[test]
    fn test_rejection_detail_falls_back_to_status() {
        assert_eq!(rejection_detail(500, ""), "AI server returned status code 500");
        assert_eq!(rejection_detail(500, "  \n"), "AI server returned status code 500");
    }

    #[test]
    fn test_unreachable_display_mentions_server() {
        let err = DispatchError::Unreachable("connection refused".to_string());
        assert_eq!(err.to_string(), "Error making request to AI server: connection refused");
    }
}
