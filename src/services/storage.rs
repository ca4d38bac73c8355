use base64::Engine;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use super::credentials::{CredentialError, CredentialIssuer, SasPermissions};

/// Lifetime of the SAS used for a single proxied upload.
const UPLOAD_SAS_MINUTES: i64 = 5;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Client for the blob container that receives job images.
///
/// Writes go through the blob REST API, authorized with a short-lived
/// single-blob SAS minted by the credential issuer.
pub struct BlobStorage {
    http: Client,
    credentials: Arc<CredentialIssuer>,
}

impl BlobStorage {
    pub fn new(credentials: Arc<CredentialIssuer>) -> Result<Self, StorageError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(StorageError::Http)?;
        Ok(Self { http, credentials })
    }

    /// Upload bytes to `blob_path`, overwriting any existing blob.
    pub async fn upload(
        &self,
        blob_path: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let credential = self.credentials.issue_blob_credential(
            blob_path,
            UPLOAD_SAS_MINUTES,
            SasPermissions::write_only(),
        )?;

        let response = self
            .http
            .put(&credential.url)
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-version", super::credentials::SAS_VERSION)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await
            .map_err(StorageError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Decoded content of an upload request.
#[derive(Debug, PartialEq, Eq)]
pub struct FilePayload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Decode base64 file content, accepting `data:<type>;base64,<payload>` URLs.
///
/// An explicit content type wins over the one embedded in a data URL.
pub fn decode_file_content(
    content: &str,
    content_type: Option<&str>,
) -> Result<FilePayload, StorageError> {
    let (embedded_type, payload) = match content.split_once(";base64,") {
        Some((header, payload)) => (header.strip_prefix("data:").filter(|t| !t.is_empty()), payload),
        None => (None, content),
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| StorageError::InvalidContent(e.to_string()))?;

    let content_type = content_type
        .filter(|t| !t.is_empty())
        .or(embedded_type)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    Ok(FilePayload { bytes, content_type })
}

/// Blob path for an uploaded file: `<job_id>/<relative path>`.
///
/// Rejects paths that would escape the job's folder.
pub fn job_blob_path(job_id: &str, relative: &str) -> Result<String, StorageError> {
    let relative = relative.trim_start_matches('/');
    let escapes = job_id.contains('/')
        || relative.is_empty()
        || relative
            .split(['/', '\\'])
            .any(|segment| segment == ".." || segment == ".");
    if escapes {
        return Err(StorageError::InvalidPath(format!("{job_id}/{relative}")));
    }
    Ok(format!("{job_id}/{relative}"))
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("HTTP request to blob storage failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Blob storage returned status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("Invalid base64 content: {0}")]
    InvalidContent(String),

    #[error("Invalid file path: {0}")]
    InvalidPath(String),
}

impl StorageError {
    /// Errors caused by the request rather than the storage service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, StorageError::InvalidContent(_) | StorageError::InvalidPath(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain_base64() {
        let payload = decode_file_content("aGVsbG8=", None).unwrap();
        assert_eq!(payload.bytes, b"hello");
        assert_eq!(payload.content_type, "application/octet-stream");
    }

    #[test]
    fn test_decode_data_url() {
        let payload = decode_file_content("data:image/jpeg;base64,aGVsbG8=", None).unwrap();
        assert_eq!(payload.bytes, b"hello");
        assert_eq!(payload.content_type, "image/jpeg");

        let explicit =
            decode_file_content("data:image/jpeg;base64,aGVsbG8=", Some("image/png")).unwrap();
        assert_eq!(explicit.content_type, "image/png");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_file_content("not*base64", None).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_job_blob_path() {
        assert_eq!(job_blob_path("j1", "img.jpg").unwrap(), "j1/img.jpg");
        assert_eq!(job_blob_path("j1", "/site/img.jpg").unwrap(), "j1/site/img.jpg");
        assert!(job_blob_path("j1", "../j2/img.jpg").is_err());
        assert!(job_blob_path("j1", "site/../../x").is_err());
        assert!(job_blob_path("j1/..", "img.jpg").is_err());
        assert!(job_blob_path("j1", "").is_err());
    }
}
