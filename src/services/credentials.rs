use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use reqwest::Url;
use sha2::Sha256;

use crate::config::AppConfig;

type HmacSha256 = Hmac<Sha256>;

/// Storage service version the signatures are computed for.
pub const SAS_VERSION: &str = "2021-08-06";

/// Permissions granted by a SAS credential. Delete is never granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SasPermissions {
    pub read: bool,
    pub add: bool,
    pub create: bool,
    pub write: bool,
    pub list: bool,
}

impl SasPermissions {
    /// Create/write/list, plus read so clients can check what they uploaded.
    pub fn upload() -> Self {
        Self {
            read: true,
            add: true,
            create: true,
            write: true,
            list: true,
        }
    }

    /// Create and write a single blob; used for proxied uploads.
    pub fn write_only() -> Self {
        Self {
            read: false,
            add: false,
            create: true,
            write: true,
            list: false,
        }
    }

    /// `sp` value, letters in the order the storage service expects.
    pub fn as_sp(&self) -> String {
        [
            (self.read, 'r'),
            (self.add, 'a'),
            (self.create, 'c'),
            (self.write, 'w'),
            (self.list, 'l'),
        ]
        .iter()
        .filter(|(granted, _)| *granted)
        .map(|(_, letter)| *letter)
        .collect()
    }
}

/// What a credential is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SasScope<'a> {
    Container,
    Directory(&'a str),
    Blob(&'a str),
}

impl SasScope<'_> {
    fn signed_resource(&self) -> &'static str {
        match self {
            SasScope::Container => "c",
            SasScope::Directory(_) => "d",
            SasScope::Blob(_) => "b",
        }
    }

    fn path(&self) -> Option<&str> {
        match self {
            SasScope::Container => None,
            SasScope::Directory(path) | SasScope::Blob(path) => Some(path),
        }
    }
}

/// A signed, time-limited storage URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCredential {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Mints SAS-style credentials for the upload container.
///
/// There is no revocation: expiry is the only containment.
pub struct CredentialIssuer {
    account_name: String,
    account_key: Vec<u8>,
    container: String,
    endpoint: String,
    default_ttl_minutes: i64,
}

impl CredentialIssuer {
    pub fn new(config: &AppConfig) -> Result<Self, CredentialError> {
        let account_key = base64::engine::general_purpose::STANDARD
            .decode(config.storage_account_key.trim())
            .map_err(|_| CredentialError::InvalidKey)?;
        if account_key.is_empty() {
            return Err(CredentialError::InvalidKey);
        }

        Ok(Self {
            account_name: config.storage_account_name.clone(),
            account_key,
            container: config.storage_container_upload.clone(),
            endpoint: config.blob_endpoint(),
            default_ttl_minutes: config.sas_expiry_minutes,
        })
    }

    pub fn default_ttl_minutes(&self) -> i64 {
        self.default_ttl_minutes
    }

    /// Credential scoped to the job's folder (`<container>/<job_id>/`).
    pub fn issue_upload_credential(
        &self,
        job_id: &str,
        ttl_minutes: i64,
        permissions: SasPermissions,
    ) -> Result<UploadCredential, CredentialError> {
        self.issue_upload_credential_at(job_id, ttl_minutes, permissions, Utc::now())
    }

    pub fn issue_upload_credential_at(
        &self,
        job_id: &str,
        ttl_minutes: i64,
        permissions: SasPermissions,
        now: DateTime<Utc>,
    ) -> Result<UploadCredential, CredentialError> {
        if job_id.is_empty() || job_id.contains('/') {
            return Err(CredentialError::InvalidPath(job_id.to_string()));
        }
        self.issue(SasScope::Directory(job_id), ttl_minutes, permissions, now)
    }

    /// Container-wide credential for clients that do not know the job path yet.
    pub fn issue_container_credential(
        &self,
        ttl_minutes: i64,
        permissions: SasPermissions,
    ) -> Result<UploadCredential, CredentialError> {
        self.issue_container_credential_at(ttl_minutes, permissions, Utc::now())
    }

    pub fn issue_container_credential_at(
        &self,
        ttl_minutes: i64,
        permissions: SasPermissions,
        now: DateTime<Utc>,
    ) -> Result<UploadCredential, CredentialError> {
        self.issue(SasScope::Container, ttl_minutes, permissions, now)
    }

    /// Credential for exactly one blob.
    pub fn issue_blob_credential(
        &self,
        blob_path: &str,
        ttl_minutes: i64,
        permissions: SasPermissions,
    ) -> Result<UploadCredential, CredentialError> {
        if blob_path.is_empty() || blob_path.starts_with('/') {
            return Err(CredentialError::InvalidPath(blob_path.to_string()));
        }
        self.issue(SasScope::Blob(blob_path), ttl_minutes, permissions, Utc::now())
    }

    fn issue(
        &self,
        scope: SasScope<'_>,
        ttl_minutes: i64,
        permissions: SasPermissions,
        now: DateTime<Utc>,
    ) -> Result<UploadCredential, CredentialError> {
        if ttl_minutes <= 0 {
            return Err(CredentialError::InvalidTtl(ttl_minutes));
        }
        let expires_at = now + Duration::minutes(ttl_minutes);
        let signed_expiry = expires_at.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let sp = permissions.as_sp();

        let mut canonical = format!("/blob/{}/{}", self.account_name, self.container);
        if let Some(path) = scope.path() {
            canonical.push('/');
            canonical.push_str(path);
        }

        let string_to_sign = string_to_sign(&sp, &signed_expiry, &canonical, scope.signed_resource());
        let signature = self.sign(&string_to_sign)?;

        let mut url = self.resource_url(scope.path(), matches!(scope, SasScope::Directory(_)))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("sv", SAS_VERSION)
                .append_pair("se", &signed_expiry)
                .append_pair("sr", scope.signed_resource())
                .append_pair("sp", &sp);
            if let SasScope::Directory(path) = scope {
                query.append_pair("sdd", &path.split('/').count().to_string());
            }
            query.append_pair("sig", &signature);
        }

        Ok(UploadCredential {
            url: url.to_string(),
            expires_at,
        })
    }

    fn sign(&self, string_to_sign: &str) -> Result<String, CredentialError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.account_key).map_err(|_| CredentialError::InvalidKey)?;
        mac.update(string_to_sign.as_bytes());
        Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Unsigned URL of the container, or of a path inside it.
    pub fn resource_url(&self, path: Option<&str>, trailing_slash: bool) -> Result<Url, CredentialError> {
        let mut url =
            Url::parse(&self.endpoint).map_err(|e| CredentialError::Url(e.to_string()))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| CredentialError::Url(format!("{} cannot be a base URL", self.endpoint)))?;
            segments.pop_if_empty().push(&self.container);
            if let Some(path) = path {
                segments.extend(path.split('/'));
            }
            if trailing_slash {
                segments.push("");
            }
        }
        Ok(url)
    }
}

/// Service SAS string-to-sign; unused optional fields stay empty.
fn string_to_sign(permissions: &str, expiry: &str, canonical_resource: &str, resource: &str) -> String {
    [
        permissions,
        "", // signed start
        expiry,
        canonical_resource,
        "", // signed identifier
        "", // signed IP
        "https,http",
        SAS_VERSION,
        resource,
        "", // snapshot time
        "", // encryption scope
        "", // rscc
        "", // rscd
        "", // rsce
        "", // rscl
        "", // rsct
    ]
    .join("\n")
}

/// AzCopy invocation that uploads a local folder to `sas_url`.
pub fn azcopy_command(sas_url: &str) -> String {
    format!(r#"azcopy copy "<local_folder_path>/*" "{sas_url}" --recursive=true"#)
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Invalid storage account key (must be base64-encoded)")]
    InvalidKey,

    #[error("Credential lifetime must be positive, got {0} minutes")]
    InvalidTtl(i64),

    #[error("Invalid storage path: {0:?}")]
    InvalidPath(String),

    #[error("Failed to build storage URL: {0}")]
    Url(String),
}
