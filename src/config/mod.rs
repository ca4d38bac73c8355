use serde::Deserialize;

/// Environment name that relaxes identity checks and allows running without PostgreSQL.
pub const DEVELOPMENT_ENV: &str = "Development";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Hosting environment name ("Production", "Development", ...).
    #[serde(default = "default_app_env")]
    pub app_env: String,

    /// PostgreSQL connection string for the job document store.
    /// Only optional in development, where an in-memory store is used instead.
    pub database_url: Option<String>,

    /// Blob storage account name
    pub storage_account_name: String,

    /// Blob storage account key (base64), used to sign SAS credentials
    pub storage_account_key: String,

    /// Container that receives uploaded job images
    #[serde(default = "default_upload_container")]
    pub storage_container_upload: String,

    /// Blob service endpoint override (e.g. a local emulator)
    pub storage_blob_endpoint: Option<String>,

    /// Remote detection server endpoint
    #[serde(default = "default_ai_server_endpoint")]
    pub ai_server_endpoint: String,

    #[serde(default = "default_dispatch_timeout_secs")]
    pub dispatch_timeout_secs: u64,

    /// Lifetime of upload credentials handed to clients
    #[serde(default = "default_sas_expiry_minutes")]
    pub sas_expiry_minutes: i64,

    /// Tag stamped onto every job's parameters to mark its origin system
    #[serde(default = "default_caller_tag")]
    pub caller_tag: String,

    #[serde(default = "default_api_instance")]
    pub api_instance: String,

    /// Report success to the client when the detection server cannot be reached.
    /// The failure is still recorded on the job.
    #[serde(default = "default_mask_transport_failures")]
    pub mask_dispatch_transport_failures: bool,

    /// Request body limit; uploads arrive base64-encoded in JSON.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_app_env() -> String {
    "Production".to_string()
}

fn default_upload_container() -> String {
    "test-centralised-upload".to_string()
}

fn default_ai_server_endpoint() -> String {
    "http://localhost:5000/request_detections".to_string()
}

fn default_dispatch_timeout_secs() -> u64 {
    30
}

fn default_sas_expiry_minutes() -> i64 {
    60
}

fn default_caller_tag() -> String {
    "awc".to_string()
}

fn default_api_instance() -> String {
    "web".to_string()
}

fn default_mask_transport_failures() -> bool {
    true
}

fn default_max_body_bytes() -> usize {
    32 * 1024 * 1024
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn is_development(&self) -> bool {
        self.app_env == DEVELOPMENT_ENV
    }

    /// Base URL of the blob service, without a trailing slash.
    pub fn blob_endpoint(&self) -> String {
        match &self.storage_blob_endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.blob.core.windows.net", self.storage_account_name),
        }
    }

    /// Configuration for tests and local tooling: development mode, no database.
    pub fn for_development(ai_server_endpoint: &str) -> Self {
        Self {
            bind_addr: default_bind_addr(),
            app_env: DEVELOPMENT_ENV.to_string(),
            database_url: None,
            storage_account_name: "devstoreaccount1".to_string(),
            storage_account_key: "ZGV2ZWxvcG1lbnQtb25seS1zdG9yYWdlLWtleQ==".to_string(),
            storage_container_upload: default_upload_container(),
            storage_blob_endpoint: Some("http://127.0.0.1:10000/devstoreaccount1".to_string()),
            ai_server_endpoint: ai_server_endpoint.to_string(),
            dispatch_timeout_secs: default_dispatch_timeout_secs(),
            sas_expiry_minutes: default_sas_expiry_minutes(),
            caller_tag: default_caller_tag(),
            api_instance: default_api_instance(),
            mask_dispatch_transport_failures: default_mask_transport_failures(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}
