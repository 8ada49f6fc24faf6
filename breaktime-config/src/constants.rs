//! Environment variable names and built-in defaults.

use std::time::Duration;

pub const ENV_JOBS: &str = "JOBS";
pub const ENV_JOBS_DELIMITER: &str = "JOBS_DELIMITER";
pub const ENV_CONTROL_PLANE_URL: &str = "META_SVC_URL";
pub const ENV_COMMAND: &str = "CMD";
pub const ENV_CHUNK_SIZE: &str = "CHUNK_SIZE";
pub const ENV_START_AT: &str = "START_AT";
pub const ENV_ENABLE_DESTRUCTIVE: &str = "ENABLE_DESTRUCTIVE";
pub const ENV_TOKEN: &str = "TOKEN";
pub const ENV_IDENTITY_TOKEN_CMD: &str = "IDENTITY_TOKEN_CMD";
pub const ENV_HTTP_TIMEOUT: &str = "HTTP_TIMEOUT";
pub const ENV_BUCKET: &str = "GCS_BUCKET";
pub const ENV_STORAGE_BASE_URL: &str = "GCS_BASE_URL";
pub const ENV_AUDIT_SUBPATH: &str = "AUDIT_SUBPATH";
pub const ENV_AUDIT_TRIM: &str = "AUDIT_TRIM";
pub const ENV_CONFIG_PATH: &str = "BREAKTIME_CONFIG_PATH";

pub const DEFAULT_JOBS_DELIMITER: &str = "/";
pub const DEFAULT_IDENTITY_TOKEN_CMD: &str = "gcloud auth print-identity-token";
pub const DEFAULT_VALIDATE_PATH: &str = "sources";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_AUDIT_SUBPATH: &str = "transactions";
/// Newest directories per job that are never offered for cleanup.
pub const DEFAULT_AUDIT_TRIM: usize = 5;
