use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::*;
use crate::util::{non_empty, parse_bool, parse_duration};

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub reload: FileReloadConfig,
    #[serde(default)]
    pub edit_target: FileEditTargetConfig,
    pub cron: Option<FileCronConfig>,
    #[serde(default)]
    pub control_plane: FileControlPlaneConfig,
    #[serde(default)]
    pub audit: FileAuditConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileReloadConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_foundry_dataset: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retain_data: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileEditTargetConfig {
    #[serde(default)]
    pub target_project_ids: Vec<String>,
    /// Opaque JDBC target descriptors, forwarded as JSON.
    #[serde(default)]
    pub jdbc_targets: Vec<toml::Value>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCronConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(rename = "default", skip_serializing_if = "Option::is_none")]
    pub default_cron: Option<String>,
    #[serde(default)]
    pub ranges: Vec<FileCronRange>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileCronRange {
    pub min: usize,
    pub max: usize,
    pub cron: String,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileControlPlaneConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validate_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileAuditConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subpath: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim: Option<usize>,
}

/// Environment-derived configuration values.
///
/// Values are kept raw where the loader needs to report on them (job list,
/// chunk size); everything else is parsed here.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub jobs: Option<String>,
    pub jobs_delimiter: Option<String>,
    pub control_plane_url: Option<String>,
    pub command: Option<String>,
    pub chunk_size: Option<String>,
    pub start_at: Option<usize>,
    pub enable_destructive: Option<bool>,
    pub token: Option<String>,
    pub identity_token_cmd: Option<String>,
    pub http_timeout: Option<Duration>,
    pub bucket: Option<String>,
    pub storage_base_url: Option<String>,
    pub audit_subpath: Option<String>,
    pub audit_trim: Option<usize>,
    pub config_path: Option<PathBuf>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| non_empty(lookup(name));

        Self {
            jobs: var(ENV_JOBS),
            jobs_delimiter: lookup(ENV_JOBS_DELIMITER)
                .filter(|d| !d.is_empty()),
            control_plane_url: var(ENV_CONTROL_PLANE_URL),
            command: var(ENV_COMMAND),
            chunk_size: var(ENV_CHUNK_SIZE),
            start_at: var(ENV_START_AT).and_then(|s| s.trim().parse().ok()),
            enable_destructive: var(ENV_ENABLE_DESTRUCTIVE)
                .and_then(|s| parse_bool(&s)),
            token: var(ENV_TOKEN),
            identity_token_cmd: var(ENV_IDENTITY_TOKEN_CMD),
            http_timeout: var(ENV_HTTP_TIMEOUT)
                .and_then(|s| parse_duration(&s)),
            bucket: var(ENV_BUCKET),
            storage_base_url: var(ENV_STORAGE_BASE_URL),
            audit_subpath: lookup(ENV_AUDIT_SUBPATH),
            audit_trim: var(ENV_AUDIT_TRIM)
                .and_then(|s| s.trim().parse().ok()),
            config_path: var(ENV_CONFIG_PATH).map(PathBuf::from),
        }
    }
}
