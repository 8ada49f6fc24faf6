pub mod error;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use breaktime_core::cron::{DEFAULT_CRON, DEFAULT_TIMEZONE};
use breaktime_core::storage::DEFAULT_STORAGE_BASE_URL;
use breaktime_core::{
    Command, CommandPayloads, CronRange, CronTable, Credential,
    DEFAULT_CHUNK_SIZE, EditTargetOptions, ReloadOptions,
};
use tracing::debug;
use url::Url;

use crate::constants::*;
use crate::models::sources::{
    EnvConfig, FileConfig, FileCronConfig, FileEditTargetConfig,
    FileReloadConfig,
};
use crate::models::{
    AuditConfig, ChunkSizeSource, Config, ConfigMetadata, ControlPlaneConfig,
    IdentitySource, RunConfig, Task,
};
use crate::util::{non_empty, parse_list};
use crate::validation::{
    self, ConfigGuardRailError, ConfigWarnings, resolve_command,
};

pub use error::ConfigLoadError;

/// Config file names probed in the working directory when no path is given.
const DEFAULT_CONFIG_LOCATIONS: [&str; 2] =
    ["breaktime.toml", "config/breaktime.toml"];

/// Which subcommand the configuration is assembled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Run,
    Audit,
}

/// Values given on the command line. They win over every other source.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    /// Delimited job list, split like `JOBS`.
    pub jobs: Option<String>,
    pub command: Option<String>,
    pub chunk_size: Option<usize>,
    pub start_at: Option<usize>,
    pub control_plane_url: Option<String>,
    pub enable_destructive: bool,
    pub token: Option<String>,
    pub bucket: Option<String>,
    pub audit_trim: Option<usize>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
    pub overrides: Overrides,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.options.overrides = overrides;
        self
    }

    /// Load the `.env` file into the process environment, then assemble the
    /// configuration from flags, environment and the TOML file.
    pub fn load(&self, kind: TaskKind) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let mut load = self.load_with_env(kind, EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Assemble the configuration from an already gathered environment.
    /// The process environment is not consulted.
    pub fn load_with_env(
        &self,
        kind: TaskKind,
        env: EnvConfig,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file, config_path) = self.load_file_config(&env)?;
        let (config, mut warnings) =
            self.compose_config(kind, file, env, config_path)?;

        warnings.extend(validation::apply_guard_rails(&config)?);
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let explicit = self
            .options
            .config_path
            .clone()
            .or_else(|| env.config_path.clone());

        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            Some(path) => path,
            None => match DEFAULT_CONFIG_LOCATIONS
                .into_iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists())
            {
                Some(path) => path,
                None => return Ok((None, None)),
            },
        };

        let file = read_file_config(&path)?;
        debug!(path = %path.display(), "Loaded configuration file");
        Ok((Some(file), Some(path)))
    }

    fn compose_config(
        &self,
        kind: TaskKind,
        file: Option<FileConfig>,
        env: EnvConfig,
        config_path: Option<PathBuf>,
    ) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
        let overrides = &self.options.overrides;
        let mut warnings = ConfigWarnings::default();
        let file = file.unwrap_or_default();

        let delimiter = env
            .jobs_delimiter
            .as_deref()
            .unwrap_or(DEFAULT_JOBS_DELIMITER);
        let jobs = non_empty(overrides.jobs.clone())
            .or(env.jobs.clone())
            .map(|raw| parse_list(&raw, delimiter))
            .unwrap_or_default();

        let (chunk_size, chunk_size_source) =
            resolve_chunk_size(overrides, &env, &mut warnings);

        let identity = match non_empty(overrides.token.clone()).or(env.token) {
            Some(token) => IdentitySource::Static(Credential::new(token)),
            None => IdentitySource::Command(
                env.identity_token_cmd
                    .unwrap_or_else(|| DEFAULT_IDENTITY_TOKEN_CMD.to_string()),
            ),
        };

        let http_timeout = env
            .http_timeout
            .or(file
                .control_plane
                .timeout_secs
                .map(std::time::Duration::from_secs))
            .unwrap_or(DEFAULT_HTTP_TIMEOUT);

        let task = match kind {
            TaskKind::Run => {
                let command = resolve_command(
                    overrides.command.as_deref().or(env.command.as_deref()),
                    overrides.enable_destructive
                        || env.enable_destructive.unwrap_or(false),
                )?;

                let base_url = non_empty(overrides.control_plane_url.clone())
                    .or(env.control_plane_url.clone())
                    .or(file.control_plane.base_url.clone())
                    .ok_or(ConfigGuardRailError::MissingControlPlane)?;
                check_url("control plane", &base_url)?;

                if config_path.is_none()
                    && matches!(
                        command,
                        Command::Reload
                            | Command::EditTarget
                            | Command::EditCron
                    )
                {
                    warnings.push_with_hint(
                        format!(
                            "No breaktime.toml detected; {command} uses built-in payload defaults"
                        ),
                        "Set BREAKTIME_CONFIG_PATH or pass --config to supply payloads",
                    );
                }

                Task::Run(RunConfig {
                    command,
                    control_plane: ControlPlaneConfig {
                        base_url,
                        validate_path: file
                            .control_plane
                            .validate_path
                            .clone()
                            .unwrap_or_else(|| {
                                DEFAULT_VALIDATE_PATH.to_string()
                            }),
                    },
                    payloads: Arc::new(compose_payloads(&file)?),
                })
            }
            TaskKind::Audit => {
                let storage_base_url = env
                    .storage_base_url
                    .clone()
                    .or(file.audit.base_url.clone())
                    .unwrap_or_else(|| DEFAULT_STORAGE_BASE_URL.to_string());
                check_url("storage", &storage_base_url)?;

                Task::Audit(AuditConfig {
                    bucket: non_empty(overrides.bucket.clone())
                        .or(env.bucket.clone())
                        .or(file.audit.bucket.clone())
                        .unwrap_or_default(),
                    storage_base_url,
                    subpath: env
                        .audit_subpath
                        .clone()
                        .or(file.audit.subpath.clone())
                        .unwrap_or_else(|| DEFAULT_AUDIT_SUBPATH.to_string())
                        .trim_matches('/')
                        .to_string(),
                    trim: overrides
                        .audit_trim
                        .or(env.audit_trim)
                        .or(file.audit.trim)
                        .unwrap_or(DEFAULT_AUDIT_TRIM),
                })
            }
        };

        let config = Config {
            jobs,
            chunk_size,
            start_at: overrides.start_at.or(env.start_at).unwrap_or(1).max(1),
            identity,
            http_timeout,
            task,
            metadata: ConfigMetadata {
                config_path,
                env_file_loaded: false,
                chunk_size_source,
            },
        };

        Ok((config, warnings))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|err| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;
    toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source: err,
    })
}

/// Flag, then `CHUNK_SIZE`, then the default. Zero or unparseable values
/// fall back to the default with a warning.
fn resolve_chunk_size(
    overrides: &Overrides,
    env: &EnvConfig,
    warnings: &mut ConfigWarnings,
) -> (usize, ChunkSizeSource) {
    if let Some(size) = overrides.chunk_size {
        if size > 0 {
            return (size, ChunkSizeSource::Flag);
        }
        warnings.push(format!(
            "--chunk-size 0 is not usable; using default {DEFAULT_CHUNK_SIZE}"
        ));
        return (DEFAULT_CHUNK_SIZE, ChunkSizeSource::Default);
    }

    match env.chunk_size.as_deref().map(|raw| raw.trim().parse::<usize>()) {
        Some(Ok(size)) if size > 0 => (size, ChunkSizeSource::Env),
        Some(_) => {
            warnings.push_with_hint(
                format!(
                    "{ENV_CHUNK_SIZE}={} is not a positive integer; using default {DEFAULT_CHUNK_SIZE}",
                    env.chunk_size.as_deref().unwrap_or_default()
                ),
                "Set CHUNK_SIZE to the number of jobs dispatched concurrently",
            );
            (DEFAULT_CHUNK_SIZE, ChunkSizeSource::Default)
        }
        None => (DEFAULT_CHUNK_SIZE, ChunkSizeSource::Default),
    }
}

fn check_url(
    field: &'static str,
    value: &str,
) -> Result<(), ConfigGuardRailError> {
    Url::parse(value).map(|_| ()).map_err(|source| {
        ConfigGuardRailError::InvalidUrl {
            field,
            value: value.to_string(),
            source,
        }
    })
}

fn compose_payloads(
    file: &FileConfig,
) -> Result<CommandPayloads, ConfigLoadError> {
    Ok(CommandPayloads {
        reload: compose_reload(&file.reload),
        edit_target: compose_edit_target(&file.edit_target)?,
        cron: match &file.cron {
            Some(cron) => compose_cron(cron)?,
            None => CronTable::default(),
        },
    })
}

fn compose_reload(file: &FileReloadConfig) -> ReloadOptions {
    let defaults = ReloadOptions::default();
    ReloadOptions {
        keep_foundry_dataset: file
            .keep_foundry_dataset
            .unwrap_or(defaults.keep_foundry_dataset),
        retain_data: file.retain_data.unwrap_or(defaults.retain_data),
    }
}

fn compose_edit_target(
    file: &FileEditTargetConfig,
) -> Result<EditTargetOptions, ConfigLoadError> {
    let jdbc_targets = file
        .jdbc_targets
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| ConfigLoadError::Payload { source })?;

    Ok(EditTargetOptions {
        target_project_ids: file.target_project_ids.clone(),
        jdbc_targets,
    })
}

/// A `[cron]` section without ranges keeps the built-in ranges but may
/// still override the timezone and fallback expression.
fn compose_cron(
    file: &FileCronConfig,
) -> Result<CronTable, ConfigGuardRailError> {
    let ranges = if file.ranges.is_empty() {
        CronTable::default().ranges().to_vec()
    } else {
        file.ranges
            .iter()
            .map(|range| {
                CronRange::new(range.min, range.max, range.cron.clone())
            })
            .collect()
    };

    Ok(CronTable::new(
        file.timezone.as_deref().unwrap_or(DEFAULT_TIMEZONE),
        file.default_cron.as_deref().unwrap_or(DEFAULT_CRON),
        ranges,
    )?)
}
