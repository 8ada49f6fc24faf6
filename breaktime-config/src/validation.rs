use breaktime_core::{Command, CronTableError, JobId, UnknownCommand};
use thiserror::Error;

use super::models::{Config, Task};

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error(transparent)]
    UnknownCommand(#[from] UnknownCommand),
    #[error("no command given; set CMD or pass --command")]
    MissingCommand,
    #[error(
        "'{0}' is destructive and requires ENABLE_DESTRUCTIVE=true or --enable-destructive"
    )]
    DestructiveDisabled(Command),
    #[error("job list is empty; set JOBS or pass --jobs")]
    MissingJobs,
    #[error("control plane URL is not set; set META_SVC_URL or [control_plane].base_url")]
    MissingControlPlane,
    #[error("invalid {field} URL '{value}'")]
    InvalidUrl {
        field: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid cron table: {0}")]
    InvalidCronTable(#[from] CronTableError),
    #[error("audit needs a bucket; set GCS_BUCKET or pass --bucket")]
    MissingBucket,
    #[error("start position {start_at} is past the end of the {total} job list")]
    StartOutOfRange { start_at: usize, total: usize },
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }
}

/// Checks that need the assembled config. Failures here stop the process
/// before any network I/O.
pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    if config.jobs.is_empty() {
        return Err(ConfigGuardRailError::MissingJobs);
    }
    if config.start_at > config.jobs.len() {
        return Err(ConfigGuardRailError::StartOutOfRange {
            start_at: config.start_at,
            total: config.jobs.len(),
        });
    }

    match &config.task {
        Task::Run(run) => {
            if run.control_plane.base_url.trim().is_empty() {
                return Err(ConfigGuardRailError::MissingControlPlane);
            }
            run.payloads.cron.validate()?;

            if run.command == Command::EditTarget
                && run.payloads.edit_target.target_project_ids.is_empty()
                && run.payloads.edit_target.jdbc_targets.is_empty()
            {
                warnings.push_with_hint(
                    "editTarget will clear every promotion target",
                    "Add target_project_ids or jdbc_targets under [edit_target]",
                );
            }
        }
        Task::Audit(audit) => {
            if audit.bucket.trim().is_empty() {
                return Err(ConfigGuardRailError::MissingBucket);
            }
        }
    }

    let invalid: Vec<&str> = config
        .jobs
        .iter()
        .filter(|job| !JobId::is_valid(job))
        .map(String::as_str)
        .collect();
    if !invalid.is_empty() {
        warnings.push_with_hint(
            format!(
                "{} job identifier(s) are malformed and will fail: {}",
                invalid.len(),
                invalid.join(", ")
            ),
            "Identifiers need 5 dot-separated segments: source.technology.database.prefix.suffix",
        );
    }

    Ok(warnings)
}

/// Resolve a command name, refusing destructive commands unless enabled.
pub fn resolve_command(
    name: Option<&str>,
    enable_destructive: bool,
) -> Result<Command, ConfigGuardRailError> {
    let name = name.ok_or(ConfigGuardRailError::MissingCommand)?;
    let command: Command = name.parse()?;
    if command.is_destructive() && !enable_destructive {
        return Err(ConfigGuardRailError::DestructiveDisabled(command));
    }
    Ok(command)
}
