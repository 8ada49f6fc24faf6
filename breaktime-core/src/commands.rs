//! The closed set of job commands and their handlers.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use crate::control_plane::ControlPlane;
use crate::cron::{CronSlot, CronTable};
use crate::credential::Credential;
use crate::dispatcher::JobHandler;
use crate::error::{JobError, UnknownCommand};
use crate::job_id::JobId;

/// A remote operation applied to every job of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Pause,
    Resume,
    Stop,
    Load,
    Reload,
    Lock,
    Unlock,
    EditTarget,
    EditCron,
    Delete,
    DeleteHydratedResources,
}

impl Command {
    pub const ALL: [Command; 11] = [
        Command::Pause,
        Command::Resume,
        Command::Stop,
        Command::Load,
        Command::Reload,
        Command::Lock,
        Command::Unlock,
        Command::EditTarget,
        Command::EditCron,
        Command::Delete,
        Command::DeleteHydratedResources,
    ];

    /// Name used in configuration and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::Load => "load",
            Self::Reload => "reload",
            Self::Lock => "lock",
            Self::Unlock => "unlock",
            Self::EditTarget => "editTarget",
            Self::EditCron => "editCron",
            Self::Delete => "delete",
            Self::DeleteHydratedResources => "deleteHydratedResources",
        }
    }

    /// Irreversible commands. These must be enabled explicitly.
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::Delete | Self::DeleteHydratedResources)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Pause => "pause the job",
            Self::Resume => "resume a paused job",
            Self::Stop => "stop the running load",
            Self::Load => "trigger a load",
            Self::Reload => "reload with the configured retention flags",
            Self::Lock => "lock the job",
            Self::Unlock => "unlock the job",
            Self::EditTarget => "replace the promotion targets",
            Self::EditCron => "reschedule onto a staggered cron slot",
            Self::Delete => "delete the job",
            Self::DeleteHydratedResources => {
                "delete the job's hydrated resources"
            }
        }
    }

    fn completion_message(&self) -> &'static str {
        match self {
            Self::Pause => "has been triggered to be paused",
            Self::Resume => "has been triggered to be resumed",
            Self::Stop => "has been triggered to be stopped",
            Self::Load => "has been triggered to be run",
            Self::Reload => "has been triggered to be reloaded",
            Self::Lock => "has been triggered to be locked",
            Self::Unlock => "has been triggered to be unlocked",
            Self::EditTarget => "targets have been triggered to be changed",
            Self::EditCron => "cron has been triggered to be changed",
            Self::Delete => "has been triggered to be deleted",
            Self::DeleteHydratedResources => {
                "has been triggered to clean up the hydrated resources"
            }
        }
    }
}

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Command::ALL
            .into_iter()
            .find(|command| command.as_str() == name)
            .ok_or_else(|| UnknownCommand(name.to_string()))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dataset retention flags sent with `reload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReloadOptions {
    pub keep_foundry_dataset: bool,
    pub retain_data: bool,
}

impl Default for ReloadOptions {
    fn default() -> Self {
        Self {
            keep_foundry_dataset: true,
            retain_data: false,
        }
    }
}

/// Promotion targets sent with `editTarget`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditTargetOptions {
    pub target_project_ids: Vec<String>,
    pub jdbc_targets: Vec<Value>,
}

/// Operator-supplied request payloads. Pure data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandPayloads {
    pub reload: ReloadOptions,
    pub edit_target: EditTargetOptions,
    pub cron: CronTable,
}

/// Set `schedule` on a fetched job document, leaving every other field as
/// it was.
pub fn set_schedule(document: &mut Value, cron: &str) -> Result<(), JobError> {
    let object = document.as_object_mut().ok_or(JobError::Document)?;
    object.insert("schedule".to_string(), Value::String(cron.to_string()));
    Ok(())
}

/// Read-modify-write of the job's schedule.
pub async fn edit_schedule(
    plane: &dyn ControlPlane,
    job: &JobId,
    slot: &CronSlot,
    credential: &Credential,
) -> Result<(), JobError> {
    info!(
        job = %job,
        cron = %slot.cron,
        timezone = %slot.timezone,
        "Getting job data"
    );
    let mut document = plane.get(job, credential).await?;
    set_schedule(&mut document, &slot.cron)?;
    plane.post(job, "edit", &document, credential).await
}

/// Applies one [`Command`] to a job through the control plane.
#[derive(Clone)]
pub struct CommandHandler {
    command: Command,
    plane: Arc<dyn ControlPlane>,
    payloads: Arc<CommandPayloads>,
}

impl fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandHandler")
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}

impl CommandHandler {
    pub fn new(
        command: Command,
        plane: Arc<dyn ControlPlane>,
        payloads: Arc<CommandPayloads>,
    ) -> Self {
        Self {
            command,
            plane,
            payloads,
        }
    }

    pub fn command(&self) -> Command {
        self.command
    }

    /// Run the command for a parsed job at 1-based `position`.
    pub async fn execute(
        &self,
        job: &JobId,
        position: usize,
        credential: &Credential,
    ) -> Result<(), JobError> {
        let plane = self.plane.as_ref();
        let empty = json!({});

        match self.command {
            Command::Pause
            | Command::Resume
            | Command::Stop
            | Command::Load
            | Command::Lock
            | Command::Unlock => {
                plane
                    .post(job, self.command.as_str(), &empty, credential)
                    .await?
            }
            Command::Reload => {
                let body = serde_json::to_value(&self.payloads.reload)?;
                plane.post(job, "reload", &body, credential).await?
            }
            Command::EditTarget => {
                let body = serde_json::to_value(&self.payloads.edit_target)?;
                plane.post(job, "edit", &body, credential).await?
            }
            Command::EditCron => {
                let slot = self.payloads.cron.assign(position);
                edit_schedule(plane, job, &slot, credential).await?
            }
            Command::Delete => plane.delete(job, credential).await?,
            Command::DeleteHydratedResources => {
                plane
                    .post(job, "delete_hydrated_resources", &empty, credential)
                    .await?
            }
        }

        info!("Job {} {}.", job, self.command.completion_message());
        Ok(())
    }
}

#[async_trait]
impl JobHandler for CommandHandler {
    async fn handle(
        &self,
        job: &str,
        position: usize,
        credential: &Credential,
    ) -> Result<(), JobError> {
        let job = JobId::parse(job)?;
        self.execute(&job, position, credential).await
    }
}
