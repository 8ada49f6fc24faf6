pub mod sources;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use breaktime_core::{
    Command, CommandIdentity, CommandPayloads, Credential, IdentityProvider,
    StaticIdentity,
};

/// Fully resolved configuration for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Job identifiers in operator order; positions are 1-based indexes
    /// into this list.
    pub jobs: Vec<String>,
    pub chunk_size: usize,
    /// 1-based position of the first job to dispatch.
    pub start_at: usize,
    pub identity: IdentitySource,
    /// Per-request timeout for every HTTP client.
    pub http_timeout: Duration,
    pub task: Task,
    pub metadata: ConfigMetadata,
}

/// What the invocation does with the job list.
#[derive(Debug, Clone)]
pub enum Task {
    Run(RunConfig),
    Audit(AuditConfig),
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub command: Command,
    pub control_plane: ControlPlaneConfig,
    /// Shared by every handler task of the run.
    pub payloads: Arc<CommandPayloads>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPlaneConfig {
    pub base_url: String,
    pub validate_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditConfig {
    pub bucket: String,
    pub storage_base_url: String,
    /// Directory under each job's storage root that is listed.
    pub subpath: String,
    /// Newest directories excluded from the candidates.
    pub trim: usize,
}

/// Where fresh identity tokens come from.
#[derive(Debug, Clone)]
pub enum IdentitySource {
    /// Operator-supplied token, re-yielded on every refresh.
    Static(Credential),
    /// Command line whose stdout is a token.
    Command(String),
}

impl IdentitySource {
    pub fn provider(&self) -> anyhow::Result<Arc<dyn IdentityProvider>> {
        Ok(match self {
            Self::Static(token) => Arc::new(StaticIdentity::new(token.clone())),
            Self::Command(line) => {
                Arc::new(CommandIdentity::from_command_line(line)?)
            }
        })
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Static(_) => "static token".to_string(),
            Self::Command(line) => format!("command `{line}`"),
        }
    }
}

/// How the chunk size was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkSizeSource {
    Flag,
    Env,
    Default,
}

#[derive(Debug, Clone)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
    pub chunk_size_source: ChunkSizeSource,
}

impl Default for ConfigMetadata {
    fn default() -> Self {
        Self {
            config_path: None,
            env_file_loaded: false,
            chunk_size_source: ChunkSizeSource::Default,
        }
    }
}

impl Config {
    pub fn command(&self) -> Option<Command> {
        match &self.task {
            Task::Run(run) => Some(run.command),
            Task::Audit(_) => None,
        }
    }
}
