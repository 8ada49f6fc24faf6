use thiserror::Error;

/// Failure of a single job's remote operation.
///
/// These never cross the task boundary of the dispatcher: they are logged
/// against the job and its position and the run carries on.
#[derive(Error, Debug)]
pub enum JobError {
    #[error(
        "invalid job identifier '{0}': expected 5 non-empty dot-separated segments"
    )]
    InvalidIdentifier(String),

    #[error("authorization rejected (403)")]
    Forbidden,

    #[error("request failed with status {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("job document is not a JSON object")]
    Document,
}

impl JobError {
    /// Whether the remote side rejected the credential.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, JobError::Forbidden)
    }
}

/// Failure to obtain a credential the control plane accepts.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("credential still rejected after {attempts} refresh attempts")]
    CredentialExhausted { attempts: usize },

    #[error("credential validation failed: {0}")]
    Validation(#[source] JobError),

    #[error("identity provider failed: {0}")]
    Provider(#[source] anyhow::Error),
}

/// A run halted at a batch boundary because no valid credential could be
/// obtained. Carries everything an operator needs to restart the run.
#[derive(Error, Debug)]
#[error(
    "run aborted after {completed}/{total} jobs; next run starts from ({next_position}/{total}): {next_job}"
)]
pub struct RunAborted {
    /// Jobs in batches that fully finished before the abort.
    pub completed: usize,
    /// Size of the full job list.
    pub total: usize,
    /// 1-based position of the first job that was not dispatched.
    pub next_position: usize,
    /// Identifier of the first job that was not dispatched.
    pub next_job: String,
    #[source]
    pub source: AuthError,
}

/// A command name outside the closed command set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown command '{0}'")]
pub struct UnknownCommand(pub String);
