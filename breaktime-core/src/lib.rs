//! Core orchestration for batch job control.
//!
//! This crate drives one remote command over a large set of pipeline jobs:
//! the job list is split into bounded batches, a bearer credential is
//! validated (and refreshed through an identity provider) before every batch,
//! and each batch fans out one task per job. It also hosts the paginated
//! object-store listing used to find stale per-job storage prefixes.
//!
//! The CLI in `breaktimectl` wires these pieces together from a single
//! `breaktime-config` value.

pub mod audit;
pub mod batch;
pub mod commands;
pub mod control_plane;
pub mod credential;
pub mod cron;
pub mod dispatcher;
pub mod error;
pub mod job_id;
pub mod storage;
pub mod token;

pub use audit::{AuditFinding, AuditHandler};
pub use commands::{
    Command, CommandHandler, CommandPayloads, EditTargetOptions, ReloadOptions,
};
pub use control_plane::{ControlPlane, CredentialValidator, HttpControlPlane};
pub use credential::{
    CommandIdentity, Credential, IdentityProvider, StaticIdentity,
};
pub use cron::{CronRange, CronSlot, CronTable, CronTableError};
pub use dispatcher::{
    ConcurrentDispatcher, DEFAULT_CHUNK_SIZE, JobFailure, JobHandler,
    RunSummary,
};
pub use error::{AuthError, JobError, RunAborted, UnknownCommand};
pub use job_id::JobId;
pub use storage::{
    BucketAccess, DirectoryPage, DirectoryPager, GcsObjectStore, ObjectStore,
};
pub use token::{MAX_REFRESH_ATTEMPTS, TokenLifecycleManager};
