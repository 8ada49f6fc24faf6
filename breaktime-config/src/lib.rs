//! Configuration loading for breaktime.
//!
//! A single [`ConfigLoader::load`] call turns command-line overrides, the
//! process environment (optionally seeded from a `.env` file) and an optional
//! `breaktime.toml` into one immutable [`Config`]. Guard rails run as part of
//! loading, so an unknown or disabled command, an empty job list or a broken
//! cron table stop the process before any network I/O.

pub mod constants;
pub mod loader;
pub mod models;
pub mod util;
pub mod validation;

pub use loader::{
    ConfigLoad, ConfigLoader, ConfigLoaderOptions, Overrides, TaskKind,
    error::ConfigLoadError,
};
pub use models::sources::{EnvConfig, FileConfig};
pub use models::{
    AuditConfig, ChunkSizeSource, Config, ConfigMetadata, ControlPlaneConfig,
    IdentitySource, RunConfig, Task,
};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
