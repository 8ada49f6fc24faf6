pub mod audit;
pub mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use breaktime_config::{Config, ConfigLoader, Overrides, TaskKind};
use breaktime_core::{Command, RunAborted, RunSummary};
use tracing::{info, warn};

/// File locations shared by every subcommand.
#[derive(Debug, Clone)]
pub struct ConfigFiles {
    pub env_file: PathBuf,
    pub config: Option<PathBuf>,
}

/// Load and validate the configuration, logging any warnings.
pub fn load_config(
    files: &ConfigFiles,
    overrides: Overrides,
    kind: TaskKind,
) -> Result<Config> {
    let mut loader = ConfigLoader::new()
        .with_env_file(&files.env_file)
        .with_overrides(overrides);
    if let Some(path) = &files.config {
        loader = loader.with_config_path(path);
    }

    let load = loader.load(kind).context("failed to load configuration")?;
    for warning in &load.warnings.items {
        match &warning.hint {
            Some(hint) => warn!(hint = %hint, "{}", warning.message),
            None => warn!("{}", warning.message),
        }
    }

    let metadata = &load.config.metadata;
    info!(
        config = ?metadata.config_path,
        env_file_loaded = metadata.env_file_loaded,
        chunk_size = load.config.chunk_size,
        chunk_size_source = ?metadata.chunk_size_source,
        jobs = load.config.jobs.len(),
        identity = %load.config.identity.describe(),
        "Configuration loaded"
    );
    Ok(load.config)
}

/// Resume instructions after a run stopped at a batch boundary. Written to
/// stderr so that stdout stays machine-readable.
pub fn report_abort(aborted: &RunAborted, subcommand: &str) {
    eprintln!("Credential check failed: {}", aborted.source);
    eprintln!("({}/{}) Jobs have Completed", aborted.completed, aborted.total);
    eprintln!(
        "Next run starts from => ({}/{}): {}",
        aborted.next_position, aborted.total, aborted.next_job
    );
    eprintln!(
        "Resume with: breaktimectl {} --start-at {}",
        subcommand, aborted.next_position
    );
}

pub fn print_summary(summary: &RunSummary) {
    if summary.skipped > 0 {
        println!(
            "Skipped {} job(s) before the start position",
            summary.skipped
        );
    }
    println!(
        "{} job(s) in {} batch(es): {} succeeded, {} failed ({} forbidden)",
        summary.attempted,
        summary.batches,
        summary.succeeded,
        summary.failed,
        summary.forbidden
    );

    let mut failures: Vec<_> = summary.failures.iter().collect();
    failures.sort_by_key(|failure| failure.position);
    for failure in failures {
        println!(
            "  ({}/{}) {}: {}",
            failure.position, summary.total, failure.job, failure.error
        );
    }
}

pub fn print_commands() {
    for command in Command::ALL {
        let marker = if command.is_destructive() {
            " [destructive, needs ENABLE_DESTRUCTIVE]"
        } else {
            ""
        };
        println!(
            "{:<24} {}{}",
            command.as_str(),
            command.description(),
            marker
        );
    }
}
