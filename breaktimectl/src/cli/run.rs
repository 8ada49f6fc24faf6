use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use breaktime_config::{Overrides, Task, TaskKind};
use breaktime_core::{
    CommandHandler, ConcurrentDispatcher, HttpControlPlane,
    TokenLifecycleManager,
};
use clap::Args;
use tracing::info;

use super::{ConfigFiles, load_config, print_summary, report_abort};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Command to apply (see `breaktimectl commands`); overrides CMD
    #[arg(short, long)]
    pub command: Option<String>,
    /// Delimited job identifiers; overrides JOBS
    #[arg(long)]
    pub jobs: Option<String>,
    /// Jobs dispatched concurrently per batch; overrides CHUNK_SIZE
    #[arg(long)]
    pub chunk_size: Option<usize>,
    /// 1-based position to resume from
    #[arg(long)]
    pub start_at: Option<usize>,
    /// Control plane base URL; overrides META_SVC_URL
    #[arg(long)]
    pub meta_svc_url: Option<String>,
    /// Bearer token used instead of the identity token command
    #[arg(long)]
    pub token: Option<String>,
    /// Allow delete and deleteHydratedResources
    #[arg(long)]
    pub enable_destructive: bool,
}

impl From<RunArgs> for Overrides {
    fn from(args: RunArgs) -> Self {
        Overrides {
            jobs: args.jobs,
            command: args.command,
            chunk_size: args.chunk_size,
            start_at: args.start_at,
            control_plane_url: args.meta_svc_url,
            enable_destructive: args.enable_destructive,
            token: args.token,
            ..Overrides::default()
        }
    }
}

pub async fn execute(files: &ConfigFiles, args: RunArgs) -> Result<ExitCode> {
    let config = load_config(files, args.into(), TaskKind::Run)?;
    let Task::Run(run) = &config.task else {
        bail!("configuration was not assembled for a run");
    };

    let plane = Arc::new(
        HttpControlPlane::new(
            &run.control_plane.base_url,
            &run.control_plane.validate_path,
            config.http_timeout,
        )
        .context("failed to build the control plane client")?,
    );
    let tokens =
        TokenLifecycleManager::new(plane.clone(), config.identity.provider()?);
    let credential = tokens
        .acquire()
        .await
        .context("failed to obtain an identity token")?;

    let handler = Arc::new(CommandHandler::new(
        run.command,
        plane,
        Arc::clone(&run.payloads),
    ));
    let dispatcher =
        ConcurrentDispatcher::new(handler, tokens, config.chunk_size);

    info!(
        command = %run.command,
        jobs = config.jobs.len(),
        start_at = config.start_at,
        chunk_size = dispatcher.chunk_size(),
        "Starting run"
    );

    match dispatcher
        .run_from(&config.jobs, config.start_at, credential)
        .await
    {
        Ok(summary) => {
            print_summary(&summary);
            println!("All jobs execution complete!");
            Ok(ExitCode::SUCCESS)
        }
        Err(aborted) => {
            report_abort(&aborted, "run");
            Ok(ExitCode::FAILURE)
        }
    }
}
