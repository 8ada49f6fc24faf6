use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use breaktime_config::{Overrides, Task, TaskKind};
use breaktime_core::{
    AuditFinding, AuditHandler, BucketAccess, ConcurrentDispatcher,
    DirectoryPager, GcsObjectStore, TokenLifecycleManager,
};
use clap::Args;
use serde::Serialize;
use tracing::info;

use super::{ConfigFiles, load_config, report_abort};

#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Delimited job identifiers; overrides JOBS
    #[arg(long)]
    pub jobs: Option<String>,
    /// Bucket holding the job directories; overrides GCS_BUCKET
    #[arg(long)]
    pub bucket: Option<String>,
    /// Newest directories per job that are kept; overrides AUDIT_TRIM
    #[arg(long)]
    pub trim: Option<usize>,
    /// Jobs listed concurrently per batch; overrides CHUNK_SIZE
    #[arg(long)]
    pub chunk_size: Option<usize>,
    /// 1-based position to resume from
    #[arg(long)]
    pub start_at: Option<usize>,
    /// Bearer token used instead of the identity token command
    #[arg(long)]
    pub token: Option<String>,
    /// Print findings as JSON
    #[arg(long)]
    pub json: bool,
}

impl From<&AuditArgs> for Overrides {
    fn from(args: &AuditArgs) -> Self {
        Overrides {
            jobs: args.jobs.clone(),
            chunk_size: args.chunk_size,
            start_at: args.start_at,
            token: args.token.clone(),
            bucket: args.bucket.clone(),
            audit_trim: args.trim,
            ..Overrides::default()
        }
    }
}

#[derive(Serialize)]
struct AuditReport<'a> {
    bucket: &'a str,
    complete: bool,
    findings: &'a [AuditFinding],
}

pub async fn execute(files: &ConfigFiles, args: AuditArgs) -> Result<ExitCode> {
    let config = load_config(files, (&args).into(), TaskKind::Audit)?;
    let Task::Audit(audit) = &config.task else {
        bail!("configuration was not assembled for an audit");
    };

    let store = Arc::new(
        GcsObjectStore::new(&audit.storage_base_url, config.http_timeout)
            .context("failed to build the storage client")?,
    );
    let tokens = TokenLifecycleManager::new(
        Arc::new(BucketAccess::new(Arc::clone(&store), &audit.bucket)),
        config.identity.provider()?,
    );
    let credential = tokens
        .acquire()
        .await
        .context("failed to obtain an identity token")?;

    let handler = Arc::new(AuditHandler::new(
        DirectoryPager::new(store),
        &audit.bucket,
        &audit.subpath,
        audit.trim,
    ));
    let dispatcher = ConcurrentDispatcher::new(
        Arc::clone(&handler),
        tokens,
        config.chunk_size,
    );

    info!(
        bucket = %audit.bucket,
        subpath = %audit.subpath,
        trim = audit.trim,
        jobs = config.jobs.len(),
        "Starting directory audit"
    );

    let outcome = dispatcher
        .run_from(&config.jobs, config.start_at, credential)
        .await;
    // Findings from batches that finished are reported even after an abort.
    let findings = handler.take_findings().await;

    if args.json {
        let report = AuditReport {
            bucket: handler.bucket(),
            complete: outcome.is_ok(),
            findings: &findings,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_findings(handler.bucket(), config.jobs.len(), &findings);
    }

    match outcome {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(aborted) => {
            report_abort(&aborted, "audit");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_findings(bucket: &str, total: usize, findings: &[AuditFinding]) {
    let mut candidates = 0;
    for finding in findings {
        println!(
            "# ({}/{}) {}: {} candidate(s)",
            finding.position,
            total,
            finding.job,
            finding.candidates.len()
        );
        for prefix in &finding.candidates {
            println!("gs://{bucket}/{prefix}");
        }
        candidates += finding.candidates.len();
    }
    println!(
        "{} cleanup candidate(s) across {} job(s)",
        candidates,
        findings.len()
    );
}
