//! Batch-by-batch concurrent dispatch of one handler over a job list.
//!
//! The job list is partitioned into ordered batches. Before each batch the
//! credential is validated (and refreshed if needed) on the controlling task;
//! the batch then fans out one spawned task per job, all sharing the same
//! credential snapshot, and is joined before the next batch starts. This
//! bounds in-flight requests to the batch size and validates the credential
//! once per batch.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{error, info, warn};

use crate::batch::{batch_count, partition};
use crate::credential::Credential;
use crate::error::{JobError, RunAborted};
use crate::token::TokenLifecycleManager;

/// Default number of jobs per batch.
pub const DEFAULT_CHUNK_SIZE: usize = 5;

/// Per-job work applied by the dispatcher.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    /// Handle the raw identifier `job` at 1-based `position` in the full list.
    async fn handle(
        &self,
        job: &str,
        position: usize,
        credential: &Credential,
    ) -> Result<(), JobError>;
}

/// A job whose handler returned an error.
#[derive(Debug)]
pub struct JobFailure {
    pub position: usize,
    pub job: String,
    pub error: JobError,
}

/// Outcome of a run that reached the end of the job list.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Size of the full job list.
    pub total: usize,
    /// Jobs before the start position that were not dispatched.
    pub skipped: usize,
    pub batches: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Failures that were authorization rejections.
    pub forbidden: usize,
    pub failures: Vec<JobFailure>,
}

impl RunSummary {
    fn record(
        &mut self,
        position: usize,
        job: String,
        result: Result<(), JobError>,
    ) {
        self.attempted += 1;
        match result {
            Ok(()) => self.succeeded += 1,
            Err(error) => {
                self.failed += 1;
                if error.is_forbidden() {
                    self.forbidden += 1;
                }
                self.failures.push(JobFailure {
                    position,
                    job,
                    error,
                });
            }
        }
    }
}

/// Runs a [`JobHandler`] over a job list in credential-validated batches.
pub struct ConcurrentDispatcher<H> {
    handler: Arc<H>,
    tokens: TokenLifecycleManager,
    chunk_size: usize,
}

impl<H> std::fmt::Debug for ConcurrentDispatcher<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentDispatcher")
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}

impl<H: JobHandler> ConcurrentDispatcher<H> {
    pub fn new(
        handler: Arc<H>,
        tokens: TokenLifecycleManager,
        chunk_size: usize,
    ) -> Self {
        Self {
            handler,
            tokens,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Process every job, starting from the first.
    pub async fn run(
        &self,
        jobs: &[String],
        credential: Credential,
    ) -> Result<RunSummary, RunAborted> {
        self.run_from(jobs, 1, credential).await
    }

    /// Process the jobs from 1-based `start_at` onwards. Positions reported
    /// to handlers and in progress output stay relative to the full list.
    ///
    /// Per-job failures are collected in the summary. The run only aborts
    /// when a batch's credential cannot be validated.
    pub async fn run_from(
        &self,
        jobs: &[String],
        start_at: usize,
        credential: Credential,
    ) -> Result<RunSummary, RunAborted> {
        let total = jobs.len();
        let skip = start_at.saturating_sub(1).min(total);
        let pending = &jobs[skip..];
        let batches = batch_count(pending.len(), self.chunk_size);

        let mut summary = RunSummary {
            total,
            skipped: skip,
            ..RunSummary::default()
        };
        let mut credential = credential;

        for batch in partition(pending, self.chunk_size) {
            // 0-based index of the batch's first job in the full list.
            let first = skip + batch.offset;

            credential = match self.tokens.ensure_valid(credential).await {
                Ok(valid) => valid,
                Err(source) => {
                    error!(
                        batch = batch.index + 1,
                        "Credential could not be validated: {}", source
                    );
                    return Err(RunAborted {
                        completed: first,
                        total,
                        next_position: first + 1,
                        next_job: batch.jobs[0].clone(),
                        source,
                    });
                }
            };

            info!(
                "Batch {}/{}: dispatching {} jobs",
                batch.index + 1,
                batches,
                batch.len()
            );

            let tasks: Vec<_> = batch
                .jobs
                .iter()
                .enumerate()
                .map(|(j, job)| {
                    let position = first + j + 1;
                    let job = job.clone();
                    let handler = Arc::clone(&self.handler);
                    let credential = credential.clone();
                    info!("({}/{}): {} - Start", position, total, job);

                    tokio::spawn(async move {
                        let result =
                            handler.handle(&job, position, &credential).await;
                        if let Err(e) = &result {
                            warn!(
                                position,
                                job = %job,
                                forbidden = e.is_forbidden(),
                                "Job failed: {}",
                                e
                            );
                        }
                        info!("({}/{}): {} - Complete", position, total, job);
                        (position, job, result)
                    })
                })
                .collect();

            let results = join_all(tasks).await;

            for (j, joined) in results.into_iter().enumerate() {
                match joined {
                    Ok((position, job, result)) => {
                        summary.record(position, job, result)
                    }
                    Err(e) => {
                        // Panicked task: count it against its job.
                        let position = first + j + 1;
                        error!(position, "Job task did not complete: {}", e);
                        summary.attempted += 1;
                        summary.failed += 1;
                    }
                }
            }

            summary.batches += 1;
            info!(
                "({}/{}) Jobs have completed",
                first + batch.len(),
                total
            );
        }

        info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "All jobs execution complete"
        );
        Ok(summary)
    }
}
