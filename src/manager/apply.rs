//! Bounded worker pool running apply jobs.
//!
//! Workers drain a shared queue. The first failing job cancels the run: no
//! further jobs are taken from the queue, jobs already running finish on their
//! own and only the first error is reported.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::diff::{Operation, PackageDiff};
use crate::error::ApplyError;
use crate::package::Package;

/// One diff bound to the package instance that carries it out.
///
/// Every job owns a fresh instance, so nothing done here touches the live set.
pub(crate) struct Job {
    /// Position of the diff in the submitted list.
    pub index: usize,
    pub diff: PackageDiff,
    pub package: Box<dyn Package>,
}

impl Job {
    async fn execute(&mut self) -> Result<()> {
        match self.diff.operation {
            Operation::Add => self.package.setup().await,
            Operation::Switch => self.package.switch(&self.diff.description.version).await,
            Operation::Delete => self.package.destroy(),
        }
    }
}

/// Run `jobs` on at most `workers` tasks.
///
/// Returns the finished jobs sorted by submission index, or the first error.
#[tracing::instrument(skip(jobs), fields(count = jobs.len()))]
pub(crate) async fn run_jobs(jobs: Vec<Job>, workers: usize) -> Result<Vec<Job>> {
    let total = jobs.len();
    let queue = Arc::new(Mutex::new(VecDeque::from(jobs)));
    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<Result<Job, ApplyError>>();

    let mut tasks = JoinSet::new();
    for worker in 0..workers {
        let queue = Arc::clone(&queue);
        let cancel = cancel.clone();
        let tx = tx.clone();
        tasks.spawn(async move {
            loop {
                if cancel.is_cancelled() {
                    debug!("Worker {} stopped after cancellation", worker);
                    break;
                }
                let Some(mut job) = queue.lock().await.pop_front() else {
                    break;
                };
                debug!("Worker {} runs {}", worker, job.diff);
                match job.execute().await {
                    Ok(()) => {
                        let _ = tx.send(Ok(job));
                    }
                    Err(source) => {
                        cancel.cancel();
                        let _ = tx.send(Err(ApplyError {
                            operation: job.diff.operation.to_string(),
                            full_name: job.diff.full_name().to_string(),
                            source,
                        }));
                        break;
                    }
                }
            }
        });
    }
    drop(tx);

    while let Some(joined) = tasks.join_next().await {
        joined.context("Apply worker panicked")?;
    }

    let mut done = Vec::with_capacity(total);
    let mut first_error = None;
    while let Some(outcome) = rx.recv().await {
        match outcome {
            Ok(job) => done.push(job),
            Err(err) if first_error.is_none() => first_error = Some(err),
            Err(err) => warn!("Discarding later failure: {}", err),
        }
    }
    if let Some(err) = first_error {
        return Err(err.into());
    }

    done.sort_by_key(|job| job.index);
    Ok(done)
}
