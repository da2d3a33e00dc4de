//! Background worker consuming the deletion queue.
//!
//! Each job runs in its own task so a slow store call for one user never
//! holds up another. A semaphore caps how many run at once. When every
//! publisher is dropped the worker stops taking jobs and waits for the
//! in-flight ones before returning.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info};

use super::types::DeletionJob;
use crate::deletion::{DeletionDispatcher, DeletionOutcome, DeletionRecord};

/// Run the worker until the queue is closed and drained.
pub async fn run(
    mut receiver: mpsc::UnboundedReceiver<DeletionJob>,
    dispatcher: DeletionDispatcher,
    concurrency: usize,
) {
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    info!(concurrency = concurrency, "deletion_worker_started");

    loop {
        tokio::select! {
            job = receiver.recv() => {
                let Some(job) = job else {
                    info!("deletion_queue_closed");
                    break;
                };

                info!(
                    confirmation_code = %job.confirmation_code,
                    user_id = %job.user_id,
                    "deletion_job_received"
                );

                let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                    error!("deletion_worker_semaphore_closed");
                    break;
                };

                let dispatcher = dispatcher.clone();
                tasks.spawn(async move {
                    let _permit = permit;
                    run_job(&dispatcher, job).await;
                });
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                log_join_error(joined);
            }
        }
    }

    info!(in_flight = tasks.len(), "deletion_worker_draining");

    while let Some(joined) = tasks.join_next().await {
        log_join_error(joined);
    }

    info!("deletion_worker_shutdown_complete");
}

/// Process one job, turning a panic into a recorded failure.
async fn run_job(dispatcher: &DeletionDispatcher, job: DeletionJob) {
    let result = AssertUnwindSafe(dispatcher.process(&job.confirmation_code, &job.user_id))
        .catch_unwind()
        .await;

    match result {
        Ok(record) => info!(
            confirmation_code = %job.confirmation_code,
            status = record.status.as_str(),
            "deletion_job_completed"
        ),
        Err(panic) => {
            let reason = panic_message(panic.as_ref());
            error!(
                confirmation_code = %job.confirmation_code,
                user_id = %job.user_id,
                reason = %reason,
                "deletion_job_panicked"
            );

            let outcome = DeletionOutcome {
                deleted: false,
                message: format!("Deletion failed: {}", reason),
            };
            let record = DeletionRecord::from_outcome(&job.user_id, &outcome, Utc::now());
            if let Err(e) = dispatcher.record(&job.confirmation_code, &record).await {
                error!(
                    confirmation_code = %job.confirmation_code,
                    error = %e,
                    "deletion_record_write_failed"
                );
            }
        }
    }
}

fn log_join_error(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "deletion_task_join_failed");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
