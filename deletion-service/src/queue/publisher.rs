//! Handle for enqueueing deletion jobs.
//!
//! The publisher is cheap to clone and is shared by every request handler.
//! Enqueueing never waits on the worker.

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

use super::types::DeletionJob;

/// The worker has shut down and no longer accepts jobs.
#[derive(Debug, Error)]
#[error("deletion queue is closed")]
pub struct QueueClosed(pub DeletionJob);

/// Sending side of the in-process deletion queue.
#[derive(Clone)]
pub struct DeletionQueue {
    sender: mpsc::UnboundedSender<DeletionJob>,
}

impl DeletionQueue {
    /// Create a queue, returning the publisher and the receiver for the worker.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DeletionJob>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Enqueue a job without waiting for it to run.
    pub fn publish(&self, job: DeletionJob) -> Result<(), QueueClosed> {
        let confirmation_code = job.confirmation_code.clone();
        self.sender.send(job).map_err(|e| QueueClosed(e.0))?;

        info!(confirmation_code = %confirmation_code, "deletion_job_enqueued");
        Ok(())
    }
}
