//! In-process queue for deletion work.
//!
//! This module provides:
//! - The job type handed from the callback handler to the worker
//! - A publisher that enqueues without waiting
//! - The background worker that runs the jobs
//!
//! ## Architecture
//!
//! ```text
//! Callback handler → DeletionQueue → worker → DeletionDispatcher → store
//! ```

pub mod consumer;
pub mod publisher;
pub mod types;

pub use consumer::run as run_worker;
pub use publisher::{DeletionQueue, QueueClosed};
pub use types::DeletionJob;
