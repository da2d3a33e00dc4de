//! User data deletion.
//!
//! ## Flow
//!
//! ```text
//! DeletionJob → DeletionDispatcher::process() → users/{id} deleted → deletion_logs/{code} written
//! ```

pub mod confirmation;
pub mod dispatcher;
pub mod types;

pub use confirmation::{generate_confirmation_code, status_url, STATUS_PATH};
pub use dispatcher::DeletionDispatcher;
pub use types::{DeletionOutcome, DeletionRecord, DeletionStatus, UserDeletion};
