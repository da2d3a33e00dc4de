//! Facebook data deletion request callback service.
//!
//! Facebook calls this service when a user removes the app and asks for their
//! data to be deleted. The service verifies the signed request, answers with a
//! confirmation code and a status link, and deletes the user's record in the
//! background.
//!
//! ## Architecture
//!
//! ```text
//! Facebook → POST /fb-deletion-callback → DeletionQueue → worker → store
//! User     → GET  /deletion-status?code  → deletion_logs lookup
//! ```

pub mod config;
pub mod deletion;
pub mod queue;
pub mod store;
pub mod web;

// Re-export commonly used types
pub use config::{Config, StoreBackend};
pub use deletion::{DeletionDispatcher, DeletionOutcome, DeletionRecord, DeletionStatus};
pub use queue::{run_worker, DeletionJob, DeletionQueue};
pub use store::{DocumentStore, FirestoreStore, MemoryStore, SharedStore, StoreError};
pub use web::{router, sign_payload, verify_signed_request, AppState};
