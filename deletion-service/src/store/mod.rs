//! Document store access.
//!
//! The service only needs key-value semantics over named collections:
//! fetch a document, replace a document, delete a document.
//!
//! ## Backends
//!
//! - [`MemoryStore`]: process-local map, used for local runs and tests
//! - [`FirestoreStore`]: Cloud Firestore over its REST API

pub mod auth;
pub mod firestore;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use auth::{ServiceAccountKey, ServiceAccountTokens, StaticToken, TokenProvider};
pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

/// A stored document: a JSON object.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Shared handle to a store backend.
pub type SharedStore = Arc<dyn DocumentStore>;

/// Failures talking to the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("store authentication failed: {0}")]
    Auth(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("invalid store configuration: {0}")]
    Config(String),
}

/// Key-value access to documents grouped in collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document, `None` if it does not exist.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Create or replace a document.
    async fn set(&self, collection: &str, id: &str, document: Document) -> Result<(), StoreError>;

    /// Delete a document. Deleting a missing document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}
