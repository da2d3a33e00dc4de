//! Deletion outcomes and the audit record persisted per confirmation code.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{Document, StoreError};

/// Message recorded when the user had no stored data.
pub const NO_USER_DATA_MESSAGE: &str = "No user data found";

/// Message recorded when the user's data was removed.
pub const USER_DATA_DELETED_MESSAGE: &str = "User data deleted successfully";

/// What happened to a user's record, as data rather than as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserDeletion {
    Deleted,
    NotFound,
}

/// Summary of one deletion attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionOutcome {
    pub deleted: bool,
    pub message: String,
}

impl DeletionOutcome {
    pub fn deleted() -> Self {
        Self {
            deleted: true,
            message: USER_DATA_DELETED_MESSAGE.to_string(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            deleted: false,
            message: NO_USER_DATA_MESSAGE.to_string(),
        }
    }

    /// A store fault, degraded to a non-deleting outcome.
    pub fn failed(error: &StoreError) -> Self {
        Self {
            deleted: false,
            message: error.to_string(),
        }
    }
}

impl From<UserDeletion> for DeletionOutcome {
    fn from(deletion: UserDeletion) -> Self {
        match deletion {
            UserDeletion::Deleted => Self::deleted(),
            UserDeletion::NotFound => Self::not_found(),
        }
    }
}

/// Status shown on the deletion status page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionStatus {
    Completed,
    NotFound,
    Pending,
}

impl DeletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionStatus::Completed => "completed",
            DeletionStatus::NotFound => "not_found",
            DeletionStatus::Pending => "pending",
        }
    }
}

/// Audit record stored under the confirmation code.
///
/// Field names match the documents already in the `deletion_logs` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionRecord {
    pub user_id: String,
    pub status: DeletionStatus,
    pub message: String,
    /// ISO-8601 UTC timestamp
    pub timestamp: String,
}

impl DeletionRecord {
    /// Build the record for a finished deletion attempt.
    pub fn from_outcome(user_id: &str, outcome: &DeletionOutcome, at: DateTime<Utc>) -> Self {
        let status = if outcome.deleted {
            DeletionStatus::Completed
        } else {
            DeletionStatus::NotFound
        };

        Self {
            user_id: user_id.to_string(),
            status,
            message: outcome.message.clone(),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn to_document(&self) -> Result<Document, StoreError> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => Ok(map),
            Ok(other) => Err(StoreError::InvalidDocument(format!(
                "record serialized to non-object: {}",
                other
            ))),
            Err(e) => Err(StoreError::InvalidDocument(e.to_string())),
        }
    }

    pub fn from_document(document: Document) -> Result<Self, StoreError> {
        serde_json::from_value(serde_json::Value::Object(document))
            .map_err(|e| StoreError::InvalidDocument(e.to_string()))
    }
}
