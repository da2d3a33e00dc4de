//! Deletion queue message types.

use serde::{Deserialize, Serialize};

/// A verified deletion request waiting to be carried out.
///
/// The callback handler has already answered Facebook with `confirmation_code`
/// by the time the job is consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionJob {
    /// Key of the audit record to write
    pub confirmation_code: String,
    /// App-scoped Facebook user id
    pub user_id: String,
}

impl DeletionJob {
    pub fn new(confirmation_code: String, user_id: String) -> Self {
        Self {
            confirmation_code,
            user_id,
        }
    }
}
