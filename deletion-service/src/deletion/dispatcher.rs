//! User data deletion and audit logging.

use chrono::Utc;
use tracing::{error, info};

use super::types::{DeletionOutcome, DeletionRecord, UserDeletion};
use crate::store::{SharedStore, StoreError};

/// Deletes user records and writes the audit trail for each request.
#[derive(Clone)]
pub struct DeletionDispatcher {
    store: SharedStore,
    users_collection: String,
    logs_collection: String,
}

impl DeletionDispatcher {
    pub fn new(
        store: SharedStore,
        users_collection: impl Into<String>,
        logs_collection: impl Into<String>,
    ) -> Self {
        Self {
            store,
            users_collection: users_collection.into(),
            logs_collection: logs_collection.into(),
        }
    }

    /// Delete a user's record if it exists.
    ///
    /// A missing record is a normal outcome; only store faults are errors.
    pub async fn delete_user(&self, user_id: &str) -> Result<UserDeletion, StoreError> {
        if self
            .store
            .get(&self.users_collection, user_id)
            .await?
            .is_none()
        {
            return Ok(UserDeletion::NotFound);
        }

        self.store.delete(&self.users_collection, user_id).await?;
        Ok(UserDeletion::Deleted)
    }

    /// Delete a user's data, folding store faults into the outcome.
    pub async fn dispatch(&self, user_id: &str) -> DeletionOutcome {
        match self.delete_user(user_id).await {
            Ok(deletion) => {
                match deletion {
                    UserDeletion::Deleted => info!(user_id = %user_id, "user_data_deleted"),
                    UserDeletion::NotFound => info!(user_id = %user_id, "user_data_not_found"),
                }
                DeletionOutcome::from(deletion)
            }
            Err(e) => {
                error!(user_id = %user_id, error = %e, "user_data_delete_failed");
                DeletionOutcome::failed(&e)
            }
        }
    }

    /// Persist the audit record for a confirmation code.
    pub async fn record(
        &self,
        confirmation_code: &str,
        record: &DeletionRecord,
    ) -> Result<(), StoreError> {
        let document = record.to_document()?;
        self.store
            .set(&self.logs_collection, confirmation_code, document)
            .await
    }

    /// Look up the audit record for a confirmation code.
    pub async fn lookup(&self, confirmation_code: &str) -> Result<Option<DeletionRecord>, StoreError> {
        self.store
            .get(&self.logs_collection, confirmation_code)
            .await?
            .map(DeletionRecord::from_document)
            .transpose()
    }

    /// Run the deletion for one request and record its outcome.
    ///
    /// Never fails: store errors end up in the record or in the log.
    pub async fn process(&self, confirmation_code: &str, user_id: &str) -> DeletionRecord {
        let outcome = self.dispatch(user_id).await;
        let record = DeletionRecord::from_outcome(user_id, &outcome, Utc::now());

        match self.record(confirmation_code, &record).await {
            Ok(()) => info!(
                confirmation_code = %confirmation_code,
                user_id = %user_id,
                status = record.status.as_str(),
                "deletion_record_written"
            ),
            Err(e) => error!(
                confirmation_code = %confirmation_code,
                user_id = %user_id,
                error = %e,
                "deletion_record_write_failed"
            ),
        }

        record
    }
}
