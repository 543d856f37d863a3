//! Per-table serializing lock (`_bqlock`), held by the backlog subscriber.

use ingest_core::IngestError;
use ingest_store::{ConditionalOutcome, ObjectStoreGateway};

pub const LOCK_FILENAME: &str = "_bqlock";

pub fn lock_key(table_prefix: &str) -> String {
    format!("{table_prefix}/{LOCK_FILENAME}")
}

#[derive(Debug, Clone)]
pub enum LockState {
    /// No lock object present.
    Free,
    /// Lock held by a previous job dispatch, identified by `job_id` and the
    /// generation to present when reclaiming or releasing it.
    OwnedByJob { job_id: String, generation: String },
    /// Lock payload does not look like a job id issued by us — a human is
    /// holding it manually. Never overwrite.
    ManualHold,
}

/// Reads the current lock state for `table_prefix`.
pub async fn read_lock(
    gateway: &dyn ObjectStoreGateway,
    bucket: &str,
    table_prefix: &str,
    job_prefix: &str,
) -> Result<LockState, IngestError> {
    let key = lock_key(table_prefix);
    match gateway
        .stat_object(bucket, &key)
        .await
        .map_err(IngestError::Other)?
    {
        None => Ok(LockState::Free),
        Some(meta) => {
            let contents = gateway
                .get_object(bucket, &key)
                .await
                .map_err(IngestError::Other)?
                .unwrap_or_default();
            let payload = String::from_utf8_lossy(&contents).to_string();
            let generation = meta.generation.unwrap_or_default();
            if payload.starts_with(job_prefix) {
                Ok(LockState::OwnedByJob {
                    job_id: payload,
                    generation,
                })
            } else {
                Ok(LockState::ManualHold)
            }
        }
    }
}

/// Acquires the lock for the first job dispatch on an empty backlog.
pub async fn acquire(
    gateway: &dyn ObjectStoreGateway,
    bucket: &str,
    table_prefix: &str,
    job_id: &str,
) -> Result<(), IngestError> {
    let key = lock_key(table_prefix);
    match gateway
        .create_object_if_absent(bucket, &key, job_id.as_bytes().to_vec())
        .await
        .map_err(IngestError::Other)?
    {
        ConditionalOutcome::Ok => Ok(()),
        ConditionalOutcome::PreconditionFailed => Err(IngestError::BacklogConflict {
            table_prefix: table_prefix.to_string(),
        }),
    }
}

/// Reclaims the lock for the next dispatch, presenting the generation last
/// observed by [`read_lock`].
pub async fn reclaim(
    gateway: &dyn ObjectStoreGateway,
    bucket: &str,
    table_prefix: &str,
    expected_generation: &str,
    next_job_id: &str,
) -> Result<(), IngestError> {
    let key = lock_key(table_prefix);
    match gateway
        .replace_if_generation(bucket, &key, expected_generation, next_job_id.as_bytes().to_vec())
        .await
        .map_err(IngestError::Other)?
    {
        ConditionalOutcome::Ok => Ok(()),
        ConditionalOutcome::PreconditionFailed => Err(IngestError::BacklogConflict {
            table_prefix: table_prefix.to_string(),
        }),
    }
}

/// Releases the lock once the backlog has drained empty.
pub async fn release(
    gateway: &dyn ObjectStoreGateway,
    bucket: &str,
    table_prefix: &str,
    expected_generation: &str,
) -> Result<(), IngestError> {
    let key = lock_key(table_prefix);
    match gateway
        .delete_if_generation(bucket, &key, expected_generation)
        .await
        .map_err(IngestError::Other)?
    {
        ConditionalOutcome::Ok => Ok(()),
        ConditionalOutcome::PreconditionFailed => Err(IngestError::BacklogConflict {
            table_prefix: table_prefix.to_string(),
        }),
    }
}
