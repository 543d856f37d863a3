//! Idempotent claim objects make re-handling the same marker a no-op.

use ingest_core::IngestError;
use ingest_store::{ConditionalOutcome, ObjectStoreGateway};

/// Builds the claim key for a marker object given its parent prefix,
/// basename, and creation timestamp (unix seconds).
pub fn claim_key(parent: &str, basename: &str, time_created: i64) -> String {
    if parent.is_empty() {
        format!("_claimed_{basename}_created_at_{time_created}")
    } else {
        format!("{parent}/_claimed_{basename}_created_at_{time_created}")
    }
}

/// Creates the claim object for `marker_key`. Returns `Ok(())` on first
/// claim; a repeat call (same marker, same creation time) returns
/// `IngestError::DuplicateNotification`.
pub async fn claim_once(
    gateway: &dyn ObjectStoreGateway,
    bucket: &str,
    parent: &str,
    basename: &str,
    time_created: i64,
) -> Result<(), IngestError> {
    let key = claim_key(parent, basename, time_created);
    match gateway
        .create_object_if_absent(bucket, &key, Vec::new())
        .await
        .map_err(IngestError::Other)?
    {
        ConditionalOutcome::Ok => Ok(()),
        ConditionalOutcome::PreconditionFailed => Err(IngestError::DuplicateNotification {
            object: format!("{parent}/{basename}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_store::OpenDalGateway;

    #[test]
    fn claim_key_format() {
        assert_eq!(
            claim_key("ds1/t1", "_SUCCESS", 1700000000),
            "ds1/t1/_claimed__SUCCESS_created_at_1700000000"
        );
    }

    #[tokio::test]
    async fn second_claim_is_duplicate() {
        let gw = OpenDalGateway::new_memory("b").unwrap();
        claim_once(&gw, "b", "ds1/t1", "_SUCCESS", 1700000000)
            .await
            .unwrap();
        let err = claim_once(&gw, "b", "ds1/t1", "_SUCCESS", 1700000000)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::DuplicateNotification { .. }));
    }

    #[tokio::test]
    async fn reupload_with_new_timestamp_is_a_fresh_claim() {
        let gw = OpenDalGateway::new_memory("b").unwrap();
        claim_once(&gw, "b", "ds1/t1", "_SUCCESS", 1700000000)
            .await
            .unwrap();
        claim_once(&gw, "b", "ds1/t1", "_SUCCESS", 1700000999)
            .await
            .unwrap();
    }
}
