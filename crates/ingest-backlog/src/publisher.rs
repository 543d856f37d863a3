//! Publisher: enqueues a backlog item, ensures a subscriber is scheduled,
//! and runs the publisher-side half of the race-safety monitor.

use std::time::Duration;

use ingest_core::IngestError;
use ingest_store::{ConditionalOutcome, ObjectStoreGateway};
use tracing::{debug, info};

use crate::item::backlog_key;

pub const BACKFILL_FILENAME: &str = "_BACKFILL";

fn backfill_key(table_prefix: &str) -> String {
    format!("{table_prefix}/{BACKFILL_FILENAME}")
}

/// Attempts to schedule a subscriber. Returns `true` if this call is the one
/// that newly scheduled it, `false` if one was already scheduled or
/// scheduling was deferred.
///
/// If `start_backfill_filename` is configured, `_BACKFILL` is only written
/// once that sentinel exists at `table_prefix`; until then the backlog
/// accumulates and no subscriber starts.
pub async fn start_backfill_subscriber_if_not_running(
    gateway: &dyn ObjectStoreGateway,
    bucket: &str,
    table_prefix: &str,
    start_backfill_filename: Option<&str>,
) -> Result<bool, IngestError> {
    if let Some(start_filename) = start_backfill_filename {
        let start_key = format!("{table_prefix}/{start_filename}");
        let exists = gateway
            .stat_object(bucket, &start_key)
            .await
            .map_err(IngestError::Other)?
            .is_some();
        if !exists {
            debug!(table_prefix, start_filename, "deferring backfill until start sentinel is dropped");
            return Ok(false);
        }
    }

    match gateway
        .create_object_if_absent(bucket, &backfill_key(table_prefix), Vec::new())
        .await
        .map_err(IngestError::Other)?
    {
        ConditionalOutcome::Ok => {
            info!(table_prefix, "scheduled fresh backlog subscriber");
            Ok(true)
        }
        ConditionalOutcome::PreconditionFailed => {
            debug!(table_prefix, "subscriber already scheduled");
            Ok(false)
        }
    }
}

/// Enqueues `relative_success_path` onto the table's backlog and ensures a
/// subscriber is running, then runs the race-safety monitor before
/// returning control to the caller.
pub async fn publish(
    gateway: &dyn ObjectStoreGateway,
    bucket: &str,
    table_prefix: &str,
    relative_success_path: &str,
    start_backfill_filename: Option<&str>,
    ensure_subscriber_secs: u64,
) -> Result<(), IngestError> {
    let key = backlog_key(table_prefix, relative_success_path);
    gateway
        .create_object_if_absent(bucket, &key, Vec::new())
        .await
        .map_err(IngestError::Other)?;

    start_backfill_subscriber_if_not_running(gateway, bucket, table_prefix, start_backfill_filename).await?;
    ensure_subscriber_running(gateway, bucket, table_prefix, start_backfill_filename, ensure_subscriber_secs).await
}

/// Guards against the enqueue/drain race: the subscriber may list an empty
/// backlog right before this publish's item landed, then delete `_BACKFILL`
/// and exit without ever seeing the new item. After enqueuing, wait for
/// `_BACKFILL` to (re)appear, re-triggering a subscriber on every miss.
async fn ensure_subscriber_running(
    gateway: &dyn ObjectStoreGateway,
    bucket: &str,
    table_prefix: &str,
    start_backfill_filename: Option<&str>,
    ensure_subscriber_secs: u64,
) -> Result<(), IngestError> {
    tokio::time::sleep(Duration::from_secs(ensure_subscriber_secs)).await;
    let key = backfill_key(table_prefix);
    let exists = gateway
        .stat_object(bucket, &key)
        .await
        .map_err(IngestError::Other)?
        .is_some();
    if !exists {
        start_backfill_subscriber_if_not_running(gateway, bucket, table_prefix, start_backfill_filename).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_store::OpenDalGateway;

    #[tokio::test]
    async fn first_start_attempt_returns_true() {
        let gw = OpenDalGateway::new_memory("b").unwrap();
        let started = start_backfill_subscriber_if_not_running(&gw, "b", "ds1/t1", None)
            .await
            .unwrap();
        assert!(started);
    }

    #[tokio::test]
    async fn second_start_attempt_returns_false() {
        let gw = OpenDalGateway::new_memory("b").unwrap();
        start_backfill_subscriber_if_not_running(&gw, "b", "ds1/t1", None)
            .await
            .unwrap();
        let started_again = start_backfill_subscriber_if_not_running(&gw, "b", "ds1/t1", None)
            .await
            .unwrap();
        assert!(!started_again);
    }

    #[tokio::test]
    async fn publish_creates_backlog_item_and_schedules_subscriber() {
        let gw = OpenDalGateway::new_memory("b").unwrap();
        publish(&gw, "b", "ds1/t1", "batch01/_SUCCESS", None, 0).await.unwrap();
        assert!(gw
            .stat_object("b", &backlog_key("ds1/t1", "batch01/_SUCCESS"))
            .await
            .unwrap()
            .is_some());
        assert!(gw.stat_object("b", &backfill_key("ds1/t1")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn start_sentinel_defers_backfill_until_dropped() {
        let gw = OpenDalGateway::new_memory("b").unwrap();
        let started = start_backfill_subscriber_if_not_running(&gw, "b", "ds1/t1", Some("_START"))
            .await
            .unwrap();
        assert!(!started);
        assert!(gw.stat_object("b", &backfill_key("ds1/t1")).await.unwrap().is_none());

        gw.create_object_if_absent("b", "ds1/t1/_START", Vec::new())
            .await
            .unwrap();
        let started = start_backfill_subscriber_if_not_running(&gw, "b", "ds1/t1", Some("_START"))
            .await
            .unwrap();
        assert!(started);
        assert!(gw.stat_object("b", &backfill_key("ds1/t1")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn publish_without_start_sentinel_leaves_backlog_accumulating() {
        let gw = OpenDalGateway::new_memory("b").unwrap();
        publish(&gw, "b", "ds1/t1", "batch01/_SUCCESS", Some("_START"), 0)
            .await
            .unwrap();
        assert!(gw
            .stat_object("b", &backlog_key("ds1/t1", "batch01/_SUCCESS"))
            .await
            .unwrap()
            .is_some());
        assert!(gw.stat_object("b", &backfill_key("ds1/t1")).await.unwrap().is_none());
    }
}
