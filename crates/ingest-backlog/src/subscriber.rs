//! Subscriber: the single per-table drain loop. Polls the held job to
//! completion, advances the backlog, and self-terminates before the host's
//! wall-clock cap, handing off via a fresh `_BACKFILL` write.

use std::time::Duration;

use ingest_batch::get_batches_for_prefix;
use ingest_core::{Destination, IngestError};
use ingest_lock::{self, LockState};
use ingest_store::ObjectStoreGateway;
use ingest_warehouse::{create_job_id, plan_and_submit, JobStatus, PlanContext, WarehouseClient};
use tracing::{error, info, warn};

use crate::item::{backlog_key_to_success_path, get_next_backlog_item, remove_oldest_backlog_item};
use crate::publisher::BACKFILL_FILENAME;

fn backfill_key(table_prefix: &str) -> String {
    format!("{table_prefix}/{BACKFILL_FILENAME}")
}

pub struct SubscriberConfig {
    pub job_prefix: String,
    pub cloud_function_name: String,
    pub wait_for_job_secs: u64,
    pub job_poll_interval_secs: u64,
    pub restart_buffer_secs: u64,
    pub ensure_subscriber_secs: u64,
}

/// Drains `table_prefix`'s backlog until empty or the restart deadline
/// (`function_timeout_secs` minus `restart_buffer_secs` from `started_at`)
/// is reached, at which point it hands off by re-creating `_BACKFILL`.
pub async fn run(
    gateway: &dyn ObjectStoreGateway,
    warehouse: &dyn WarehouseClient,
    bucket: &str,
    table_prefix: &str,
    destination_of: impl Fn(&str) -> Result<Destination, IngestError>,
    config: &SubscriberConfig,
    function_timeout_secs: u64,
) -> Result<(), IngestError> {
    let restart_deadline = tokio::time::Instant::now()
        + Duration::from_secs(function_timeout_secs.saturating_sub(config.restart_buffer_secs));

    let mut last_job_done = false;

    loop {
        if tokio::time::Instant::now() >= restart_deadline {
            warn!(table_prefix, "approaching host timeout, handing off to a fresh subscriber");
            gateway
                .create_object_if_absent(bucket, &backfill_key(table_prefix), Vec::new())
                .await
                .map_err(IngestError::Other)?;
            return Ok(());
        }

        let lock_state = ingest_lock::read_lock(gateway, bucket, table_prefix, &config.job_prefix).await?;

        match lock_state {
            LockState::Free => {}
            LockState::ManualHold => {
                info!(table_prefix, "lock manually held, waiting");
                tokio::time::sleep(Duration::from_secs(config.job_poll_interval_secs)).await;
                continue;
            }
            LockState::OwnedByJob { job_id, .. } => {
                match warehouse.poll_job(&job_id).await.map_err(IngestError::Other)? {
                    JobStatus::Done => last_job_done = true,
                    JobStatus::Failed { message } => {
                        error!(job_id = %job_id, %message, "job failed, aborting subscriber, lock left in place");
                        return Err(IngestError::JobFailure { job_id, message });
                    }
                    JobStatus::Running => {
                        tokio::time::sleep(Duration::from_secs(config.job_poll_interval_secs)).await;
                        continue;
                    }
                }
            }
        }

        if last_job_done {
            remove_oldest_backlog_item(gateway, bucket, table_prefix).await?;
            last_job_done = false;
        }

        match get_next_backlog_item(gateway, bucket, table_prefix).await? {
            None => {
                if try_exit_empty(gateway, bucket, table_prefix, config.ensure_subscriber_secs).await? {
                    return Ok(());
                }
                continue;
            }
            Some(item) => {
                let success_path = backlog_key_to_success_path(table_prefix, &item.key).ok_or_else(|| {
                    IngestError::BacklogInconsistent {
                        backlog_key: item.key.clone(),
                    }
                })?;
                if gateway
                    .stat_object(bucket, &success_path)
                    .await
                    .map_err(IngestError::Other)?
                    .is_none()
                {
                    return Err(IngestError::BacklogInconsistent {
                        backlog_key: item.key,
                    });
                }

                let destination = destination_of(&success_path)?;
                let job_id = create_job_id(&config.job_prefix, &destination);

                let lock_state = ingest_lock::read_lock(gateway, bucket, table_prefix, &config.job_prefix).await?;
                match lock_state {
                    LockState::Free => ingest_lock::acquire(gateway, bucket, table_prefix, &job_id).await?,
                    LockState::OwnedByJob { generation, .. } => {
                        ingest_lock::reclaim(gateway, bucket, table_prefix, &generation, &job_id).await?
                    }
                    LockState::ManualHold => {
                        tokio::time::sleep(Duration::from_secs(config.job_poll_interval_secs)).await;
                        continue;
                    }
                }

                let batch_prefix = success_path.rsplit_once('/').map(|(p, _)| p).unwrap_or("");
                let batches = get_batches_for_prefix(gateway, bucket, batch_prefix, &success_path, u64::MAX).await?;
                let ctx = PlanContext {
                    gateway,
                    warehouse,
                    bucket,
                    success_marker_path: &success_path,
                    destination: &destination,
                    job_prefix: &config.job_prefix,
                    cloud_function_name: &config.cloud_function_name,
                    wait_for_job_secs: config.wait_for_job_secs,
                    job_poll_interval_secs: config.job_poll_interval_secs,
                };
                plan_and_submit(&ctx, &batches).await?;
            }
        }
    }
}

/// Empty-backlog exit with the race-safety check: if more than
/// `ensure_subscriber_secs` elapsed between listing empty and deleting
/// `_BACKFILL`, re-list first in case a publisher slipped an item in.
/// Returns `true` if the subscriber should exit.
async fn try_exit_empty(
    gateway: &dyn ObjectStoreGateway,
    bucket: &str,
    table_prefix: &str,
    ensure_subscriber_secs: u64,
) -> Result<bool, IngestError> {
    let listed_at = tokio::time::Instant::now();
    let key = backfill_key(table_prefix);
    let generation = gateway
        .stat_object(bucket, &key)
        .await
        .map_err(IngestError::Other)?
        .and_then(|m| m.generation)
        .unwrap_or_default();

    if listed_at.elapsed() > Duration::from_secs(ensure_subscriber_secs) {
        if get_next_backlog_item(gateway, bucket, table_prefix).await?.is_some() {
            return Ok(false);
        }
    }

    gateway
        .delete_if_generation(bucket, &key, &generation)
        .await
        .map_err(IngestError::Other)?;

    if let Some(lock_meta) = gateway
        .stat_object(bucket, &format!("{table_prefix}/{}", ingest_lock::LOCK_FILENAME))
        .await
        .map_err(IngestError::Other)?
    {
        let generation = lock_meta.generation.unwrap_or_default();
        ingest_lock::release(gateway, bucket, table_prefix, &generation).await?;
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_store::OpenDalGateway;
    use ingest_warehouse::fake_client::FakeWarehouseClient;

    fn parse_dest(path: &str) -> Result<Destination, IngestError> {
        let parser = ingest_core::PathParser::default_pattern();
        parser.parse(path)
    }

    fn config() -> SubscriberConfig {
        SubscriberConfig {
            job_prefix: "gcf-ingest-".into(),
            cloud_function_name: "fn1".into(),
            wait_for_job_secs: 0,
            job_poll_interval_secs: 0,
            restart_buffer_secs: 0,
            ensure_subscriber_secs: 0,
        }
    }

    #[tokio::test]
    async fn drains_three_ordered_backlog_items() {
        let gw = OpenDalGateway::new_memory("b").unwrap();
        let warehouse = FakeWarehouseClient::new();

        for batch in ["batch01", "batch02", "batch03"] {
            gw.create_object_if_absent("b", &format!("ds1/t1/{batch}/part-0"), vec![0u8; 10])
                .await
                .unwrap();
            gw.create_object_if_absent("b", &format!("ds1/t1/{batch}/_SUCCESS"), vec![])
                .await
                .unwrap();
            crate::publisher::publish(&gw, "b", "ds1/t1", &format!("{batch}/_SUCCESS"), None, 0)
                .await
                .unwrap();
        }

        // Every submitted job completes instantly in this fake.
        let cfg = config();
        run(&gw, &warehouse, "b", "ds1/t1", parse_dest, &cfg, 3600)
            .await
            .unwrap();

        let submitted = warehouse.submitted_jobs();
        assert_eq!(submitted.len(), 3);
        assert!(gw
            .stat_object("b", &format!("ds1/t1/{}", ingest_lock::LOCK_FILENAME))
            .await
            .unwrap()
            .is_none());
        assert!(gw.stat_object("b", "ds1/t1/_BACKFILL").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn restart_handoff_recreates_backfill_sentinel() {
        let gw = OpenDalGateway::new_memory("b").unwrap();
        let warehouse = FakeWarehouseClient::new();

        gw.create_object_if_absent("b", "ds1/t1/batch01/part-0", vec![0u8; 10])
            .await
            .unwrap();
        gw.create_object_if_absent("b", "ds1/t1/batch01/_SUCCESS", vec![])
            .await
            .unwrap();
        crate::publisher::publish(&gw, "b", "ds1/t1", "batch01/_SUCCESS", None, 0)
            .await
            .unwrap();

        let cfg = config();
        // function_timeout_secs == restart_buffer_secs means the deadline has
        // already elapsed, forcing immediate handoff before any dispatch.
        run(&gw, &warehouse, "b", "ds1/t1", parse_dest, &cfg, 0).await.unwrap();

        assert!(gw.stat_object("b", "ds1/t1/_BACKFILL").await.unwrap().is_some());
        assert_eq!(warehouse.submitted_jobs().len(), 0);
    }

    #[tokio::test]
    async fn backlog_inconsistent_when_success_marker_missing() {
        let gw = OpenDalGateway::new_memory("b").unwrap();
        let warehouse = FakeWarehouseClient::new();
        // Backlog item enqueued, but its success marker was never created.
        gw.create_object_if_absent("b", "ds1/t1/_backlog/batch01/_SUCCESS", vec![])
            .await
            .unwrap();
        gw.create_object_if_absent("b", "ds1/t1/_BACKFILL", vec![])
            .await
            .unwrap();

        let cfg = config();
        let err = run(&gw, &warehouse, "b", "ds1/t1", parse_dest, &cfg, 3600)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::BacklogInconsistent { .. }));
    }
}
