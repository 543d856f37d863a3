//! The entry point: classifies a notification and dispatches it to the
//! unordered fast path or the ordered backlog path.

use ingest_backlog::{publish, run_subscriber, start_backfill_subscriber_if_not_running, SubscriberConfig};
use ingest_batch::get_batches_for_prefix;
use ingest_config::resolver::has_orderme_sentinel;
use ingest_config::RuntimeConfig;
use ingest_core::{ActionKind, Destination, IngestError, Notification, PathParser};
use ingest_lock::claim_once;
use ingest_store::ObjectStoreGateway;
use ingest_warehouse::{plan_and_submit, PlanContext, WarehouseClient};
use tracing::{debug, info};

pub struct Coordinator<'a> {
    pub gateway: &'a dyn ObjectStoreGateway,
    pub warehouse: &'a dyn WarehouseClient,
    pub config: &'a RuntimeConfig,
    pub path_parser: &'a PathParser,
    pub cloud_function_name: &'a str,
}

impl<'a> Coordinator<'a> {
    /// Handles one notification end to end. Benign outcomes (duplicates,
    /// no-ops) are reported as `Ok(())` to the caller — `IngestError`
    /// variants surfaced here already carry whatever classification the
    /// HTTP boundary needs for a status code.
    pub async fn handle(&self, notification: &Notification) -> Result<(), IngestError> {
        let basename = notification
            .object
            .rsplit_once('/')
            .map(|(_, b)| b)
            .unwrap_or(&notification.object);

        let action = ActionKind::classify(
            basename,
            &self.config.success_filename,
            self.config.start_backfill_filename.as_deref(),
        );
        let Some(action) = action else {
            debug!(object = %notification.object, "not an action marker, no-op");
            return Ok(());
        };

        if matches!(action, ActionKind::Success) && notification.object.contains("/_backlog/") {
            debug!(object = %notification.object, "internal backlog artifact, no-op");
            return Ok(());
        }

        let table_prefix = self.path_parser.table_prefix(&notification.object)?;
        let ordered = self.config.order_all_jobs
            || has_orderme_sentinel(self.gateway, &notification.bucket, &notification.object).await?;

        match (action, ordered) {
            (ActionKind::Success, false) => self.handle_unordered_success(notification).await,
            (ActionKind::Success, true) => self.handle_ordered_success(notification, table_prefix).await,
            (ActionKind::Backfill, _) => self.handle_backfill(notification, table_prefix).await,
            (ActionKind::StartBackfill, _) => {
                start_backfill_subscriber_if_not_running(
                    self.gateway,
                    &notification.bucket,
                    table_prefix,
                    self.config.start_backfill_filename.as_deref(),
                )
                .await?;
                Ok(())
            }
        }
    }

    async fn handle_unordered_success(&self, notification: &Notification) -> Result<(), IngestError> {
        let (parent, basename) = split_parent(&notification.object);
        let time_created = self
            .gateway
            .stat_object(&notification.bucket, &notification.object)
            .await
            .map_err(IngestError::Other)?
            .and_then(|m| m.time_created)
            .unwrap_or(0);
        claim_once(self.gateway, &notification.bucket, parent, basename, time_created).await?;

        let destination = self.path_parser.parse(&notification.object)?;
        info!(object = %notification.object, destination = %destination.table_ref(), "dispatching unordered job");
        self.dispatch(notification, &destination).await
    }

    async fn handle_ordered_success(&self, notification: &Notification, table_prefix: &str) -> Result<(), IngestError> {
        let relative = notification
            .object
            .strip_prefix(table_prefix)
            .map(|s| s.trim_start_matches('/').to_string())
            .unwrap_or_else(|| notification.object.clone());
        info!(object = %notification.object, table_prefix, "publishing to ordered backlog");
        publish(
            self.gateway,
            &notification.bucket,
            table_prefix,
            &relative,
            self.config.start_backfill_filename.as_deref(),
            self.config.ensure_subscriber_secs,
        )
        .await
    }

    async fn handle_backfill(&self, notification: &Notification, table_prefix: &str) -> Result<(), IngestError> {
        let (parent, basename) = split_parent(&notification.object);
        let time_created = self
            .gateway
            .stat_object(&notification.bucket, &notification.object)
            .await
            .map_err(IngestError::Other)?
            .and_then(|m| m.time_created)
            .unwrap_or(0);
        // A duplicate backfill trigger is benign: another invocation is (or
        // just finished) already draining this table.
        if let Err(e) = claim_once(self.gateway, &notification.bucket, parent, basename, time_created).await {
            if e.is_benign() {
                return Ok(());
            }
            return Err(e);
        }

        let subscriber_config = SubscriberConfig {
            job_prefix: self.config.job_prefix.clone(),
            cloud_function_name: self.cloud_function_name.to_string(),
            wait_for_job_secs: self.config.wait_for_job_secs,
            job_poll_interval_secs: self.config.job_poll_interval_secs,
            restart_buffer_secs: self.config.restart_buffer_secs,
            ensure_subscriber_secs: self.config.ensure_subscriber_secs,
        };
        let parser = self.path_parser;
        run_subscriber(
            self.gateway,
            self.warehouse,
            &notification.bucket,
            table_prefix,
            move |path| parser.parse(path),
            &subscriber_config,
            self.config.function_timeout_secs,
        )
        .await
    }

    async fn dispatch(&self, notification: &Notification, destination: &Destination) -> Result<(), IngestError> {
        let prefix = notification
            .object
            .rsplit_once('/')
            .map(|(p, _)| p)
            .unwrap_or("");
        let batches = get_batches_for_prefix(
            self.gateway,
            &notification.bucket,
            prefix,
            &notification.object,
            self.config.max_batch_bytes,
        )
        .await?;

        let ctx = PlanContext {
            gateway: self.gateway,
            warehouse: self.warehouse,
            bucket: &notification.bucket,
            success_marker_path: &notification.object,
            destination,
            job_prefix: &self.config.job_prefix,
            cloud_function_name: self.cloud_function_name,
            wait_for_job_secs: self.config.wait_for_job_secs,
            job_poll_interval_secs: self.config.job_poll_interval_secs,
        };
        plan_and_submit(&ctx, &batches).await?;
        Ok(())
    }
}

fn split_parent(object: &str) -> (&str, &str) {
    match object.rsplit_once('/') {
        Some((parent, basename)) => (parent, basename),
        None => ("", object),
    }
}
