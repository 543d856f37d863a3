//! Chooses load-vs-external-query, builds job config, submits, and
//! fail-fast watches for quick job failures.

use std::time::Duration;

use ingest_batch::Batch;
use ingest_core::{Destination, IngestError};
use ingest_config::resolver::{base_external_config, base_load_config, resolve_json_config, resolve_wildcard_config};
use ingest_store::ObjectStoreGateway;
use serde_json::json;
use tracing::{info, warn};

use crate::client::{JobStatus, WarehouseClient};
use crate::job_id::create_job_id;

pub struct PlanContext<'a> {
    pub gateway: &'a dyn ObjectStoreGateway,
    pub warehouse: &'a dyn WarehouseClient,
    pub bucket: &'a str,
    pub success_marker_path: &'a str,
    pub destination: &'a Destination,
    pub job_prefix: &'a str,
    pub cloud_function_name: &'a str,
    pub wait_for_job_secs: u64,
    pub job_poll_interval_secs: u64,
}

/// Submits one job per batch for the load path, or a single query job for
/// the external-query path, then fail-fast watches every submitted job id.
pub async fn plan_and_submit(ctx: &PlanContext<'_>, batches: &[Batch]) -> Result<Vec<String>, IngestError> {
    let sql = resolve_wildcard_config(ctx.gateway, ctx.bucket, ctx.success_marker_path, ".sql").await?;

    let job_ids = match sql {
        None => submit_load_jobs(ctx, batches).await?,
        Some((_, sql_bytes)) => {
            let sql_template = String::from_utf8_lossy(&sql_bytes).to_string();
            vec![submit_external_query_job(ctx, batches, &sql_template).await?]
        }
    };

    for job_id in &job_ids {
        fail_fast_watch(ctx.warehouse, job_id, ctx.wait_for_job_secs, ctx.job_poll_interval_secs).await?;
    }

    Ok(job_ids)
}

async fn submit_load_jobs(ctx: &PlanContext<'_>, batches: &[Batch]) -> Result<Vec<String>, IngestError> {
    let base = base_load_config(ctx.cloud_function_name);
    let load_config = resolve_json_config(ctx.gateway, ctx.bucket, ctx.success_marker_path, "load.json", base).await?;

    let mut job_ids = Vec::with_capacity(batches.len());
    for batch in batches {
        let job_id = create_job_id(ctx.job_prefix, ctx.destination);
        let mut config = load_config.clone();
        config["sourceUris"] = json!(batch.uris_with_scheme(ctx.bucket));
        config["destinationTable"] = json!({
            "datasetId": ctx.destination.dataset,
            "tableId": ctx.destination.table,
        });
        info!(job_id = %job_id, uris = batch.source_uris.len(), "submitting load job");
        ctx.warehouse
            .submit_load(&job_id, config)
            .await
            .map_err(IngestError::Other)?;
        job_ids.push(job_id);
    }
    Ok(job_ids)
}

async fn submit_external_query_job(
    ctx: &PlanContext<'_>,
    batches: &[Batch],
    sql_template: &str,
) -> Result<String, IngestError> {
    let base = base_external_config();
    let mut external = resolve_json_config(ctx.gateway, ctx.bucket, ctx.success_marker_path, "external.json", base).await?;

    let all_uris: Vec<String> = batches
        .iter()
        .flat_map(|b| b.uris_with_scheme(ctx.bucket))
        .collect();
    external["sourceUris"] = json!(all_uris);

    let mut dest_table = ctx.destination.table.clone();
    if let Some(partition) = &ctx.destination.partition {
        dest_table.push('$');
        dest_table.push_str(partition);
    }
    let sql = sql_template
        .replace("{dest_dataset}", &ctx.destination.dataset)
        .replace("{dest_table}", &dest_table);

    let job_id = create_job_id(ctx.job_prefix, ctx.destination);
    info!(job_id = %job_id, uris = all_uris.len(), "submitting external query job");
    ctx.warehouse
        .submit_query(&job_id, &sql, external)
        .await
        .map_err(IngestError::Other)?;
    Ok(job_id)
}

/// Polls `job_id` for up to `wait_secs`; returns `Ok(())` if it either
/// completes successfully or is still running when the window closes.
/// Surfaces `JobFailure` only if a terminal failure is observed in-window.
pub async fn fail_fast_watch(
    warehouse: &dyn WarehouseClient,
    job_id: &str,
    wait_secs: u64,
    poll_interval_secs: u64,
) -> Result<(), IngestError> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(wait_secs);
    loop {
        let status = warehouse.poll_job(job_id).await.map_err(IngestError::Other)?;
        match status {
            JobStatus::Failed { message } => {
                warn!(job_id = %job_id, %message, "job failed during fail-fast watch");
                return Err(IngestError::JobFailure {
                    job_id: job_id.to_string(),
                    message,
                });
            }
            JobStatus::Done => return Ok(()),
            JobStatus::Running => {
                if tokio::time::Instant::now() >= deadline {
                    return Ok(());
                }
                tokio::time::sleep(Duration::from_secs(poll_interval_secs)).await;
            }
        }
    }
}
