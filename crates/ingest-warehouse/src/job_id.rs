//! Deterministic warehouse job identifiers.

use ingest_core::Destination;

/// `<job_prefix><dataset>-<table>-<partition|None>-<batch|None>-<uuid>`
///
/// `$` is not a legal BigQuery job-id character, so a leading one is
/// stripped before the partition is interpolated.
pub fn create_job_id(job_prefix: &str, destination: &Destination) -> String {
    let partition = destination
        .partition
        .as_deref()
        .map(|p| p.trim_start_matches('$'))
        .unwrap_or("None");
    let batch = destination.batch.as_deref().unwrap_or("None");
    let id = uuid::Uuid::new_v4();
    format!(
        "{job_prefix}{}-{}-{partition}-{batch}-{id}",
        destination.dataset, destination.table
    )
}
