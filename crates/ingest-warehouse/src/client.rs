//! Warehouse client abstraction, in the shape of the REST job-insert /
//! job-get surface BigQuery exposes: submit asynchronously, poll for
//! terminal state.

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Done,
    Failed { message: String },
}

/// Abstract async warehouse client. The production implementation is a thin
/// REST client over the jobs.insert / jobs.get API shape; a fake in-memory
/// implementation backs tests.
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Submits a load job; `config` is the warehouse-native load job body.
    async fn submit_load(&self, job_id: &str, config: Value) -> anyhow::Result<()>;

    /// Submits a query job against a temporary external table definition.
    async fn submit_query(
        &self,
        job_id: &str,
        sql: &str,
        external_table_definition: Value,
    ) -> anyhow::Result<()>;

    async fn poll_job(&self, job_id: &str) -> anyhow::Result<JobStatus>;
}
