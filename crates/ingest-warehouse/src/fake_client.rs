//! In-memory `WarehouseClient` double for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::client::{JobStatus, WarehouseClient};

#[derive(Debug, Clone)]
pub struct SubmittedJob {
    pub job_id: String,
    pub kind: SubmittedKind,
}

#[derive(Debug, Clone)]
pub enum SubmittedKind {
    Load { config: Value },
    Query { sql: String, external_table_definition: Value },
}

#[derive(Default)]
pub struct FakeWarehouseClient {
    submitted: Mutex<Vec<SubmittedJob>>,
    statuses: Mutex<HashMap<String, JobStatus>>,
}

impl FakeWarehouseClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, job_id: &str, status: JobStatus) {
        self.statuses.lock().insert(job_id.to_string(), status);
    }

    pub fn submitted_jobs(&self) -> Vec<SubmittedJob> {
        self.submitted.lock().clone()
    }
}

#[async_trait]
impl WarehouseClient for FakeWarehouseClient {
    async fn submit_load(&self, job_id: &str, config: Value) -> anyhow::Result<()> {
        self.submitted.lock().push(SubmittedJob {
            job_id: job_id.to_string(),
            kind: SubmittedKind::Load { config },
        });
        // The fake simulates instant completion unless a test pre-arranged a
        // different outcome via `set_status`.
        self.statuses.lock().entry(job_id.to_string()).or_insert(JobStatus::Done);
        Ok(())
    }

    async fn submit_query(
        &self,
        job_id: &str,
        sql: &str,
        external_table_definition: Value,
    ) -> anyhow::Result<()> {
        self.submitted.lock().push(SubmittedJob {
            job_id: job_id.to_string(),
            kind: SubmittedKind::Query {
                sql: sql.to_string(),
                external_table_definition,
            },
        });
        self.statuses.lock().entry(job_id.to_string()).or_insert(JobStatus::Done);
        Ok(())
    }

    async fn poll_job(&self, job_id: &str) -> anyhow::Result<JobStatus> {
        Ok(self
            .statuses
            .lock()
            .get(job_id)
            .cloned()
            .unwrap_or(JobStatus::Running))
    }
}
