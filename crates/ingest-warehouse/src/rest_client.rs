//! `WarehouseClient` backed by a REST jobs API, in the manner of the
//! teacher's Iceberg REST catalog client: a `reqwest::Client`, a base URL,
//! and one method per verb.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::client::{JobStatus, WarehouseClient};

pub struct RestWarehouseClient {
    http: reqwest::Client,
    base_url: String,
    project: String,
    bearer_token: String,
}

impl RestWarehouseClient {
    pub fn new(base_url: impl Into<String>, project: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            project: project.into(),
            bearer_token: bearer_token.into(),
        }
    }

    fn jobs_url(&self) -> String {
        format!("{}/projects/{}/jobs", self.base_url, self.project)
    }

    fn job_url(&self, job_id: &str) -> String {
        format!("{}/projects/{}/jobs/{job_id}", self.base_url, self.project)
    }
}

#[async_trait]
impl WarehouseClient for RestWarehouseClient {
    async fn submit_load(&self, job_id: &str, config: Value) -> anyhow::Result<()> {
        let body = json!({
            "jobReference": {"jobId": job_id, "projectId": self.project},
            "configuration": {"load": config},
        });
        let resp = self
            .http
            .post(self.jobs_url())
            .bearer_auth(&self.bearer_token)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("warehouse rejected load job {job_id}: {}", resp.status());
        }
        Ok(())
    }

    async fn submit_query(
        &self,
        job_id: &str,
        sql: &str,
        external_table_definition: Value,
    ) -> anyhow::Result<()> {
        let body = json!({
            "jobReference": {"jobId": job_id, "projectId": self.project},
            "configuration": {
                "query": {
                    "query": sql,
                    "useLegacySql": false,
                    "tableDefinitions": {"temp_ext": external_table_definition},
                }
            },
        });
        let resp = self
            .http
            .post(self.jobs_url())
            .bearer_auth(&self.bearer_token)
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("warehouse rejected query job {job_id}: {}", resp.status());
        }
        Ok(())
    }

    async fn poll_job(&self, job_id: &str) -> anyhow::Result<JobStatus> {
        let resp = self
            .http
            .get(self.job_url(job_id))
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            anyhow::bail!("job {job_id} not found");
        }
        let body: Value = resp.json().await?;
        let state = body["status"]["state"].as_str().unwrap_or("RUNNING");
        match state {
            "DONE" => {
                if let Some(err) = body["status"]["errorResult"].as_object() {
                    let message = err
                        .get("message")
                        .and_then(|m| m.as_str())
                        .unwrap_or("unknown warehouse error")
                        .to_string();
                    Ok(JobStatus::Failed { message })
                } else {
                    Ok(JobStatus::Done)
                }
            }
            _ => Ok(JobStatus::Running),
        }
    }
}
