//! `ObjectStoreGateway` backed by an `opendal::Operator`.
//!
//! One `Operator` is configured per bucket, the way the teacher's storage
//! runtime configures one operator per backend target.

use async_trait::async_trait;
use opendal::{ErrorKind, Operator};

use crate::gateway::{ConditionalOutcome, ObjectMeta, ObjectStoreGateway};
use crate::ttl_cache::TtlCache;

/// Wraps a single `opendal::Operator` scoped to one bucket.
pub struct OpenDalGateway {
    bucket: String,
    operator: Operator,
    read_cache: TtlCache<String, bytes::Bytes>,
}

impl OpenDalGateway {
    /// Builds a gateway over the GCS service for `bucket`.
    pub fn new_gcs(bucket: impl Into<String>, operator: Operator) -> Self {
        Self {
            bucket: bucket.into(),
            operator,
            read_cache: TtlCache::new(std::time::Duration::from_secs(1)),
        }
    }

    /// Builds a gateway over an in-memory backend, for tests.
    pub fn new_memory(bucket: impl Into<String>) -> anyhow::Result<Self> {
        let operator = Operator::new(opendal::services::Memory::default())?.finish();
        Ok(Self {
            bucket: bucket.into(),
            operator,
            read_cache: TtlCache::new(std::time::Duration::from_secs(1)),
        })
    }

    fn check_bucket(&self, bucket: &str) -> anyhow::Result<()> {
        if bucket != self.bucket {
            anyhow::bail!(
                "gateway scoped to bucket {}, got request for {bucket}",
                self.bucket
            );
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStoreGateway for OpenDalGateway {
    async fn get_object(&self, bucket: &str, key: &str) -> anyhow::Result<Option<bytes::Bytes>> {
        self.check_bucket(bucket)?;
        if let Some(cached) = self.read_cache.get(&key.to_string()) {
            return Ok(Some(cached));
        }
        match self.operator.read(key).await {
            Ok(buf) => {
                let bytes = buf.to_bytes();
                self.read_cache.insert(key.to_string(), bytes.clone());
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> anyhow::Result<Option<ObjectMeta>> {
        self.check_bucket(bucket)?;
        match self.operator.stat(key).await {
            Ok(meta) => Ok(Some(ObjectMeta {
                key: key.to_string(),
                size: meta.content_length(),
                time_created: meta
                    .last_modified()
                    .map(|t| t.timestamp()),
                generation: meta.etag().map(|s| s.to_string()),
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_object_if_absent(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
    ) -> anyhow::Result<ConditionalOutcome> {
        self.check_bucket(bucket)?;
        match self
            .operator
            .write_with(key, data)
            .if_not_exists(true)
            .await
        {
            Ok(_) => Ok(ConditionalOutcome::Ok),
            Err(e) if e.kind() == ErrorKind::ConditionNotMatch => {
                Ok(ConditionalOutcome::PreconditionFailed)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn replace_if_generation(
        &self,
        bucket: &str,
        key: &str,
        expected_generation: &str,
        data: Vec<u8>,
    ) -> anyhow::Result<ConditionalOutcome> {
        self.check_bucket(bucket)?;
        match self
            .operator
            .write_with(key, data)
            .if_match(expected_generation)
            .await
        {
            Ok(_) => Ok(ConditionalOutcome::Ok),
            Err(e) if e.kind() == ErrorKind::ConditionNotMatch => {
                Ok(ConditionalOutcome::PreconditionFailed)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_if_generation(
        &self,
        bucket: &str,
        key: &str,
        expected_generation: &str,
    ) -> anyhow::Result<ConditionalOutcome> {
        self.check_bucket(bucket)?;
        match self
            .operator
            .delete_with(key)
            .if_match(expected_generation)
            .await
        {
            Ok(_) => Ok(ConditionalOutcome::Ok),
            Err(e) if e.kind() == ErrorKind::ConditionNotMatch => {
                Ok(ConditionalOutcome::PreconditionFailed)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_with_prefix(&self, bucket: &str, prefix: &str) -> anyhow::Result<Vec<ObjectMeta>> {
        self.check_bucket(bucket)?;
        let entries = self.operator.list(prefix).await?;
        Ok(entries_to_meta(entries))
    }

    async fn list_with_prefix_recursive(&self, bucket: &str, prefix: &str) -> anyhow::Result<Vec<ObjectMeta>> {
        self.check_bucket(bucket)?;
        let entries = self.operator.list_with(prefix).recursive(true).await?;
        Ok(entries_to_meta(entries))
    }
}

fn entries_to_meta(entries: Vec<opendal::Entry>) -> Vec<ObjectMeta> {
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        let meta = entry.metadata();
        out.push(ObjectMeta {
            key: entry.path().to_string(),
            size: meta.content_length(),
            time_created: meta.last_modified().map(|t| t.timestamp()),
            generation: meta.etag().map(|s| s.to_string()),
        });
    }
    out.sort_by(|a, b| a.key.cmp(&b.key));
    out
}
