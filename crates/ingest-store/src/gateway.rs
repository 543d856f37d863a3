//! The object-store capability surface the rest of the pipeline depends on.

use async_trait::async_trait;

/// Outcome of a conditional write or delete: either it applied, or someone
/// else's write/delete already won the race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalOutcome {
    Ok,
    PreconditionFailed,
}

/// Metadata the gateway can report about a listed or read object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    /// Unix seconds; `None` if the backend does not report creation time.
    pub time_created: Option<i64>,
    /// Opaque precondition token (ETag/generation). Never parsed, only
    /// compared for equality by the caller.
    pub generation: Option<String>,
}

/// Abstract object-store capability surface.
///
/// Every method is scoped to a single bucket, since every caller in this
/// pipeline already knows which bucket a notification names. Conditional
/// operations are the sole mutual-exclusion primitive the pipeline uses.
#[async_trait]
pub trait ObjectStoreGateway: Send + Sync {
    async fn get_object(&self, bucket: &str, key: &str) -> anyhow::Result<Option<bytes::Bytes>>;

    async fn stat_object(&self, bucket: &str, key: &str) -> anyhow::Result<Option<ObjectMeta>>;

    /// Creates `key` with `data` iff it does not already exist.
    async fn create_object_if_absent(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
    ) -> anyhow::Result<ConditionalOutcome>;

    /// Overwrites `key` iff its current generation equals `expected_generation`.
    async fn replace_if_generation(
        &self,
        bucket: &str,
        key: &str,
        expected_generation: &str,
        data: Vec<u8>,
    ) -> anyhow::Result<ConditionalOutcome>;

    /// Deletes `key` iff its current generation equals `expected_generation`.
    async fn delete_if_generation(
        &self,
        bucket: &str,
        key: &str,
        expected_generation: &str,
    ) -> anyhow::Result<ConditionalOutcome>;

    /// Lists objects with the given prefix, lexicographically ordered.
    ///
    /// Non-recursive: stops at the next `/`, returning directory entries
    /// rather than descending into them. Use this for batching, where the
    /// objects of interest sit flat under the listed prefix.
    async fn list_with_prefix(&self, bucket: &str, prefix: &str) -> anyhow::Result<Vec<ObjectMeta>>;

    /// Lists every object under the given prefix, descending into
    /// subdirectories, lexicographically ordered.
    ///
    /// Use this for the backlog scan, where items live at
    /// `_backlog/<relative-success-path>` and `relative-success-path` may
    /// itself contain slashes (batch subdirectories).
    async fn list_with_prefix_recursive(&self, bucket: &str, prefix: &str) -> anyhow::Result<Vec<ObjectMeta>>;
}
