//! Backlog item key conventions: enqueue order is lexicographic key order.

use ingest_core::IngestError;
use ingest_store::{ObjectMeta, ObjectStoreGateway};

pub const BACKLOG_DIR: &str = "_backlog";

pub fn backlog_key(table_prefix: &str, relative_success_path: &str) -> String {
    format!("{table_prefix}/{BACKLOG_DIR}/{relative_success_path}")
}

/// Maps a backlog item's key back to the success marker it represents.
pub fn backlog_key_to_success_path(table_prefix: &str, backlog_key: &str) -> Option<String> {
    let prefix = format!("{table_prefix}/{BACKLOG_DIR}/");
    backlog_key
        .strip_prefix(&prefix)
        .map(|rel| format!("{table_prefix}/{rel}"))
}

/// Lists backlog items under `table_prefix` and returns the lexicographically
/// first (oldest enqueued, assuming well-formed batch names).
pub async fn get_next_backlog_item(
    gateway: &dyn ObjectStoreGateway,
    bucket: &str,
    table_prefix: &str,
) -> Result<Option<ObjectMeta>, IngestError> {
    let prefix = format!("{table_prefix}/{BACKLOG_DIR}/");
    let mut listed = gateway
        .list_with_prefix_recursive(bucket, &prefix)
        .await
        .map_err(IngestError::Other)?;
    listed.retain(|m| !m.key.ends_with('/'));
    listed.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(listed.into_iter().next())
}

/// Removes the oldest backlog item unconditionally; the subscriber is the
/// sole deleter of backlog items, so no generation precondition is needed.
pub async fn remove_oldest_backlog_item(
    gateway: &dyn ObjectStoreGateway,
    bucket: &str,
    table_prefix: &str,
) -> Result<(), IngestError> {
    if let Some(item) = get_next_backlog_item(gateway, bucket, table_prefix).await? {
        let generation = gateway
            .stat_object(bucket, &item.key)
            .await
            .map_err(IngestError::Other)?
            .and_then(|m| m.generation)
            .unwrap_or_default();
        gateway
            .delete_if_generation(bucket, &item.key, &generation)
            .await
            .map_err(IngestError::Other)?;
    }
    Ok(())
}
