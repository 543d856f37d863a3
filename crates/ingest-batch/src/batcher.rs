//! Greedy-fill batching of source URIs under a success marker's prefix.

use ingest_core::IngestError;
use ingest_store::ObjectStoreGateway;

/// Hard cap on URIs per load job; not operator-tunable.
pub const MAX_SOURCE_URIS_PER_LOAD: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub source_uris: Vec<String>,
}

impl Batch {
    pub fn uris_with_scheme(&self, bucket: &str) -> Vec<String> {
        self.source_uris
            .iter()
            .map(|key| format!("gs://{bucket}/{key}"))
            .collect()
    }
}

fn is_excluded(key: &str, marker_key: &str, prefix: &str) -> bool {
    if key == marker_key {
        return true;
    }
    if key == prefix || key == format!("{prefix}/") {
        return true;
    }
    let rel = key.strip_prefix(prefix).unwrap_or(key);
    let rel = rel.trim_start_matches('/');
    rel.starts_with("_config/") || rel == "_config"
}

/// Lists the siblings of `marker_key` under `prefix` and partitions them
/// into batches bounded by `max_batch_bytes` and [`MAX_SOURCE_URIS_PER_LOAD`].
///
/// Greedy fill: objects are added to the current batch in listing order
/// until adding the next one would exceed either bound, at which point the
/// current batch closes and a new one starts with that object.
pub async fn get_batches_for_prefix(
    gateway: &dyn ObjectStoreGateway,
    bucket: &str,
    prefix: &str,
    marker_key: &str,
    max_batch_bytes: u64,
) -> Result<Vec<Batch>, IngestError> {
    let listed = gateway
        .list_with_prefix(bucket, prefix)
        .await
        .map_err(IngestError::Other)?;

    let mut batches = Vec::new();
    let mut current = Vec::new();
    let mut current_bytes: u64 = 0;

    for object in listed {
        if object.size == 0 || is_excluded(&object.key, marker_key, prefix) {
            continue;
        }
        let would_exceed_bytes = current_bytes + object.size > max_batch_bytes;
        let would_exceed_count = current.len() + 1 > MAX_SOURCE_URIS_PER_LOAD;
        if !current.is_empty() && (would_exceed_bytes || would_exceed_count) {
            batches.push(Batch {
                source_uris: std::mem::take(&mut current),
            });
            current_bytes = 0;
        }
        current.push(object.key);
        current_bytes += object.size;
    }
    if !current.is_empty() {
        batches.push(Batch { source_uris: current });
    }

    if batches.is_empty() {
        return Err(IngestError::NoSourceFiles {
            prefix: prefix.to_string(),
        });
    }
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_store::OpenDalGateway;

    #[tokio::test]
    async fn single_batch_for_small_files() {
        let gw = OpenDalGateway::new_memory("b").unwrap();
        gw.create_object_if_absent("b", "ds1/t1/part-00000", vec![0u8; 100])
            .await
            .unwrap();
        gw.create_object_if_absent("b", "ds1/t1/part-00001", vec![0u8; 200])
            .await
            .unwrap();
        gw.create_object_if_absent("b", "ds1/t1/_SUCCESS", vec![])
            .await
            .unwrap();

        let batches = get_batches_for_prefix(&gw, "b", "ds1/t1", "ds1/t1/_SUCCESS", 15_000_000_000_000)
            .await
            .unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(
            batches[0].source_uris,
            vec!["ds1/t1/part-00000".to_string(), "ds1/t1/part-00001".to_string()]
        );
    }

    #[tokio::test]
    async fn excludes_config_marker_and_zero_byte() {
        let gw = OpenDalGateway::new_memory("b").unwrap();
        gw.create_object_if_absent("b", "ds1/t1/part-00000", vec![0u8; 10])
            .await
            .unwrap();
        gw.create_object_if_absent("b", "ds1/t1/_config/load.json", b"{}".to_vec())
            .await
            .unwrap();
        gw.create_object_if_absent("b", "ds1/t1/empty-marker", vec![])
            .await
            .unwrap();
        gw.create_object_if_absent("b", "ds1/t1/_SUCCESS", vec![])
            .await
            .unwrap();

        let batches = get_batches_for_prefix(&gw, "b", "ds1/t1", "ds1/t1/_SUCCESS", 15_000_000_000_000)
            .await
            .unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].source_uris, vec!["ds1/t1/part-00000".to_string()]);
    }

    #[tokio::test]
    async fn splits_when_byte_cap_exceeded() {
        let gw = OpenDalGateway::new_memory("b").unwrap();
        gw.create_object_if_absent("b", "ds1/t1/a", vec![0u8; 60])
            .await
            .unwrap();
        gw.create_object_if_absent("b", "ds1/t1/b", vec![0u8; 60])
            .await
            .unwrap();
        gw.create_object_if_absent("b", "ds1/t1/_SUCCESS", vec![])
            .await
            .unwrap();

        let batches = get_batches_for_prefix(&gw, "b", "ds1/t1", "ds1/t1/_SUCCESS", 100)
            .await
            .unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].source_uris, vec!["ds1/t1/a".to_string()]);
        assert_eq!(batches[1].source_uris, vec!["ds1/t1/b".to_string()]);
    }

    #[tokio::test]
    async fn no_source_files_is_an_error() {
        let gw = OpenDalGateway::new_memory("b").unwrap();
        gw.create_object_if_absent("b", "ds1/t1/_SUCCESS", vec![])
            .await
            .unwrap();
        let err = get_batches_for_prefix(&gw, "b", "ds1/t1", "ds1/t1/_SUCCESS", 1000)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::NoSourceFiles { .. }));
    }
}
