//! Per-table `_config/` hierarchy resolution: nearest-wins deep merge over
//! ancestor directories of a success marker.

use ingest_core::IngestError;
use ingest_store::ObjectStoreGateway;
use serde_json::{json, Value};

use crate::merge::recursive_update;

pub const CONFIG_DIR: &str = "_config";
pub const ORDERME_SENTINEL: &str = "ORDERME";

/// Base defaults merged in first (farthest), before any `_config/load.json`
/// found walking up from the success marker.
pub fn base_load_config(cloud_function_name: &str) -> Value {
    json!({
        "sourceFormat": "CSV",
        "fieldDelimiter": ",",
        "writeDisposition": "WRITE_APPEND",
        "labels": {
            "component": "event-based-gcs-ingest",
            "cloud-function-name": cloud_function_name,
        }
    })
}

pub fn base_external_config() -> Value {
    json!({ "sourceFormat": "PARQUET" })
}

/// Ancestor directories of `path`, nearest first, down to the bucket root.
/// `ds1/t1/batch01/_SUCCESS` yields `["ds1/t1/batch01", "ds1/t1", "ds1", ""]`.
fn ancestors(path: &str) -> Vec<String> {
    let parent = match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => return vec![String::new()],
    };
    let mut out = Vec::new();
    let mut rest = parent;
    loop {
        out.push(rest.to_string());
        match rest.rfind('/') {
            Some(idx) => rest = &rest[..idx],
            None => {
                out.push(String::new());
                break;
            }
        }
    }
    out
}

fn config_path(ancestor: &str, name: &str) -> String {
    if ancestor.is_empty() {
        format!("{CONFIG_DIR}/{name}")
    } else {
        format!("{ancestor}/{CONFIG_DIR}/{name}")
    }
}

/// Walks ancestors of `success_marker_path` nearest-first, merging every
/// `_config/<name>` found onto `base` (farthest wins least).
pub async fn resolve_json_config(
    gateway: &dyn ObjectStoreGateway,
    bucket: &str,
    success_marker_path: &str,
    name: &str,
    base: Value,
) -> Result<Value, IngestError> {
    // Walk nearest-first, collect what we find, then fold farthest-to-nearest
    // onto `base` so a nearer config always wins a key conflict.
    let mut overlays = Vec::new();
    for ancestor in ancestors(success_marker_path) {
        let path = config_path(&ancestor, name);
        if let Some(bytes) = gateway
            .get_object(bucket, &path)
            .await
            .map_err(IngestError::Other)?
        {
            let overlay: Value = serde_json::from_slice(&bytes).map_err(|e| {
                IngestError::Other(anyhow::anyhow!("invalid JSON in {path}: {e}"))
            })?;
            overlays.push(overlay);
        }
    }
    let mut merged = base;
    for overlay in overlays.into_iter().rev() {
        recursive_update(&mut merged, &overlay);
    }
    Ok(merged)
}

/// Resolves the single wildcard-matched config object (e.g. `*.sql`) by
/// walking ancestors nearest-first and returning the first `_config/`
/// listing with exactly one match. More than one match under the same
/// `_config/` directory is `AmbiguousConfig`.
pub async fn resolve_wildcard_config(
    gateway: &dyn ObjectStoreGateway,
    bucket: &str,
    success_marker_path: &str,
    suffix: &str,
) -> Result<Option<(String, bytes::Bytes)>, IngestError> {
    for ancestor in ancestors(success_marker_path) {
        let prefix = if ancestor.is_empty() {
            format!("{CONFIG_DIR}/")
        } else {
            format!("{ancestor}/{CONFIG_DIR}/")
        };
        let listed = gateway
            .list_with_prefix(bucket, &prefix)
            .await
            .map_err(IngestError::Other)?;
        let matches: Vec<_> = listed
            .into_iter()
            .filter(|m| m.key.ends_with(suffix))
            .collect();
        if matches.len() > 1 {
            return Err(IngestError::AmbiguousConfig {
                prefix: prefix.clone(),
                names: matches.into_iter().map(|m| m.key).collect(),
            });
        }
        if let Some(m) = matches.into_iter().next() {
            let bytes = gateway
                .get_object(bucket, &m.key)
                .await
                .map_err(IngestError::Other)?
                .ok_or_else(|| {
                    IngestError::Other(anyhow::anyhow!("listed object {} vanished", m.key))
                })?;
            return Ok(Some((m.key, bytes)));
        }
    }
    Ok(None)
}

/// Whether any ancestor carries the `ORDERME` sentinel, enabling ordered
/// dispatch for the whole subtree beneath it.
pub async fn has_orderme_sentinel(
    gateway: &dyn ObjectStoreGateway,
    bucket: &str,
    success_marker_path: &str,
) -> Result<bool, IngestError> {
    for ancestor in ancestors(success_marker_path) {
        let path = config_path(&ancestor, ORDERME_SENTINEL);
        if gateway
            .get_object(bucket, &path)
            .await
            .map_err(IngestError::Other)?
            .is_some()
        {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest_store::OpenDalGateway;

    #[test]
    fn ancestors_walk_nearest_first() {
        let a = ancestors("ds1/t1/batch01/_SUCCESS");
        assert_eq!(
            a,
            vec![
                "ds1/t1/batch01".to_string(),
                "ds1/t1".to_string(),
                "ds1".to_string(),
                "".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn nearer_config_wins_over_farther() {
        let gw = OpenDalGateway::new_memory("b").unwrap();
        gw.create_object_if_absent(
            "b",
            "ds1/_config/load.json",
            br#"{"writeDisposition":"WRITE_TRUNCATE","fieldDelimiter":"|"}"#.to_vec(),
        )
        .await
        .unwrap();
        gw.create_object_if_absent(
            "b",
            "ds1/t1/_config/load.json",
            br#"{"writeDisposition":"WRITE_APPEND"}"#.to_vec(),
        )
        .await
        .unwrap();

        let resolved = resolve_json_config(
            &gw,
            "b",
            "ds1/t1/batch01/_SUCCESS",
            "load.json",
            base_load_config("fn1"),
        )
        .await
        .unwrap();

        assert_eq!(resolved["writeDisposition"], "WRITE_APPEND");
        assert_eq!(resolved["fieldDelimiter"], "|");
        assert_eq!(resolved["sourceFormat"], "CSV");
    }

    #[tokio::test]
    async fn ambiguous_sql_config_is_rejected() {
        let gw = OpenDalGateway::new_memory("b").unwrap();
        gw.create_object_if_absent("b", "ds1/t1/_config/a.sql", b"SELECT 1".to_vec())
            .await
            .unwrap();
        gw.create_object_if_absent("b", "ds1/t1/_config/b.sql", b"SELECT 2".to_vec())
            .await
            .unwrap();

        let err = resolve_wildcard_config(&gw, "b", "ds1/t1/batch01/_SUCCESS", ".sql")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::AmbiguousConfig { .. }));
    }

    #[tokio::test]
    async fn orderme_sentinel_detected_from_ancestor() {
        let gw = OpenDalGateway::new_memory("b").unwrap();
        gw.create_object_if_absent("b", "ds1/t1/_config/ORDERME", b"".to_vec())
            .await
            .unwrap();
        assert!(
            has_orderme_sentinel(&gw, "b", "ds1/t1/batch01/_SUCCESS")
                .await
                .unwrap()
        );
        assert!(!has_orderme_sentinel(&gw, "b", "ds2/t2/batch01/_SUCCESS")
            .await
            .unwrap());
    }
}
