//! Domain value types shared by every crate downstream of `ingest-core`.

use serde::{Deserialize, Serialize};

/// A `(bucket, object)` pair identifying the object that triggered an
/// invocation, plus whatever the gateway can tell us about its creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub bucket: String,
    pub object: String,
}

/// The action a trigger object's basename names. Anything else is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Success,
    Backfill,
    StartBackfill,
}

impl ActionKind {
    pub fn classify(basename: &str, success_filename: &str, start_backfill_filename: Option<&str>) -> Option<Self> {
        if basename == success_filename {
            Some(ActionKind::Success)
        } else if basename == "_BACKFILL" {
            Some(ActionKind::Backfill)
        } else if Some(basename) == start_backfill_filename {
            Some(ActionKind::StartBackfill)
        } else {
            None
        }
    }
}

/// `(dataset, table, partition, batch)` derived from an object path by the
/// path parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub dataset: String,
    pub table: String,
    pub partition: Option<String>,
    pub batch: Option<String>,
}

impl Destination {
    /// `dataset.table`, the warehouse-native table reference.
    pub fn table_ref(&self) -> String {
        format!("{}.{}", self.dataset, self.table)
    }
}

/// The notification envelope as delivered over HTTP, in either the
/// Pub/Sub-style attributes shape or the direct GCS object-resource shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NotificationEnvelope {
    PubSub {
        attributes: PubSubAttributes,
    },
    ObjectResource {
        #[serde(rename = "kind")]
        _kind: Option<String>,
        bucket: String,
        name: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct PubSubAttributes {
    #[serde(rename = "bucketId")]
    pub bucket_id: String,
    #[serde(rename = "objectId")]
    pub object_id: String,
}

impl NotificationEnvelope {
    pub fn into_notification(self) -> Notification {
        match self {
            NotificationEnvelope::PubSub { attributes } => Notification {
                bucket: attributes.bucket_id,
                object: attributes.object_id,
            },
            NotificationEnvelope::ObjectResource { bucket, name, .. } => {
                Notification { bucket, object: name }
            }
        }
    }
}
