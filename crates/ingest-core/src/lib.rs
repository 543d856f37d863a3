//! Shared types, error model, and path parsing for the ingestion pipeline.

pub mod error;
pub mod path;
pub mod types;

pub use error::{IngestError, Result};
pub use path::PathParser;
pub use types::{ActionKind, Destination, Notification, NotificationEnvelope};
