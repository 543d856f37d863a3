//! Error kinds shared across the ingestion pipeline.

use thiserror::Error;

/// Every distinguishable failure mode a notification can end in.
///
/// Each variant carries enough context to log a useful event and to let the
/// HTTP boundary (`ingest-server`) pick a status code without re-inspecting
/// the failure.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("duplicate notification for {object}: claim already exists")]
    DuplicateNotification { object: String },

    #[error("unexpected trigger: {reason}")]
    UnexpectedTrigger { reason: String },

    #[error("object path did not match destination pattern: {object}")]
    BadDestination { object: String },

    #[error("ambiguous config under {prefix}: {names:?}")]
    AmbiguousConfig { prefix: String, names: Vec<String> },

    #[error("no source files found under {prefix}")]
    NoSourceFiles { prefix: String },

    #[error("warehouse job {job_id} failed: {message}")]
    JobFailure { job_id: String, message: String },

    #[error("backlog lock conflict on {table_prefix}")]
    BacklogConflict { table_prefix: String },

    #[error("backlog item {backlog_key} has no matching success marker")]
    BacklogInconsistent { backlog_key: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl IngestError {
    /// Whether this error kind is a benign no-op from the caller's point of
    /// view (the action already happened, nothing further to do).
    pub fn is_benign(&self) -> bool {
        matches!(self, IngestError::DuplicateNotification { .. })
    }

    /// Whether this error kind requires a human to intervene before the
    /// table can make further progress (lock held, backlog torn).
    pub fn needs_operator(&self) -> bool {
        matches!(
            self,
            IngestError::JobFailure { .. } | IngestError::BacklogInconsistent { .. }
        )
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            IngestError::DuplicateNotification { .. } => "duplicate_notification",
            IngestError::UnexpectedTrigger { .. } => "unexpected_trigger",
            IngestError::BadDestination { .. } => "bad_destination",
            IngestError::AmbiguousConfig { .. } => "ambiguous_config",
            IngestError::NoSourceFiles { .. } => "no_source_files",
            IngestError::JobFailure { .. } => "job_failure",
            IngestError::BacklogConflict { .. } => "backlog_conflict",
            IngestError::BacklogInconsistent { .. } => "backlog_inconsistent",
            IngestError::Other(_) => "other",
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
