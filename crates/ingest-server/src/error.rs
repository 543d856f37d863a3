//! Maps `IngestError` onto HTTP responses the host's retry policy can act on.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ingest_core::IngestError;
use serde_json::json;
use tracing::{error, warn};

pub struct AppError(pub IngestError);

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.0.kind_name();
        let status = match &self.0 {
            IngestError::DuplicateNotification { .. } => {
                // Already handled: tell the host not to redeliver.
                StatusCode::OK
            }
            IngestError::UnexpectedTrigger { .. } | IngestError::BadDestination { .. } | IngestError::AmbiguousConfig { .. } => {
                warn!(kind, error = %self.0, "rejecting malformed notification");
                StatusCode::BAD_REQUEST
            }
            IngestError::NoSourceFiles { .. } => {
                warn!(kind, error = %self.0, "no source files for batch");
                StatusCode::BAD_REQUEST
            }
            IngestError::JobFailure { .. } | IngestError::BacklogConflict { .. } | IngestError::BacklogInconsistent { .. } => {
                error!(kind, error = %self.0, "ingestion failed, needs operator attention or retry");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            IngestError::Other(_) => {
                error!(kind, error = %self.0, "unclassified failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({"kind": kind, "error": self.0.to_string()}))).into_response()
    }
}
