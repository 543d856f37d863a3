//! HTTP handlers: notification ingestion plus liveness/readiness.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use ingest_core::NotificationEnvelope;
use ingest_coordinator::Coordinator;
use tracing::info;

use crate::error::AppError;
use crate::AppState;

pub async fn handle_notification(
    State(state): State<AppState>,
    Json(envelope): Json<NotificationEnvelope>,
) -> Result<StatusCode, AppError> {
    let notification = envelope.into_notification();
    info!(object = %notification.object, bucket = %notification.bucket, "received notification");

    let coordinator = Coordinator {
        gateway: state.gateway.as_ref(),
        warehouse: state.warehouse.as_ref(),
        config: &state.config,
        path_parser: &state.path_parser,
        cloud_function_name: &state.cloud_function_name,
    };

    match coordinator.handle(&notification).await {
        Ok(()) => Ok(StatusCode::OK),
        Err(e) if e.is_benign() => Ok(StatusCode::OK),
        Err(e) => Err(AppError(e)),
    }
}

pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

pub async fn ready_check(State(_state): State<AppState>) -> StatusCode {
    StatusCode::OK
}
