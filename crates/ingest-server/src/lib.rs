//! HTTP entry point standing in for the serverless host: decodes the
//! notification envelope delivered by Eventarc/Pub/Sub push and drives the
//! Coordinator.

pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use ingest_config::RuntimeConfig;
use ingest_core::PathParser;
use ingest_store::{ObjectStoreGateway, OpenDalGateway};
use ingest_warehouse::{RestWarehouseClient, WarehouseClient};
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn ObjectStoreGateway>,
    pub warehouse: Arc<dyn WarehouseClient>,
    pub config: Arc<RuntimeConfig>,
    pub path_parser: Arc<PathParser>,
    pub cloud_function_name: Arc<str>,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

fn init_gateway(config: &RuntimeConfig) -> anyhow::Result<OpenDalGateway> {
    let bucket = config
        .bucket
        .clone()
        .ok_or_else(|| anyhow::anyhow!("INGEST_BUCKET must be set"))?;
    let builder = opendal::services::Gcs::default().bucket(&bucket);
    let operator = opendal::Operator::new(builder)?.finish();
    Ok(OpenDalGateway::new_gcs(bucket, operator))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/notifications", post(handlers::handle_notification))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::ready_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run() -> anyhow::Result<()> {
    init_tracing();

    let config = RuntimeConfig::load()?;
    let gateway = init_gateway(&config)?;
    let path_parser = PathParser::new(&config.destination_regex)?;
    let project = config
        .warehouse_project
        .clone()
        .ok_or_else(|| anyhow::anyhow!("INGEST_WAREHOUSE_PROJECT must be set"))?;
    let bearer_token = std::env::var("INGEST_WAREHOUSE_BEARER_TOKEN").unwrap_or_default();
    let warehouse = RestWarehouseClient::new("https://bigquery.googleapis.com/bigquery/v2", project, bearer_token);
    let cloud_function_name = std::env::var("K_SERVICE").unwrap_or_else(|_| "ingest-coordinator".to_string());

    let state = AppState {
        gateway: Arc::new(gateway),
        warehouse: Arc::new(warehouse),
        config: Arc::new(config),
        path_parser: Arc::new(path_parser),
        cloud_function_name: cloud_function_name.into(),
    };

    let addr: SocketAddr = std::env::var("INGEST_LISTEN_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "ingest-server listening");

    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use ingest_core::Destination;
    use ingest_warehouse::fake_client::FakeWarehouseClient;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState {
            gateway: Arc::new(OpenDalGateway::new_memory("b").unwrap()),
            warehouse: Arc::new(FakeWarehouseClient::new()),
            config: Arc::new(RuntimeConfig::default()),
            path_parser: Arc::new(PathParser::default_pattern()),
            cloud_function_name: "test-fn".into(),
        }
    }

    #[tokio::test]
    async fn health_check_returns_ok() {
        let app = build_router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn notification_for_unknown_object_is_bad_request() {
        let app = build_router(test_state());
        let body = r#"{"kind":"storage#object","bucket":"b","name":"not-a-valid-path"}"#;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/notifications")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn pubsub_and_object_resource_envelopes_agree_on_destination() {
        let parser = PathParser::default_pattern();
        let pubsub: ingest_core::NotificationEnvelope =
            serde_json::from_str(r#"{"attributes":{"bucketId":"b","objectId":"ds1/t1/_SUCCESS"}}"#).unwrap();
        let resource: ingest_core::NotificationEnvelope =
            serde_json::from_str(r#"{"kind":"storage#object","bucket":"b","name":"ds1/t1/_SUCCESS"}"#).unwrap();
        let a: Destination = parser.parse(&pubsub.into_notification().object).unwrap();
        let b: Destination = parser.parse(&resource.into_notification().object).unwrap();
        assert_eq!(a, b);
    }
}
