//! HTTP API for health checks, Prometheus metrics and container event ingestion

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use relevancy_lib::{
    health::{ComponentStatus, HealthRegistry},
    models::Container,
    observability::AgentMetrics,
    relevancy::RelevancyManager,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: AgentMetrics,
    pub manager: RelevancyManager,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: AgentMetrics,
        manager: RelevancyManager,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            manager,
        }
    }
}

/// File opened inside a container
#[derive(Debug, Deserialize)]
pub struct FileAccessEvent {
    pub namespace: String,
    pub pod_name: String,
    pub container_name: String,
    pub path: String,
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state
        .health_registry
        .health(state.manager.watched_containers())
        .await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

fn bad_request(rejection: JsonRejection) -> StatusCode {
    debug!(error = %rejection, "Rejected event body");
    StatusCode::BAD_REQUEST
}

async fn container_started(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Container>, JsonRejection>,
) -> StatusCode {
    match body {
        Ok(Json(container)) => {
            state.manager.report_container_started(container);
            StatusCode::ACCEPTED
        }
        Err(rejection) => bad_request(rejection),
    }
}

async fn container_terminated(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Container>, JsonRejection>,
) -> StatusCode {
    match body {
        Ok(Json(container)) => {
            state.manager.report_container_terminated(&container).await;
            StatusCode::ACCEPTED
        }
        Err(rejection) => bad_request(rejection),
    }
}

async fn file_access(
    State(state): State<Arc<AppState>>,
    body: Result<Json<FileAccessEvent>, JsonRejection>,
) -> StatusCode {
    match body {
        Ok(Json(event)) => {
            state
                .manager
                .report_file_access(
                    &event.namespace,
                    &event.pod_name,
                    &event.container_name,
                    &event.path,
                )
                .await;
            StatusCode::ACCEPTED
        }
        Err(rejection) => bad_request(rejection),
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/v1/containers/started", post(container_started))
        .route("/v1/containers/terminated", post(container_terminated))
        .route("/v1/file-access", post(file_access))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
