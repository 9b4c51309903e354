//! HTTP resources for model listings, predictions, health and metrics

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use magpie_lib::{
    health::{ComponentStatus, HealthRegistry},
    ErrorEnvelope, ModelGroup, ModelSummary, PredictionError, PredictionMode,
    PredictionOrchestrator, PredictionRequest, PredictionResultSet, WindowParams,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info};

/// Shared application state
pub struct AppState {
    pub orchestrator: PredictionOrchestrator,
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(orchestrator: PredictionOrchestrator, health_registry: HealthRegistry) -> Self {
        Self {
            orchestrator,
            health_registry,
        }
    }
}

/// Request-level prediction failure, rendered as an `errors` envelope
pub struct ApiError(PredictionError);

impl From<PredictionError> for ApiError {
    fn from(err: PredictionError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            PredictionError::ModelNotFound { .. } => StatusCode::NOT_FOUND,
            PredictionError::InvalidWindowParameter { .. } => StatusCode::BAD_REQUEST,
        };
        (status, Json(ErrorEnvelope::from(&self.0))).into_response()
    }
}

/// Query of the traffic and current-topology endpoints. Keys other than the
/// named fields are window parameters.
#[derive(Debug, Deserialize)]
pub struct PredictionQuery {
    pub topology_id: String,
    pub cluster: String,
    pub environ: String,
    pub model: Option<String>,
    #[serde(flatten)]
    pub window: BTreeMap<String, String>,
}

impl PredictionQuery {
    fn into_request(self, mode: PredictionMode) -> PredictionRequest {
        let request = PredictionRequest::new(self.topology_id, self.cluster, self.environ)
            .with_mode(mode)
            .with_window(self.window.into_iter().collect());
        match self.model {
            Some(model) => request.with_model(model),
            None => request,
        }
    }
}

/// Query of the proposed-plan endpoint; the topology id is a path segment
#[derive(Debug, Deserialize)]
pub struct ProposedQuery {
    pub cluster: String,
    pub environ: String,
    pub model: Option<String>,
    #[serde(flatten)]
    pub window: BTreeMap<String, String>,
}

fn model_info(state: &AppState, group: ModelGroup) -> Json<Vec<ModelSummary>> {
    Json(state.orchestrator.registry().summaries(group))
}

async fn traffic_model_info(State(state): State<Arc<AppState>>) -> Json<Vec<ModelSummary>> {
    model_info(&state, ModelGroup::HERON_TRAFFIC)
}

async fn topology_model_info(State(state): State<Arc<AppState>>) -> Json<Vec<ModelSummary>> {
    model_info(&state, ModelGroup::HERON_TOPOLOGY)
}

async fn run(
    state: &AppState,
    group: ModelGroup,
    request: PredictionRequest,
) -> Result<Json<PredictionResultSet>, ApiError> {
    let result = state.orchestrator.predict(group, request).await?;
    Ok(Json(result))
}

async fn traffic_prediction(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PredictionQuery>,
) -> Result<Json<PredictionResultSet>, ApiError> {
    run(
        &state,
        ModelGroup::HERON_TRAFFIC,
        query.into_request(PredictionMode::Current),
    )
    .await
}

async fn current_topology_prediction(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PredictionQuery>,
) -> Result<Json<PredictionResultSet>, ApiError> {
    run(
        &state,
        ModelGroup::HERON_TOPOLOGY,
        query.into_request(PredictionMode::Current),
    )
    .await
}

async fn proposed_topology_prediction(
    State(state): State<Arc<AppState>>,
    Path(topology_id): Path<String>,
    Query(query): Query<ProposedQuery>,
) -> Result<Json<PredictionResultSet>, ApiError> {
    let window: WindowParams = query
        .window
        .into_iter()
        .filter(|(key, _)| key != "topology_id")
        .collect();
    let mut request = PredictionRequest::new(topology_id, query.cluster, query.environ)
        .with_mode(PredictionMode::Proposed)
        .with_window(window);
    request.model = query.model;

    run(&state, ModelGroup::HERON_TOPOLOGY, request).await
}

/// 200 while operational (including degraded), 503 when unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus text exposition
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/model/traffic/heron/model_info", get(traffic_model_info))
        .route("/model/topology/heron/model_info", get(topology_model_info))
        .route("/model/traffic/heron", get(traffic_prediction))
        .route("/model/topology/heron/current", get(current_topology_prediction))
        .route(
            "/model/topology/heron/proposed/:topology_id",
            get(proposed_topology_prediction),
        )
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve until `shutdown` resolves, then drain in-flight requests
pub async fn serve<F>(port: u16, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
