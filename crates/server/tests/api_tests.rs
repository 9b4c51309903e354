//! Integration tests for the model, health and metrics endpoints

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use magpie_lib::{
    clients::{services, MetricSample, TimelineQuery},
    config::{GroupConfig, ModelSettings, ModelsConfig, OrchestratorConfig},
    health::{components, HealthRegistry},
    ClientError, GraphClient, MetricsClient, Model, ModelCatalog, ModelDefinition, ModelError,
    ModelGroup, ModelRegistry, PredictionContext, PredictionOrchestrator, SharedClients,
    TopologyRef,
};
use magpie_server::{create_router, AppState};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower::ServiceExt;

struct StaticGraph;

#[async_trait]
impl GraphClient for StaticGraph {
    async fn component_parallelism(
        &self,
        _topology: &TopologyRef,
    ) -> Result<BTreeMap<String, u32>, ClientError> {
        Ok(BTreeMap::from([("sentence".to_string(), 2)]))
    }

    async fn spouts(&self, _topology: &TopologyRef) -> Result<Vec<String>, ClientError> {
        Ok(vec!["sentence".to_string()])
    }
}

struct UnavailableMetrics;

#[async_trait]
impl MetricsClient for UnavailableMetrics {
    async fn timeline(&self, _query: &TimelineQuery<'_>) -> Result<Vec<MetricSample>, ClientError> {
        Err(ClientError::Status {
            service: "metrics",
            status: 503,
            body: "tracker down".to_string(),
        })
    }
}

/// Echoes the request back
struct LinearModel;

#[async_trait]
impl Model for LinearModel {
    async fn predict(&self, ctx: &PredictionContext) -> Result<Value, ModelError> {
        Ok(json!({
            "topology": ctx.request.topology.topology_id,
            "cluster": ctx.request.topology.cluster,
            "mode": ctx.request.mode,
            "window": ctx.request.window,
        }))
    }
}

impl ModelDefinition for LinearModel {
    const NAME: &'static str = "linear";
    const DESCRIPTION: &'static str = "Echo model";
    const GROUP: ModelGroup = ModelGroup::HERON_TRAFFIC;

    fn build(_settings: &ModelSettings) -> anyhow::Result<Self> {
        Ok(Self)
    }
}

struct BrokenModel;

#[async_trait]
impl Model for BrokenModel {
    async fn predict(&self, _ctx: &PredictionContext) -> Result<Value, ModelError> {
        Err(ModelError::InsufficientData("no emit counts".to_string()))
    }
}

impl ModelDefinition for BrokenModel {
    const NAME: &'static str = "broken";
    const DESCRIPTION: &'static str = "Always fails";
    const GROUP: ModelGroup = ModelGroup::HERON_TRAFFIC;

    fn build(_settings: &ModelSettings) -> anyhow::Result<Self> {
        Ok(Self)
    }
}

/// Topology model reading both clients
struct PlanModel;

#[async_trait]
impl Model for PlanModel {
    async fn predict(&self, ctx: &PredictionContext) -> Result<Value, ModelError> {
        let parallelism = ctx.graph().component_parallelism(&ctx.request.topology).await?;
        Ok(json!({
            "topology": ctx.request.topology.topology_id,
            "mode": ctx.request.mode,
            "parallelism": parallelism,
            "window": ctx.request.window,
        }))
    }
}

impl ModelDefinition for PlanModel {
    const NAME: &'static str = "plan";
    const DESCRIPTION: &'static str = "Reports the packing plan";
    const GROUP: ModelGroup = ModelGroup::HERON_TOPOLOGY;

    fn build(_settings: &ModelSettings) -> anyhow::Result<Self> {
        Ok(Self)
    }
}

/// Topology model failing on the metrics client
struct TrackerModel;

#[async_trait]
impl Model for TrackerModel {
    async fn predict(&self, ctx: &PredictionContext) -> Result<Value, ModelError> {
        let topology = &ctx.request.topology;
        let now = chrono::Utc::now();
        let query = TimelineQuery {
            topology,
            component: "sentence",
            metric: "__emit-count/default",
            start: now,
            end: now,
        };
        let samples = ctx.metrics().timeline(&query).await?;
        Ok(json!({ "samples": samples.len() }))
    }
}

impl ModelDefinition for TrackerModel {
    const NAME: &'static str = "tracker";
    const DESCRIPTION: &'static str = "Reads the metrics client";
    const GROUP: ModelGroup = ModelGroup::HERON_TOPOLOGY;

    fn build(_settings: &ModelSettings) -> anyhow::Result<Self> {
        Ok(Self)
    }
}

fn catalog() -> ModelCatalog {
    let mut catalog = ModelCatalog::new();
    catalog
        .register::<LinearModel>("it.linear")
        .and_then(|c| c.register::<BrokenModel>("it.broken"))
        .and_then(|c| c.register::<PlanModel>("it.plan"))
        .and_then(|c| c.register::<TrackerModel>("it.tracker"))
        .unwrap();
    catalog
}

fn group(models: &[&str]) -> GroupConfig {
    GroupConfig {
        models: models.iter().map(|m| m.to_string()).collect(),
        config: BTreeMap::new(),
    }
}

async fn setup_test_app(traffic: &[&str], topology: &[&str]) -> (Router, HealthRegistry) {
    let mut config = ModelsConfig::default();
    config.insert(ModelGroup::HERON_TRAFFIC, group(traffic));
    config.insert(ModelGroup::HERON_TOPOLOGY, group(topology));
    let registry = Arc::new(ModelRegistry::load(&config, &catalog()).unwrap());

    let health_registry = HealthRegistry::new();
    health_registry.register(components::REGISTRY).await;
    health_registry.register(components::GRAPH_CLIENT).await;
    health_registry.register(components::METRICS_CLIENT).await;

    let clients = SharedClients::new(Arc::new(StaticGraph), Arc::new(UnavailableMetrics));
    let orchestrator = PredictionOrchestrator::new(registry, clients, OrchestratorConfig::default())
        .with_health(health_registry.clone());

    let state = Arc::new(AppState::new(orchestrator, health_registry.clone()));
    (create_router(state), health_registry)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

const TRAFFIC_QUERY: &str = "/model/traffic/heron?topology_id=wordcount&cluster=local&environ=default";

#[tokio::test]
async fn test_model_info_lists_registered_models() {
    let (app, _) = setup_test_app(&["it.linear", "it.broken"], &["it.plan"]).await;

    let (status, body) = get(app.clone(), "/model/traffic/heron/model_info").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([
            {"name": "linear", "description": "Echo model"},
            {"name": "broken", "description": "Always fails"}
        ])
    );

    let (_, body) = get(app, "/model/topology/heron/model_info").await;
    assert_eq!(body, json!([{"name": "plan", "description": "Reports the packing plan"}]));
}

#[tokio::test]
async fn test_traffic_prediction_keeps_failures_beside_successes() {
    let (app, _) = setup_test_app(&["it.linear", "it.broken"], &[]).await;

    let (status, body) = get(app, &format!("{}&source_hours=2&future_mins=10", TRAFFIC_QUERY)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["linear"]["topology"], "wordcount");
    assert_eq!(body["linear"]["window"], json!({"source_hours": "2", "future_mins": "10"}));
    assert_eq!(
        body["broken"],
        json!({"errors": [{
            "model": "broken",
            "type": "ModelPredictionError",
            "error": "insufficient data: no emit counts"
        }]})
    );
}

#[tokio::test]
async fn test_all_failed_is_error_envelope_with_ok_status() {
    let (app, _) = setup_test_app(&["it.broken"], &[]).await;

    let (status, body) = get(app, TRAFFIC_QUERY).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"errors": [{
            "model": "broken",
            "type": "ModelPredictionError",
            "error": "insufficient data: no emit counts"
        }]})
    );
}

#[tokio::test]
async fn test_model_filter_limits_result() {
    let (app, _) = setup_test_app(&["it.linear", "it.broken"], &[]).await;

    let (status, body) = get(app, &format!("{}&model=linear", TRAFFIC_QUERY)).await;

    assert_eq!(status, StatusCode::OK);
    let keys: Vec<_> = body.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, vec!["linear".to_string()]);
}

#[tokio::test]
async fn test_unknown_model_returns_not_found() {
    let (app, _) = setup_test_app(&["it.linear"], &[]).await;

    let (status, body) = get(app, &format!("{}&model=unknown", TRAFFIC_QUERY)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let error = &body["errors"][0];
    assert_eq!(error["type"], "ModelNotFoundError");
    assert!(error.get("model").is_none());
}

#[tokio::test]
async fn test_non_numeric_window_is_bad_request() {
    let (app, _) = setup_test_app(&["it.linear"], &[]).await;

    let (status, body) = get(app, &format!("{}&future_mins=soon", TRAFFIC_QUERY)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["type"], "InvalidWindowParameterError");
}

#[tokio::test]
async fn test_missing_topology_parameters_rejected() {
    let (app, _) = setup_test_app(&["it.linear"], &[]).await;

    let (status, _) = get(app, "/model/traffic/heron?cluster=local").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_current_topology_prediction() {
    let (app, _) = setup_test_app(&[], &["it.plan"]).await;

    let (status, body) = get(
        app,
        "/model/topology/heron/current?topology_id=wordcount&cluster=local&environ=default",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plan"]["mode"], "current");
    assert_eq!(body["plan"]["parallelism"]["sentence"], 2);
}

#[tokio::test]
async fn test_proposed_topology_takes_id_from_path() {
    let (app, _) = setup_test_app(&[], &["it.plan"]).await;

    let (status, body) = get(
        app,
        "/model/topology/heron/proposed/wordcount?cluster=local&environ=default&parallelism.sentence=4",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plan"]["topology"], "wordcount");
    assert_eq!(body["plan"]["mode"], "proposed");
    assert_eq!(body["plan"]["window"], json!({"parallelism.sentence": "4"}));
}

#[tokio::test]
async fn test_upstream_failure_degrades_health() {
    let (app, _) = setup_test_app(&[], &["it.plan", "it.tracker"]).await;

    let (status, body) = get(
        app.clone(),
        "/model/topology/heron/current?topology_id=wordcount&cluster=local&environ=default",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tracker"]["errors"][0]["type"], "UpstreamClientError");

    let (status, health) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["components"][services::METRICS]["status"], "degraded");
    assert_eq!(health["components"][services::GRAPH]["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_returns_service_unavailable_when_unhealthy() {
    let (app, health) = setup_test_app(&["it.linear"], &[]).await;
    health
        .set_unhealthy(components::REGISTRY, "configuration invalid")
        .await;

    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_follows_readiness() {
    let (app, health) = setup_test_app(&["it.linear"], &[]).await;

    let (status, body) = get(app.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ready"], false);

    health.set_ready(true).await;
    let (status, body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_evaluations() {
    let (app, _) = setup_test_app(&["it.linear"], &[]).await;
    get(app.clone(), TRAFFIC_QUERY).await;

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("magpie_model_evaluations_total"));
    assert!(text.contains("magpie_prediction_requests_total"));
}
