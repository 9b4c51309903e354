//! Fakes shared by the unit tests of this crate

use crate::clients::{GraphClient, MetricSample, MetricsClient, SharedClients, TimelineQuery};
use crate::config::ModelSettings;
use crate::contract::{parse_settings, Model, ModelDefinition, PredictionContext};
use crate::error::{ClientError, ModelError};
use crate::models::{ModelGroup, TopologyRef};
use crate::registry::ModelCatalog;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-memory graph client
#[derive(Debug, Default)]
pub struct FakeGraph {
    pub parallelism: BTreeMap<String, u32>,
    pub spouts: Vec<String>,
    pub fail: bool,
}

impl FakeGraph {
    fn unavailable() -> ClientError {
        ClientError::Status {
            service: "graph",
            status: 503,
            body: "graph store unavailable".to_string(),
        }
    }
}

#[async_trait]
impl GraphClient for FakeGraph {
    async fn component_parallelism(
        &self,
        _topology: &TopologyRef,
    ) -> Result<BTreeMap<String, u32>, ClientError> {
        if self.fail {
            return Err(Self::unavailable());
        }
        Ok(self.parallelism.clone())
    }

    async fn spouts(&self, _topology: &TopologyRef) -> Result<Vec<String>, ClientError> {
        if self.fail {
            return Err(Self::unavailable());
        }
        Ok(self.spouts.clone())
    }
}

/// In-memory metrics client keyed by (component, metric)
#[derive(Debug, Default)]
pub struct FakeMetrics {
    pub series: HashMap<(String, String), Vec<MetricSample>>,
    pub fail: bool,
}

impl FakeMetrics {
    pub fn with_series(
        mut self,
        component: &str,
        metric: &str,
        samples: Vec<MetricSample>,
    ) -> Self {
        self.series
            .insert((component.to_string(), metric.to_string()), samples);
        self
    }
}

#[async_trait]
impl MetricsClient for FakeMetrics {
    async fn timeline(&self, query: &TimelineQuery<'_>) -> Result<Vec<MetricSample>, ClientError> {
        if self.fail {
            return Err(ClientError::NotFound {
                service: "metrics",
                what: query.metric.to_string(),
            });
        }
        let start = query.start.timestamp();
        let end = query.end.timestamp();
        Ok(self
            .series
            .get(&(query.component.to_string(), query.metric.to_string()))
            .map(|samples| {
                samples
                    .iter()
                    .filter(|s| s.timestamp >= start && s.timestamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

pub fn shared(graph: FakeGraph, metrics: FakeMetrics) -> SharedClients {
    SharedClients::new(Arc::new(graph), Arc::new(metrics))
}

/// Samples for one instance, one per minute, ending at `end`
pub fn per_minute(instance: &str, end: i64, values: &[f64]) -> Vec<MetricSample> {
    let count = values.len() as i64;
    values
        .iter()
        .enumerate()
        .map(|(i, v)| MetricSample {
            instance: instance.to_string(),
            timestamp: end - (count - 1 - i as i64) * 60,
            value: *v,
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LinearSettings {
    rate: Option<f64>,
}

/// Succeeds with a payload derived from the request and its settings
pub struct LinearModel {
    rate: f64,
}

#[async_trait]
impl Model for LinearModel {
    async fn predict(&self, ctx: &PredictionContext) -> Result<Value, ModelError> {
        Ok(json!({
            "topology": ctx.request.topology.topology_id,
            "window": ctx.request.window,
            "rate": self.rate,
        }))
    }
}

impl ModelDefinition for LinearModel {
    const NAME: &'static str = "linear";
    const DESCRIPTION: &'static str = "Constant rate test model";
    const GROUP: ModelGroup = ModelGroup::HERON_TRAFFIC;

    fn build(settings: &ModelSettings) -> anyhow::Result<Self> {
        let settings: LinearSettings = parse_settings(settings)?;
        Ok(Self {
            rate: settings.rate.unwrap_or(42.0),
        })
    }
}

/// Always fails in `predict`
pub struct BrokenModel;

#[async_trait]
impl Model for BrokenModel {
    async fn predict(&self, _ctx: &PredictionContext) -> Result<Value, ModelError> {
        Err(ModelError::Other(anyhow::anyhow!("model is broken")))
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

/// Fails during construction
pub struct UnbuildableModel;

#[async_trait]
impl Model for UnbuildableModel {
    async fn predict(&self, _ctx: &PredictionContext) -> Result<Value, ModelError> {
        Ok(Value::Null)
    }
}

impl ModelDefinition for UnbuildableModel {
    const NAME: &'static str = "unbuildable";
    const DESCRIPTION: &'static str = "Cannot be constructed";
    const GROUP: ModelGroup = ModelGroup::HERON_TRAFFIC;

    fn build(_settings: &ModelSettings) -> anyhow::Result<Self> {
        anyhow::bail!("missing coefficients")
    }
}

/// Forwards whatever the graph client returns
pub struct UpstreamModel;

#[async_trait]
impl Model for UpstreamModel {
    async fn predict(&self, ctx: &PredictionContext) -> Result<Value, ModelError> {
        let spouts = ctx.graph().spouts(&ctx.request.topology).await?;
        Ok(json!({ "spouts": spouts }))
    }
}

impl ModelDefinition for UpstreamModel {
    const NAME: &'static str = "upstream";
    const DESCRIPTION: &'static str = "Reads spouts from the graph client";
    const GROUP: ModelGroup = ModelGroup::HERON_TRAFFIC;

    fn build(_settings: &ModelSettings) -> anyhow::Result<Self> {
        Ok(Self)
    }
}

/// Never finishes within a test timeout
pub struct SlowModel;

#[async_trait]
impl Model for SlowModel {
    async fn predict(&self, _ctx: &PredictionContext) -> Result<Value, ModelError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Value::Null)
    }
}

impl ModelDefinition for SlowModel {
    const NAME: &'static str = "slow";
    const DESCRIPTION: &'static str = "Sleeps for an hour";
    const GROUP: ModelGroup = ModelGroup::HERON_TRAFFIC;

    fn build(_settings: &ModelSettings) -> anyhow::Result<Self> {
        Ok(Self)
    }
}

/// Evaluations of [`AbandonedModel`] that have started
pub static ABANDONED_STARTED: AtomicUsize = AtomicUsize::new(0);
/// Evaluations of [`AbandonedModel`] dropped before finishing
pub static ABANDONED_DROPPED: AtomicUsize = AtomicUsize::new(0);

struct CountOnDrop(&'static AtomicUsize);

impl Drop for CountOnDrop {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Sleeps forever, counting how often its evaluation is torn down
pub struct AbandonedModel;

#[async_trait]
impl Model for AbandonedModel {
    async fn predict(&self, _ctx: &PredictionContext) -> Result<Value, ModelError> {
        let _guard = CountOnDrop(&ABANDONED_DROPPED);
        ABANDONED_STARTED.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<()>().await;
        Ok(Value::Null)
    }
}

impl ModelDefinition for AbandonedModel {
    const NAME: &'static str = "abandoned";
    const DESCRIPTION: &'static str = "Never completes";
    const GROUP: ModelGroup = ModelGroup::HERON_TRAFFIC;

    fn build(_settings: &ModelSettings) -> anyhow::Result<Self> {
        Ok(Self)
    }
}

/// Panics in `predict`
pub struct PanickingModel;

#[async_trait]
impl Model for PanickingModel {
    async fn predict(&self, _ctx: &PredictionContext) -> Result<Value, ModelError> {
        panic!("arithmetic went sideways")
    }
}

impl ModelDefinition for PanickingModel {
    const NAME: &'static str = "panicky";
    const DESCRIPTION: &'static str = "Panics";
    const GROUP: ModelGroup = ModelGroup::HERON_TRAFFIC;

    fn build(_settings: &ModelSettings) -> anyhow::Result<Self> {
        Ok(Self)
    }
}

/// Topology-group model sharing a name with [`LinearModel`]
pub struct TopologyLinearModel;

#[async_trait]
impl Model for TopologyLinearModel {
    async fn predict(&self, ctx: &PredictionContext) -> Result<Value, ModelError> {
        Ok(json!({ "mode": ctx.request.mode }))
    }
}

impl ModelDefinition for TopologyLinearModel {
    const NAME: &'static str = "linear";
    const DESCRIPTION: &'static str = "Topology test model";
    const GROUP: ModelGroup = ModelGroup::HERON_TOPOLOGY;

    fn build(_settings: &ModelSettings) -> anyhow::Result<Self> {
        Ok(Self)
    }
}

/// Number of times [`ProbeModel`] was built or run
pub static PROBE_CALLS: AtomicUsize = AtomicUsize::new(0);

/// Counts constructions and evaluations
pub struct ProbeModel;

#[async_trait]
impl Model for ProbeModel {
    async fn predict(&self, _ctx: &PredictionContext) -> Result<Value, ModelError> {
        PROBE_CALLS.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Null)
    }
}

impl ModelDefinition for ProbeModel {
    const NAME: &'static str = "probe";
    const DESCRIPTION: &'static str = "Counts invocations";
    const GROUP: ModelGroup = ModelGroup::HERON_TRAFFIC;

    fn build(_settings: &ModelSettings) -> anyhow::Result<Self> {
        PROBE_CALLS.fetch_add(1, Ordering::SeqCst);
        Ok(Self)
    }
}

pub static IN_FLIGHT: AtomicUsize = AtomicUsize::new(0);
pub static PEAK_IN_FLIGHT: AtomicUsize = AtomicUsize::new(0);

/// Models recording the highest number of concurrent evaluations
macro_rules! concurrency_probe {
    ($ty:ident, $name:literal) => {
        pub struct $ty;

        #[async_trait]
        impl Model for $ty {
            async fn predict(&self, _ctx: &PredictionContext) -> Result<Value, ModelError> {
                let now = IN_FLIGHT.fetch_add(1, Ordering::SeqCst) + 1;
                PEAK_IN_FLIGHT.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                IN_FLIGHT.fetch_sub(1, Ordering::SeqCst);
                Ok(json!({ "probe": $name }))
            }
        }

        impl ModelDefinition for $ty {
            const NAME: &'static str = $name;
            const DESCRIPTION: &'static str = "Tracks peak concurrency";
            const GROUP: ModelGroup = ModelGroup::HERON_TOPOLOGY;

            fn build(_settings: &ModelSettings) -> anyhow::Result<Self> {
                Ok(Self)
            }
        }
    };
}

concurrency_probe!(ProbeA, "probe_a");
concurrency_probe!(ProbeB, "probe_b");
concurrency_probe!(ProbeC, "probe_c");

/// Catalog of every test model under `test.<name>` references
pub fn test_catalog() -> ModelCatalog {
    let mut catalog = ModelCatalog::new();
    catalog
        .register::<LinearModel>("test.linear")
        .and_then(|c| c.register::<BrokenModel>("test.broken"))
        .and_then(|c| c.register::<UnbuildableModel>("test.unbuildable"))
        .and_then(|c| c.register::<UpstreamModel>("test.upstream"))
        .and_then(|c| c.register::<SlowModel>("test.slow"))
        .and_then(|c| c.register::<AbandonedModel>("test.abandoned"))
        .and_then(|c| c.register::<PanickingModel>("test.panicky"))
        .and_then(|c| c.register::<TopologyLinearModel>("test.topology_linear"))
        .and_then(|c| c.register::<ProbeModel>("test.probe"))
        .and_then(|c| c.register::<ProbeA>("test.probe_a"))
        .and_then(|c| c.register::<ProbeB>("test.probe_b"))
        .and_then(|c| c.register::<ProbeC>("test.probe_c"))
        .expect("test catalog references are unique");
    catalog
}
