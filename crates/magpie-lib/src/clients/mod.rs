//! Backing clients shared by every model evaluation
//!
//! This module provides:
//! - `GraphClient`: topology structure lookups (Gremlin server over HTTP)
//! - `MetricsClient`: historical metric timelines (Heron Tracker REST API)
//!
//! Both are built once at startup and shared behind `Arc`. Implementations
//! must be safe for concurrent use and hold no per-request state.

mod gremlin;
mod tracker;

pub use gremlin::{untype_graphson, GremlinHttpClient};
pub use tracker::TrackerMetricsClient;

use crate::error::ClientError;
use crate::models::TopologyRef;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Topology structure and state lookups
#[async_trait]
pub trait GraphClient: Send + Sync {
    /// Number of instances of every spout and bolt in the topology
    async fn component_parallelism(
        &self,
        topology: &TopologyRef,
    ) -> Result<BTreeMap<String, u32>, ClientError>;

    /// Names of the topology's spout components
    async fn spouts(&self, topology: &TopologyRef) -> Result<Vec<String>, ClientError>;
}

/// Query for one metric of one component over a time range
#[derive(Debug, Clone)]
pub struct TimelineQuery<'a> {
    pub topology: &'a TopologyRef,
    pub component: &'a str,
    pub metric: &'a str,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// One metric value reported by one component instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub instance: String,
    /// Unix timestamp in seconds
    pub timestamp: i64,
    pub value: f64,
}

/// Historical timeseries lookups
#[async_trait]
pub trait MetricsClient: Send + Sync {
    /// Samples for the query, ordered by timestamp then instance
    async fn timeline(&self, query: &TimelineQuery<'_>) -> Result<Vec<MetricSample>, ClientError>;
}

/// Clients handed to every model evaluation
#[derive(Clone)]
pub struct SharedClients {
    pub graph: Arc<dyn GraphClient>,
    pub metrics: Arc<dyn MetricsClient>,
}

impl SharedClients {
    pub fn new(graph: Arc<dyn GraphClient>, metrics: Arc<dyn MetricsClient>) -> Self {
        Self { graph, metrics }
    }
}

/// Health component names of the backing clients
pub mod services {
    pub const GRAPH: &str = "graph_client";
    pub const METRICS: &str = "metrics_client";

    /// Health component of the service named in a `ClientError`
    pub fn component_for(service: &str) -> Option<&'static str> {
        match service {
            "graph" => Some(GRAPH),
            "metrics" => Some(METRICS),
            _ => None,
        }
    }
}

/// Sum samples across instances, giving one value per timestamp
pub fn aggregate_by_timestamp(samples: &[MetricSample]) -> Vec<(i64, f64)> {
    let mut totals: BTreeMap<i64, f64> = BTreeMap::new();
    for sample in samples {
        *totals.entry(sample.timestamp).or_insert(0.0) += sample.value;
    }
    totals.into_iter().collect()
}

/// Parse a service base URL so relative endpoints join under its path
pub(crate) fn base_url(raw: &str) -> Result<url::Url, url::ParseError> {
    let mut url = url::Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
