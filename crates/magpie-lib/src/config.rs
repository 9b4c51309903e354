//! Configuration sections shared by the service and the library

use crate::models::{Domain, ModelGroup, ModelKind};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Opaque per-model configuration blob, handed to the model unmodified
pub type ModelSettings = serde_json::Value;

/// Models configured for one (domain, kind) group
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroupConfig {
    /// Catalog references, in evaluation and response order
    #[serde(default)]
    pub models: Vec<String>,

    /// Settings keyed by model name
    #[serde(default)]
    pub config: BTreeMap<String, ModelSettings>,
}

/// `models.<domain>.<kind>` configuration tree
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ModelsConfig(pub BTreeMap<Domain, BTreeMap<ModelKind, GroupConfig>>);

impl ModelsConfig {
    pub fn group(&self, group: ModelGroup) -> Option<&GroupConfig> {
        self.0.get(&group.domain).and_then(|kinds| kinds.get(&group.kind))
    }

    /// Every configured group, in domain then kind order
    pub fn groups(&self) -> impl Iterator<Item = (ModelGroup, &GroupConfig)> {
        self.0.iter().flat_map(|(domain, kinds)| {
            kinds
                .iter()
                .map(move |(kind, cfg)| (ModelGroup::new(*domain, *kind), cfg))
        })
    }

    /// Add or replace a group, mostly useful when building configuration in code
    pub fn insert(&mut self, group: ModelGroup, config: GroupConfig) {
        self.0.entry(group.domain).or_default().insert(group.kind, config);
    }
}

/// Orchestrator tuning
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum number of models evaluated concurrently for one request
    #[serde(default = "default_max_concurrent_models")]
    pub max_concurrent_models: usize,

    /// Hard limit on a single model evaluation, in seconds
    #[serde(default = "default_model_timeout")]
    pub model_timeout_secs: u64,
}

fn default_max_concurrent_models() -> usize {
    4
}

fn default_model_timeout() -> u64 {
    30
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_models: default_max_concurrent_models(),
            model_timeout_secs: default_model_timeout(),
        }
    }
}

impl OrchestratorConfig {
    /// Per-model bound, never below one second
    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs.max(1))
    }
}

/// Gremlin server connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct GraphClientConfig {
    #[serde(default = "default_graph_url")]
    pub url: String,

    #[serde(default = "default_client_timeout")]
    pub timeout_secs: u64,
}

fn default_graph_url() -> String {
    "http://localhost:8182".to_string()
}

impl Default for GraphClientConfig {
    fn default() -> Self {
        Self {
            url: default_graph_url(),
            timeout_secs: default_client_timeout(),
        }
    }
}

/// Heron Tracker connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsClientConfig {
    #[serde(default = "default_tracker_url")]
    pub url: String,

    #[serde(default = "default_client_timeout")]
    pub timeout_secs: u64,
}

fn default_tracker_url() -> String {
    "http://localhost:8888".to_string()
}

fn default_client_timeout() -> u64 {
    10
}

impl Default for MetricsClientConfig {
    fn default() -> Self {
        Self {
            url: default_tracker_url(),
            timeout_secs: default_client_timeout(),
        }
    }
}
