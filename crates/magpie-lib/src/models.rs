//! Core data models for the modelling service

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Window key for the amount of historical source data, in hours
pub const SOURCE_HOURS: &str = "source_hours";

/// Window key for the prediction horizon, in minutes
pub const FUTURE_MINS: &str = "future_mins";

/// Stream processing system a model targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Heron,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Heron => "heron",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a model predicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Incoming traffic levels
    Traffic,
    /// Topology performance
    Topology,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Traffic => "traffic",
            ModelKind::Topology => "topology",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "traffic" => Ok(ModelKind::Traffic),
            "topology" => Ok(ModelKind::Topology),
            other => Err(format!("unknown model kind '{}'", other)),
        }
    }
}

/// A (domain, kind) pair. Model names are unique within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModelGroup {
    pub domain: Domain,
    pub kind: ModelKind,
}

impl ModelGroup {
    pub const HERON_TRAFFIC: ModelGroup = ModelGroup::new(Domain::Heron, ModelKind::Traffic);
    pub const HERON_TOPOLOGY: ModelGroup = ModelGroup::new(Domain::Heron, ModelKind::Topology);

    /// Every group served over HTTP
    pub const ALL: [ModelGroup; 2] = [Self::HERON_TRAFFIC, Self::HERON_TOPOLOGY];

    pub const fn new(domain: Domain, kind: ModelKind) -> Self {
        Self { domain, kind }
    }
}

impl fmt::Display for ModelGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.domain, self.kind)
    }
}

/// Static metadata for one loaded model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    pub description: String,
    /// Catalog reference the model was loaded from
    pub reference: String,
}

/// Public view of a model returned by the `model_info` endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub name: String,
    pub description: String,
}

impl From<&ModelDescriptor> for ModelSummary {
    fn from(descriptor: &ModelDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
        }
    }
}

/// Whether a topology prediction concerns the running or a proposed plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionMode {
    #[default]
    Current,
    Proposed,
}

/// Identifies a topology within a Heron deployment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopologyRef {
    pub topology_id: String,
    pub cluster: String,
    pub environ: String,
}

impl fmt::Display for TopologyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.cluster, self.environ, self.topology_id)
    }
}

/// Model-agnostic window parameters, e.g. `source_hours` and `future_mins`.
///
/// Values are kept as the strings received on the wire; each model reads the
/// subset it needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowParams(BTreeMap<String, String>);

impl WindowParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Parse a parameter as a number, `None` if absent
    pub fn get_f64(&self, key: &str) -> Option<Result<f64, String>> {
        self.get(key).map(|raw| {
            raw.trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| format!("'{}' is not a number", raw))
        })
    }

    /// Entries whose key starts with `prefix`, with the prefix stripped
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.0
            .iter()
            .filter_map(move |(k, v)| k.strip_prefix(prefix).map(|rest| (rest, v.as_str())))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for WindowParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A prediction request as received from the resource endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub topology: TopologyRef,
    /// Restrict the request to a single model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub mode: PredictionMode,
    #[serde(default)]
    pub window: WindowParams,
}

impl PredictionRequest {
    pub fn new(
        topology_id: impl Into<String>,
        cluster: impl Into<String>,
        environ: impl Into<String>,
    ) -> Self {
        Self {
            topology: TopologyRef {
                topology_id: topology_id.into(),
                cluster: cluster.into(),
                environ: environ.into(),
            },
            model: None,
            mode: PredictionMode::Current,
            window: WindowParams::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_mode(mut self, mode: PredictionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_window(mut self, window: WindowParams) -> Self {
        self.window = window;
        self
    }
}
