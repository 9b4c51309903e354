//! Topology performance model based on per-component queue utilisation
//!
//! Each bolt is treated as `c` parallel servers (its instances): arrival rate
//! is the mean executed tuples per second, service rate per instance is the
//! inverse of the mean execute latency, and utilisation is
//! `arrival / (parallelism * service)`. A component at or above 1.0 cannot
//! keep up with its input.

use super::features::mean;
use super::{History, EXECUTE_COUNT, EXECUTE_LATENCY};
use crate::config::ModelSettings;
use crate::contract::{parse_settings, Model, ModelDefinition, PredictionContext};
use crate::error::ModelError;
use crate::models::{ModelGroup, PredictionMode};
use anyhow::bail;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Window key prefix for proposed parallelism, e.g. `parallelism.splitter=8`
pub const PARALLELISM_PREFIX: &str = "parallelism.";

/// Unit the metrics store reports execute latency in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum LatencyUnit {
    #[serde(rename = "ns")]
    #[default]
    Nanoseconds,
    #[serde(rename = "us")]
    Microseconds,
    #[serde(rename = "ms")]
    Milliseconds,
}

impl LatencyUnit {
    fn to_secs(self, value: f64) -> f64 {
        match self {
            LatencyUnit::Nanoseconds => value / 1e9,
            LatencyUnit::Microseconds => value / 1e6,
            LatencyUnit::Milliseconds => value / 1e3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct QueueingSettings {
    default_source_hours: f64,
    latency_unit: LatencyUnit,
    /// Components at or above this utilisation are reported as at risk
    utilisation_threshold: f64,
}

impl Default for QueueingSettings {
    fn default() -> Self {
        Self {
            default_source_hours: 1.0,
            latency_unit: LatencyUnit::default(),
            utilisation_threshold: 0.8,
        }
    }
}

#[derive(Debug, Serialize)]
struct ComponentLoad {
    parallelism: u32,
    arrival_rate: f64,
    service_rate: f64,
    utilisation: f64,
    saturated: bool,
}

pub struct QueueingTheoryModel {
    settings: QueueingSettings,
}

impl ModelDefinition for QueueingTheoryModel {
    const NAME: &'static str = "queueing_theory";
    const DESCRIPTION: &'static str =
        "Per-component utilisation of the current or proposed packing plan from arrival rate and execute latency";
    const GROUP: ModelGroup = ModelGroup::HERON_TOPOLOGY;

    fn build(settings: &ModelSettings) -> anyhow::Result<Self> {
        let settings: QueueingSettings = parse_settings(settings)?;
        if settings.default_source_hours <= 0.0 {
            bail!("default_source_hours must be positive");
        }
        if settings.utilisation_threshold <= 0.0 {
            bail!("utilisation_threshold must be positive");
        }
        Ok(Self { settings })
    }
}

impl QueueingTheoryModel {
    /// Running parallelism, with `parallelism.<component>` overrides in proposed mode
    async fn parallelism(&self, ctx: &PredictionContext) -> Result<BTreeMap<String, u32>, ModelError> {
        let mut parallelism = ctx
            .graph()
            .component_parallelism(&ctx.request.topology)
            .await?;

        if ctx.request.mode == PredictionMode::Proposed {
            for (component, raw) in ctx.request.window.with_prefix(PARALLELISM_PREFIX) {
                let key = format!("{}{}", PARALLELISM_PREFIX, component);
                let Some(current) = parallelism.get_mut(component) else {
                    return Err(ModelError::InvalidParameter {
                        key,
                        reason: format!("topology has no component '{}'", component),
                    });
                };
                *current = raw
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|p| *p > 0)
                    .ok_or_else(|| ModelError::InvalidParameter {
                        key,
                        reason: format!("parallelism must be a positive integer, got '{}'", raw),
                    })?;
            }
        }

        Ok(parallelism)
    }
}

#[async_trait]
impl Model for QueueingTheoryModel {
    async fn predict(&self, ctx: &PredictionContext) -> Result<Value, ModelError> {
        let history = History::from_window(ctx, self.settings.default_source_hours)?;
        let parallelism = self.parallelism(ctx).await?;

        let mut components = BTreeMap::new();
        for (component, instances) in &parallelism {
            let executed = history.totals(ctx, component, EXECUTE_COUNT).await?;
            // spouts do not execute tuples
            let Some(per_minute) = mean(&executed.iter().map(|(_, v)| *v).collect::<Vec<_>>()) else {
                continue;
            };

            let latencies: Vec<f64> = history
                .samples(ctx, component, EXECUTE_LATENCY)
                .await?
                .into_iter()
                .map(|s| s.value)
                .collect();
            let latency = mean(&latencies).ok_or_else(|| {
                ModelError::InsufficientData(format!(
                    "no execute latency reported for '{}'",
                    component
                ))
            })?;

            let arrival_rate = per_minute / 60.0;
            let latency_secs = self.settings.latency_unit.to_secs(latency);
            let service_rate = if latency_secs > 0.0 { 1.0 / latency_secs } else { f64::INFINITY };
            let capacity = service_rate * f64::from(*instances);
            let utilisation = if capacity.is_finite() { arrival_rate / capacity } else { 0.0 };

            components.insert(
                component.clone(),
                ComponentLoad {
                    parallelism: *instances,
                    arrival_rate,
                    service_rate: if service_rate.is_finite() { service_rate } else { 0.0 },
                    utilisation,
                    saturated: utilisation >= 1.0,
                },
            );
        }

        if components.is_empty() {
            return Err(ModelError::InsufficientData(format!(
                "no execute counts reported for {} over the last {} hours",
                ctx.request.topology, history.hours
            )));
        }

        let bottleneck = components
            .iter()
            .max_by(|a, b| a.1.utilisation.total_cmp(&b.1.utilisation))
            .map(|(name, _)| name.clone());
        let at_risk: Vec<&String> = components
            .iter()
            .filter(|(_, load)| load.utilisation >= self.settings.utilisation_threshold)
            .map(|(name, _)| name)
            .collect();

        Ok(json!({
            "mode": ctx.request.mode,
            "source_hours": history.hours,
            "components": components,
            "bottleneck": bottleneck,
            "at_risk": at_risk,
        }))
    }
}
