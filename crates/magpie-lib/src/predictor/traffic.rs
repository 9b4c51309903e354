//! Traffic models: what arrives at the topology's spouts

use super::features::{linear_fit, summarize, Summary};
use super::{optional_positive, History, EMIT_COUNT};
use crate::config::ModelSettings;
use crate::contract::{parse_settings, Model, ModelDefinition, PredictionContext};
use crate::error::ModelError;
use crate::models::{ModelGroup, FUTURE_MINS};
use anyhow::bail;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

fn default_quantiles() -> Vec<f64> {
    vec![10.0, 90.0, 95.0, 99.0]
}

fn default_source_hours() -> f64 {
    1.0
}

fn default_future_mins() -> f64 {
    30.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct StatsSummarySettings {
    #[serde(default = "default_quantiles")]
    quantiles: Vec<f64>,
    /// Used when the request has no `source_hours`
    #[serde(default = "default_source_hours")]
    default_source_hours: f64,
    #[serde(default)]
    min_samples: usize,
}

impl Default for StatsSummarySettings {
    fn default() -> Self {
        Self {
            quantiles: default_quantiles(),
            default_source_hours: default_source_hours(),
            min_samples: 0,
        }
    }
}

/// Summary statistics of each spout's emit rate over the source window
pub struct StatsSummaryModel {
    settings: StatsSummarySettings,
}

impl ModelDefinition for StatsSummaryModel {
    const NAME: &'static str = "stats_summary";
    const DESCRIPTION: &'static str =
        "Summary statistics of each spout's emit count per minute over the last source_hours";
    const GROUP: ModelGroup = ModelGroup::HERON_TRAFFIC;

    fn build(settings: &ModelSettings) -> anyhow::Result<Self> {
        let settings: StatsSummarySettings = parse_settings(settings)?;
        if let Some(q) = settings.quantiles.iter().find(|q| !(0.0..=100.0).contains(*q)) {
            bail!("quantile {} is outside [0, 100]", q);
        }
        if settings.default_source_hours <= 0.0 {
            bail!("default_source_hours must be positive");
        }
        Ok(Self { settings })
    }
}

#[async_trait]
impl Model for StatsSummaryModel {
    async fn predict(&self, ctx: &PredictionContext) -> Result<Value, ModelError> {
        let history = History::from_window(ctx, self.settings.default_source_hours)?;
        let spouts = ctx.graph().spouts(&ctx.request.topology).await?;

        let mut summaries: BTreeMap<String, Summary> = BTreeMap::new();
        for spout in spouts {
            let values: Vec<f64> = history
                .totals(ctx, &spout, EMIT_COUNT)
                .await?
                .into_iter()
                .map(|(_, v)| v)
                .collect();

            if values.len() < self.settings.min_samples.max(1) {
                return Err(ModelError::InsufficientData(format!(
                    "{} minutes of emit counts for spout '{}', need {}",
                    values.len(),
                    spout,
                    self.settings.min_samples.max(1)
                )));
            }
            if let Some(summary) = summarize(&values, &self.settings.quantiles) {
                summaries.insert(spout, summary);
            }
        }

        Ok(json!({
            "source_hours": history.hours,
            "unit": "tuples per minute",
            "spouts": summaries,
        }))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct LinearTrendSettings {
    #[serde(default = "default_source_hours")]
    default_source_hours: f64,
    #[serde(default = "default_future_mins")]
    default_future_mins: f64,
    /// Fewer minutes of history than this fails the prediction
    #[serde(default = "LinearTrendSettings::default_min_samples")]
    min_samples: usize,
}

impl LinearTrendSettings {
    fn default_min_samples() -> usize {
        3
    }
}

impl Default for LinearTrendSettings {
    fn default() -> Self {
        Self {
            default_source_hours: default_source_hours(),
            default_future_mins: default_future_mins(),
            min_samples: Self::default_min_samples(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SpoutTrend {
    samples: usize,
    slope_per_minute: f64,
    current: f64,
    predicted: f64,
}

/// Linear extrapolation of each spout's emit rate `future_mins` ahead
pub struct LinearTrendModel {
    settings: LinearTrendSettings,
}

impl ModelDefinition for LinearTrendModel {
    const NAME: &'static str = "linear_trend";
    const DESCRIPTION: &'static str =
        "Least-squares trend of each spout's emit count, extrapolated future_mins ahead";
    const GROUP: ModelGroup = ModelGroup::HERON_TRAFFIC;

    fn build(settings: &ModelSettings) -> anyhow::Result<Self> {
        let settings: LinearTrendSettings = parse_settings(settings)?;
        if settings.min_samples < 2 {
            bail!("min_samples must be at least 2 to fit a trend");
        }
        if settings.default_source_hours <= 0.0 || settings.default_future_mins <= 0.0 {
            bail!("default_source_hours and default_future_mins must be positive");
        }
        Ok(Self { settings })
    }
}

#[async_trait]
impl Model for LinearTrendModel {
    async fn predict(&self, ctx: &PredictionContext) -> Result<Value, ModelError> {
        let history = History::from_window(ctx, self.settings.default_source_hours)?;
        let future_mins = optional_positive(ctx, FUTURE_MINS, self.settings.default_future_mins)?;
        let spouts = ctx.graph().spouts(&ctx.request.topology).await?;

        let mut trends = BTreeMap::new();
        for spout in spouts {
            let series = history.totals(ctx, &spout, EMIT_COUNT).await?;
            if series.len() < self.settings.min_samples {
                return Err(ModelError::InsufficientData(format!(
                    "{} minutes of emit counts for spout '{}', need {}",
                    series.len(),
                    spout,
                    self.settings.min_samples
                )));
            }

            // minutes since the first sample
            let origin = series[0].0;
            let points: Vec<(f64, f64)> = series
                .iter()
                .map(|(ts, v)| ((ts - origin) as f64 / 60.0, *v))
                .collect();
            let fit = linear_fit(&points).ok_or_else(|| {
                ModelError::InsufficientData(format!("emit counts for '{}' share one timestamp", spout))
            })?;

            let last = points[points.len() - 1].0;
            trends.insert(
                spout,
                SpoutTrend {
                    samples: points.len(),
                    slope_per_minute: fit.slope,
                    current: fit.at(last).max(0.0),
                    predicted: fit.at(last + future_mins).max(0.0),
                },
            );
        }

        let total: f64 = trends.values().map(|t| t.predicted).sum();
        Ok(json!({
            "source_hours": history.hours,
            "future_mins": future_mins,
            "unit": "tuples per minute",
            "spouts": trends,
            "total_predicted": total,
        }))
    }
}
