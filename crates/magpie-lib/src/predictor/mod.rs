//! Built-in Heron prediction models

mod features;
mod topology;
mod traffic;

pub use features::{linear_fit, mean, summarize, LinearFit, Summary};
pub use topology::{LatencyUnit, QueueingTheoryModel, PARALLELISM_PREFIX};
pub use traffic::{LinearTrendModel, StatsSummaryModel};

use crate::clients::{aggregate_by_timestamp, MetricSample, TimelineQuery};
use crate::contract::PredictionContext;
use crate::error::{ConfigurationError, ModelError};
use crate::models::SOURCE_HOURS;
use crate::registry::ModelCatalog;
use chrono::{DateTime, Duration, Utc};

/// Tuples emitted per minute by each spout instance
pub const EMIT_COUNT: &str = "__emit-count/default";
/// Tuples executed per minute by each bolt instance
pub const EXECUTE_COUNT: &str = "__execute-count/default";
/// Average time to execute one tuple
pub const EXECUTE_LATENCY: &str = "__execute-latency/default";

/// Catalog holding every built-in model under its configuration reference
pub fn builtin_catalog() -> Result<ModelCatalog, ConfigurationError> {
    let mut catalog = ModelCatalog::new();
    catalog
        .register::<StatsSummaryModel>("traffic.heron.stats_summary")?
        .register::<LinearTrendModel>("traffic.heron.linear_trend")?
        .register::<QueueingTheoryModel>("topology.heron.queueing_theory")?;
    Ok(catalog)
}

/// Time range of historical data a model reads
#[derive(Debug, Clone, Copy)]
pub(crate) struct History {
    pub hours: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl History {
    /// The last `source_hours` (or `default_hours`) up to now
    pub fn from_window(ctx: &PredictionContext, default_hours: f64) -> Result<Self, ModelError> {
        let hours = optional_positive(ctx, SOURCE_HOURS, default_hours)?;
        let end = Utc::now();
        let start = Duration::try_seconds((hours * 3600.0).round() as i64)
            .and_then(|span| end.checked_sub_signed(span))
            .ok_or_else(|| ModelError::InvalidParameter {
                key: SOURCE_HOURS.to_string(),
                reason: format!("{} hours reaches outside the supported time range", hours),
            })?;
        Ok(Self { hours, start, end })
    }

    pub async fn samples(
        &self,
        ctx: &PredictionContext,
        component: &str,
        metric: &str,
    ) -> Result<Vec<MetricSample>, ModelError> {
        let query = TimelineQuery {
            topology: &ctx.request.topology,
            component,
            metric,
            start: self.start,
            end: self.end,
        };
        Ok(ctx.metrics().timeline(&query).await?)
    }

    /// Samples summed across instances, one value per timestamp
    pub async fn totals(
        &self,
        ctx: &PredictionContext,
        component: &str,
        metric: &str,
    ) -> Result<Vec<(i64, f64)>, ModelError> {
        let samples = self.samples(ctx, component, metric).await?;
        Ok(aggregate_by_timestamp(&samples))
    }
}

/// Positive window value, or `default` when the key is absent
pub(crate) fn optional_positive(
    ctx: &PredictionContext,
    key: &str,
    default: f64,
) -> Result<f64, ModelError> {
    match ctx.request.window.get(key) {
        Some(_) => ctx.positive_window_f64(key),
        None => Ok(default),
    }
}
