//! Observability for the modelling service
//!
//! Provides:
//! - Prometheus metrics (model evaluation latency and outcomes, request envelopes, loaded models)
//! - Structured JSON logging with tracing

use crate::models::ModelGroup;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec, HistogramVec,
    IntCounterVec, IntGaugeVec,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

/// Buckets for model evaluation latency (seconds). Evaluations are dominated by
/// client round trips, so the range extends to the default model timeout.
const EVALUATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

struct ServiceMetricsInner {
    model_evaluation_seconds: HistogramVec,
    model_evaluations_total: IntCounterVec,
    prediction_requests_total: IntCounterVec,
    registered_models: IntGaugeVec,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            model_evaluation_seconds: register_histogram_vec!(
                "magpie_model_evaluation_seconds",
                "Time spent constructing and evaluating one model",
                &["group", "model"],
                EVALUATION_BUCKETS.to_vec()
            )
            .expect("Failed to register model_evaluation_seconds"),

            model_evaluations_total: register_int_counter_vec!(
                "magpie_model_evaluations_total",
                "Model evaluations by outcome",
                &["group", "model", "outcome"]
            )
            .expect("Failed to register model_evaluations_total"),

            prediction_requests_total: register_int_counter_vec!(
                "magpie_prediction_requests_total",
                "Prediction requests by response envelope",
                &["group", "envelope"]
            )
            .expect("Failed to register prediction_requests_total"),

            registered_models: register_int_gauge_vec!(
                "magpie_registered_models",
                "Number of models loaded per group",
                &["group"]
            )
            .expect("Failed to register registered_models"),
        }
    }
}

/// Handle to the process-wide metrics. Clones share the same collectors.
#[derive(Clone)]
pub struct ServiceMetrics {
    inner: &'static ServiceMetricsInner,
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServiceMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ServiceMetrics")
    }
}

impl ServiceMetrics {
    /// Registers the collectors on first use
    pub fn new() -> Self {
        Self {
            inner: GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new),
        }
    }

    pub fn observe_evaluation(&self, group: ModelGroup, model: &str, outcome: &str, elapsed: Duration) {
        let group = group.to_string();
        self.inner
            .model_evaluation_seconds
            .with_label_values(&[group.as_str(), model])
            .observe(elapsed.as_secs_f64());
        self.inner
            .model_evaluations_total
            .with_label_values(&[group.as_str(), model, outcome])
            .inc();
    }

    /// `envelope` is one of `models`, `errors` or `rejected`
    pub fn inc_requests(&self, group: ModelGroup, envelope: &str) {
        self.inner
            .prediction_requests_total
            .with_label_values(&[group.to_string().as_str(), envelope])
            .inc();
    }

    pub fn set_registered_models(&self, group: ModelGroup, count: usize) {
        self.inner
            .registered_models
            .with_label_values(&[group.to_string().as_str()])
            .set(count as i64);
    }
}

/// Event-tagged logging for service lifecycle and model evaluations
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn log_startup(&self, version: &str, port: u16, models: usize) {
        info!(
            event = "service_started",
            service = %self.service,
            version = %version,
            port = port,
            models = models,
            "Modelling service started"
        );
    }

    pub fn log_model_evaluated(
        &self,
        group: ModelGroup,
        model: &str,
        outcome: &str,
        elapsed: Duration,
        error: Option<&str>,
    ) {
        let elapsed_ms = elapsed.as_millis() as u64;
        match error {
            None => info!(
                event = "model_evaluated",
                service = %self.service,
                group = %group,
                model = %model,
                outcome = %outcome,
                elapsed_ms = elapsed_ms,
                "Model evaluated"
            ),
            Some(error) => warn!(
                event = "model_failed",
                service = %self.service,
                group = %group,
                model = %model,
                outcome = %outcome,
                elapsed_ms = elapsed_ms,
                error = %error,
                "Model evaluation failed"
            ),
        }
    }

    pub fn log_request_rejected(&self, group: ModelGroup, reason: &str) {
        info!(
            event = "prediction_rejected",
            service = %self.service,
            group = %group,
            reason = %reason,
            "Prediction request rejected"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service,
            reason = %reason,
            "Modelling service shutting down"
        );
    }
}
