//! Multi-model prediction orchestrator
//!
//! A request is fanned out across the selected models of a group. Every
//! model is evaluated in its own task:
//! 1. Build a fresh instance from the model's configured settings
//! 2. Run `predict` under the per-model timeout
//! 3. Record a success or a failure for that model only
//!
//! At most `max_concurrent_models` evaluations of one request run at once.
//! Outcomes are reported in registry order regardless of completion order.
//! Dropping the `predict` future aborts every evaluation still in flight.

mod outcome;

pub use outcome::{ErrorEnvelope, Failure, PredictionOutcome, PredictionResultSet};

use crate::clients::{services, SharedClients};
use crate::config::OrchestratorConfig;
use crate::contract::PredictionContext;
use crate::error::{ErrorKind, ModelError, PredictionError};
use crate::health::HealthRegistry;
use crate::models::{ModelGroup, PredictionRequest, WindowParams, FUTURE_MINS, SOURCE_HOURS};
use crate::observability::{ServiceMetrics, StructuredLogger};
use crate::registry::{ModelRegistry, RegisteredModel};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

/// Window keys that must be numeric when present
const NUMERIC_WINDOW_KEYS: &[&str] = &[SOURCE_HOURS, FUTURE_MINS];

/// Result of one model task
struct Evaluation {
    outcome: PredictionOutcome,
    /// Backing client blamed for an upstream failure
    upstream: Option<(&'static str, String)>,
}

pub struct PredictionOrchestrator {
    registry: Arc<ModelRegistry>,
    clients: SharedClients,
    config: OrchestratorConfig,
    metrics: ServiceMetrics,
    logger: StructuredLogger,
    health: Option<HealthRegistry>,
}

impl PredictionOrchestrator {
    pub fn new(
        registry: Arc<ModelRegistry>,
        clients: SharedClients,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            clients,
            config,
            metrics: ServiceMetrics::new(),
            logger: StructuredLogger::new("magpie"),
            health: None,
        }
    }

    /// Report backing client health from prediction traffic
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Evaluate the request against the group's models.
    ///
    /// Only request-level problems are returned as `Err`: an unknown model
    /// filter or a non-numeric window value. In both cases no model runs.
    pub async fn predict(
        &self,
        group: ModelGroup,
        request: PredictionRequest,
    ) -> Result<PredictionResultSet, PredictionError> {
        let targets = match self.select(group, &request) {
            Ok(targets) => targets,
            Err(e) => {
                self.metrics.inc_requests(group, "rejected");
                self.logger.log_request_rejected(group, &e.to_string());
                return Err(e);
            }
        };

        debug!(
            group = %group,
            topology = %request.topology,
            models = targets.len(),
            "Dispatching prediction request"
        );

        let evaluations = self.evaluate_all(group, targets, Arc::new(request)).await;
        self.report_health(&evaluations).await;

        let result =
            PredictionResultSet::assemble(evaluations.into_iter().map(|e| e.outcome).collect());
        let envelope = if result.is_error_envelope() { "errors" } else { "models" };
        self.metrics.inc_requests(group, envelope);

        Ok(result)
    }

    fn select(
        &self,
        group: ModelGroup,
        request: &PredictionRequest,
    ) -> Result<Vec<RegisteredModel>, PredictionError> {
        validate_window(&request.window)?;

        match &request.model {
            Some(name) => self
                .registry
                .find(group, name)
                .cloned()
                .map(|model| vec![model])
                .ok_or_else(|| PredictionError::ModelNotFound {
                    group,
                    name: name.clone(),
                }),
            None => Ok(self.registry.models(group).to_vec()),
        }
    }

    async fn evaluate_all(
        &self,
        group: ModelGroup,
        targets: Vec<RegisteredModel>,
        request: Arc<PredictionRequest>,
    ) -> Vec<Evaluation> {
        let limiter = Arc::new(Semaphore::new(self.config.max_concurrent_models.max(1)));
        let timeout = self.config.model_timeout();
        let mut slots: Vec<Option<Evaluation>> = targets.iter().map(|_| None).collect();
        let mut tasks = JoinSet::new();

        for (index, model) in targets.iter().cloned().enumerate() {
            let ctx = PredictionContext::new(request.clone(), self.clients.clone());
            let limiter = limiter.clone();
            let metrics = self.metrics.clone();
            let logger = self.logger.clone();

            tasks.spawn(async move {
                // the semaphore is never closed
                let _permit = limiter.acquire_owned().await.ok();
                let started = Instant::now();
                let evaluation = evaluate(&model, &ctx, timeout).await;
                let elapsed = started.elapsed();

                let label = evaluation.outcome.label();
                metrics.observe_evaluation(group, model.name(), label, elapsed);
                let message = match &evaluation.outcome {
                    PredictionOutcome::Failure(f) => Some(f.message.as_str()),
                    PredictionOutcome::Success { .. } => None,
                };
                logger.log_model_evaluated(group, model.name(), label, elapsed, message);

                (index, evaluation)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, evaluation)) => slots[index] = Some(evaluation),
                Err(e) => error!(group = %group, error = %e, "Model evaluation task failed"),
            }
        }

        slots
            .into_iter()
            .zip(&targets)
            .map(|(slot, model)| {
                slot.unwrap_or_else(|| {
                    self.metrics
                        .observe_evaluation(group, model.name(), "panic", Duration::ZERO);
                    Evaluation {
                        outcome: PredictionOutcome::Failure(Failure::for_model(
                            model.name(),
                            ErrorKind::ModelPredictionError,
                            "model panicked during evaluation",
                        )),
                        upstream: None,
                    }
                })
            })
            .collect()
    }

    async fn report_health(&self, evaluations: &[Evaluation]) {
        let Some(health) = &self.health else {
            return;
        };

        let mut degraded = BTreeSet::new();
        for (component, message) in evaluations.iter().filter_map(|e| e.upstream.as_ref()) {
            if degraded.insert(*component) {
                health.set_degraded(component, message.clone()).await;
            }
        }

        let any_success = evaluations.iter().any(|e| e.outcome.is_success());
        if degraded.is_empty() && any_success {
            health.set_healthy(services::GRAPH).await;
            health.set_healthy(services::METRICS).await;
        }
    }
}

/// Reject non-numeric values for the known numeric window keys
pub fn validate_window(window: &WindowParams) -> Result<(), PredictionError> {
    for key in NUMERIC_WINDOW_KEYS {
        if let Some(Err(_)) = window.get_f64(key) {
            return Err(PredictionError::InvalidWindowParameter {
                key: key.to_string(),
                value: window.get(key).unwrap_or_default().to_string(),
            });
        }
    }
    Ok(())
}

async fn evaluate(model: &RegisteredModel, ctx: &PredictionContext, timeout: Duration) -> Evaluation {
    let name = model.name();
    let failed = |kind, message: String| Evaluation {
        outcome: PredictionOutcome::Failure(Failure::for_model(name, kind, message)),
        upstream: None,
    };

    let instance = match model.instantiate() {
        Ok(instance) => instance,
        Err(e) => return failed(ErrorKind::ModelConstructionError, format!("{:#}", e)),
    };

    match tokio::time::timeout(timeout, instance.predict(ctx)).await {
        Ok(Ok(payload)) => Evaluation {
            outcome: PredictionOutcome::Success {
                model_name: name.to_string(),
                payload,
            },
            upstream: None,
        },
        Ok(Err(e)) => {
            let upstream = match &e {
                ModelError::Upstream(client_err) => services::component_for(client_err.service())
                    .map(|component| (component, client_err.to_string())),
                _ => None,
            };
            Evaluation {
                outcome: PredictionOutcome::Failure(Failure::for_model(
                    name,
                    ErrorKind::from(&e),
                    e.to_string(),
                )),
                upstream,
            }
        }
        Err(_) => failed(
            ErrorKind::ModelPredictionError,
            format!("prediction timed out after {}s", timeout.as_secs_f64()),
        ),
    }
}
