//! The contract every prediction model implements
//!
//! A model is described statically by [`ModelDefinition`] (name, description
//! and the group it belongs to, all readable without an instance) and is
//! evaluated through [`Model::predict`].
//!
//! Instances are built per request from immutable settings, so an
//! implementation never sees two requests and may keep request-local state
//! freely. The shared clients in [`PredictionContext`] are the only objects
//! visible to concurrent evaluations.

use crate::clients::{GraphClient, MetricsClient, SharedClients};
use crate::config::ModelSettings;
use crate::error::ModelError;
use crate::models::{ModelGroup, PredictionRequest};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Everything a model sees while evaluating one request
#[derive(Clone)]
pub struct PredictionContext {
    pub request: Arc<PredictionRequest>,
    pub clients: SharedClients,
}

impl PredictionContext {
    pub fn new(request: Arc<PredictionRequest>, clients: SharedClients) -> Self {
        Self { request, clients }
    }

    pub fn graph(&self) -> &dyn GraphClient {
        self.clients.graph.as_ref()
    }

    pub fn metrics(&self) -> &dyn MetricsClient {
        self.clients.metrics.as_ref()
    }

    /// Required numeric window parameter
    pub fn window_f64(&self, key: &str) -> Result<f64, ModelError> {
        match self.request.window.get_f64(key) {
            Some(Ok(value)) => Ok(value),
            Some(Err(reason)) => Err(ModelError::InvalidParameter {
                key: key.to_string(),
                reason,
            }),
            None => Err(ModelError::MissingParameter(key.to_string())),
        }
    }

    /// Numeric window parameter that must be strictly positive
    pub fn positive_window_f64(&self, key: &str) -> Result<f64, ModelError> {
        let value = self.window_f64(key)?;
        if value <= 0.0 {
            return Err(ModelError::InvalidParameter {
                key: key.to_string(),
                reason: format!("must be positive, got {}", value),
            });
        }
        Ok(value)
    }
}

/// A constructed, ready-to-run model
#[async_trait]
pub trait Model: Send + Sync {
    /// Produce this model's payload for the request
    async fn predict(&self, ctx: &PredictionContext) -> Result<Value, ModelError>;
}

/// Static side of a model: metadata plus construction from settings
pub trait ModelDefinition: Model + Sized + 'static {
    /// Unique name within the model's group
    const NAME: &'static str;
    const DESCRIPTION: &'static str;
    const GROUP: ModelGroup;

    /// Build an instance from its configured settings (`Value::Null` when none given)
    fn build(settings: &ModelSettings) -> anyhow::Result<Self>;
}

/// Constructor stored in the catalog for a model type
pub type ModelFactory = fn(&ModelSettings) -> anyhow::Result<Box<dyn Model>>;

pub(crate) fn build_boxed<M: ModelDefinition>(
    settings: &ModelSettings,
) -> anyhow::Result<Box<dyn Model>> {
    Ok(Box::new(M::build(settings)?))
}

/// Deserialize a settings blob, treating `null` as "all defaults"
pub fn parse_settings<T>(settings: &ModelSettings) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    if settings.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(settings.clone()).map_err(|e| anyhow::anyhow!("invalid settings: {}", e))
}
