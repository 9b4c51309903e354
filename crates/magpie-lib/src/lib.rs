//! Core library of the Magpie modelling service
//!
//! This crate provides:
//! - The model contract and the configuration-driven model registry
//! - Graph and metrics clients for Heron topologies
//! - The multi-model prediction orchestrator
//! - Built-in traffic and topology models
//! - Health checks and observability

pub mod clients;
pub mod config;
pub mod contract;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod orchestrator;
pub mod predictor;
pub mod registry;

#[cfg(test)]
mod test_support;

pub use clients::{GraphClient, MetricsClient, SharedClients};
pub use config::{ModelsConfig, OrchestratorConfig};
pub use contract::{Model, ModelDefinition, PredictionContext};
pub use error::{ClientError, ConfigurationError, ErrorKind, ModelError, PredictionError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ServiceMetrics, StructuredLogger};
pub use orchestrator::{
    ErrorEnvelope, Failure, PredictionOrchestrator, PredictionOutcome, PredictionResultSet,
};
pub use predictor::builtin_catalog;
pub use registry::{ModelCatalog, ModelRegistry};
