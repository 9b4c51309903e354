//! Error taxonomy for model loading and prediction

use crate::models::ModelGroup;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Fatal errors raised while building the model registry at startup
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("model reference '{reference}' configured for {group} is not in the model catalog")]
    UnknownReference { group: ModelGroup, reference: String },

    #[error("model '{reference}' is a {actual} model and cannot be configured for {expected}")]
    WrongGroup {
        reference: String,
        expected: ModelGroup,
        actual: ModelGroup,
    },

    #[error("model name '{name}' is declared more than once for {group}")]
    DuplicateName { group: ModelGroup, name: String },

    #[error("model reference '{0}' is registered in the catalog more than once")]
    DuplicateReference(String),

    #[error("model reference '{reference}' uses the reserved model name '{name}'")]
    ReservedName { reference: String, name: &'static str },
}

/// Failure reported by a backing client (graph or metrics store)
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{service} request failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("unexpected {service} response: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    #[error("{service} has no data for {what}")]
    NotFound { service: &'static str, what: String },
}

impl ClientError {
    /// Name of the backing service that failed
    pub fn service(&self) -> &'static str {
        match self {
            ClientError::Transport { service, .. }
            | ClientError::Status { service, .. }
            | ClientError::Decode { service, .. }
            | ClientError::NotFound { service, .. } => service,
        }
    }
}

/// Error returned from a model's `predict`
#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Upstream(#[from] ClientError),

    #[error("missing window parameter '{0}'")]
    MissingParameter(String),

    #[error("invalid window parameter '{key}': {reason}")]
    InvalidParameter { key: String, reason: String },

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Request-level errors. Per-model failures never surface here.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("no {group} model named '{name}' is registered")]
    ModelNotFound { group: ModelGroup, name: String },

    #[error("window parameter '{key}' must be numeric, got '{value}'")]
    InvalidWindowParameter { key: String, value: String },
}

impl PredictionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PredictionError::ModelNotFound { .. } => ErrorKind::ModelNotFoundError,
            PredictionError::InvalidWindowParameter { .. } => ErrorKind::InvalidWindowParameterError,
        }
    }
}

/// The `type` field of a failure on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    ModelNotFoundError,
    InvalidWindowParameterError,
    ModelConstructionError,
    ModelPredictionError,
    UpstreamClientError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ModelNotFoundError => "ModelNotFoundError",
            ErrorKind::InvalidWindowParameterError => "InvalidWindowParameterError",
            ErrorKind::ModelConstructionError => "ModelConstructionError",
            ErrorKind::ModelPredictionError => "ModelPredictionError",
            ErrorKind::UpstreamClientError => "UpstreamClientError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&ModelError> for ErrorKind {
    fn from(err: &ModelError) -> Self {
        match err {
            ModelError::Upstream(_) => ErrorKind::UpstreamClientError,
            _ => ErrorKind::ModelPredictionError,
        }
    }
}
