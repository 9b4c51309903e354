//! Prediction outcomes and their wire representation
//!
//! A result set serializes in one of two shapes:
//! - `{"<model>": <payload>, "<failed model>": {"errors": [<failure>]}, ...}`
//!   when at least one model succeeded, in registry order
//! - `{"errors": [<failure>, ...]}` when none did

use crate::error::{ErrorKind, PredictionError};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// One failure entry: `{"model"?, "type", "error"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Absent for request-level failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    #[serde(rename = "error")]
    pub message: String,
}

impl Failure {
    pub fn for_model(model: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            kind,
            message: message.into(),
        }
    }

    pub fn request(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            model: None,
            kind,
            message: message.into(),
        }
    }
}

impl From<&PredictionError> for Failure {
    fn from(err: &PredictionError) -> Self {
        Failure::request(err.kind(), err.to_string())
    }
}

/// `{"errors": [...]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub errors: Vec<Failure>,
}

impl From<&PredictionError> for ErrorEnvelope {
    fn from(err: &PredictionError) -> Self {
        Self {
            errors: vec![Failure::from(err)],
        }
    }
}

/// Result of evaluating one model
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutcome {
    Success { model_name: String, payload: Value },
    Failure(Failure),
}

impl PredictionOutcome {
    pub fn model_name(&self) -> Option<&str> {
        match self {
            PredictionOutcome::Success { model_name, .. } => Some(model_name),
            PredictionOutcome::Failure(failure) => failure.model.as_deref(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PredictionOutcome::Success { .. })
    }

    /// Label used for metrics and logs
    pub fn label(&self) -> &'static str {
        match self {
            PredictionOutcome::Success { .. } => "success",
            PredictionOutcome::Failure(failure) => failure.kind.as_str(),
        }
    }
}

/// Per-request result of the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionResultSet {
    /// At least one success; every outcome in registry order
    Models(Vec<PredictionOutcome>),
    /// No success at all
    Errors(Vec<Failure>),
}

impl PredictionResultSet {
    /// Choose the envelope for a list of outcomes
    pub fn assemble(outcomes: Vec<PredictionOutcome>) -> Self {
        if outcomes.iter().any(PredictionOutcome::is_success) {
            return PredictionResultSet::Models(outcomes);
        }

        PredictionResultSet::Errors(
            outcomes
                .into_iter()
                .filter_map(|outcome| match outcome {
                    PredictionOutcome::Failure(failure) => Some(failure),
                    PredictionOutcome::Success { .. } => None,
                })
                .collect(),
        )
    }

    pub fn is_error_envelope(&self) -> bool {
        matches!(self, PredictionResultSet::Errors(_))
    }

    /// Model names present as keys of the per-model map
    pub fn model_names(&self) -> Vec<&str> {
        match self {
            PredictionResultSet::Models(outcomes) => {
                outcomes.iter().filter_map(PredictionOutcome::model_name).collect()
            }
            PredictionResultSet::Errors(_) => Vec::new(),
        }
    }

    pub fn get(&self, model: &str) -> Option<&PredictionOutcome> {
        match self {
            PredictionResultSet::Models(outcomes) => {
                outcomes.iter().find(|o| o.model_name() == Some(model))
            }
            PredictionResultSet::Errors(_) => None,
        }
    }

    pub fn failures(&self) -> Vec<&Failure> {
        match self {
            PredictionResultSet::Models(outcomes) => outcomes
                .iter()
                .filter_map(|o| match o {
                    PredictionOutcome::Failure(f) => Some(f),
                    PredictionOutcome::Success { .. } => None,
                })
                .collect(),
            PredictionResultSet::Errors(failures) => failures.iter().collect(),
        }
    }

    pub fn success_count(&self) -> usize {
        match self {
            PredictionResultSet::Models(outcomes) => {
                outcomes.iter().filter(|o| o.is_success()).count()
            }
            PredictionResultSet::Errors(_) => 0,
        }
    }
}

#[derive(Serialize)]
struct FailureEntry<'a> {
    errors: [&'a Failure; 1],
}

impl Serialize for PredictionResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PredictionResultSet::Models(outcomes) => {
                let mut map = serializer.serialize_map(Some(outcomes.len()))?;
                for outcome in outcomes {
                    match outcome {
                        PredictionOutcome::Success {
                            model_name,
                            payload,
                        } => map.serialize_entry(model_name, payload)?,
                        PredictionOutcome::Failure(failure) => {
                            let name = failure.model.as_deref().unwrap_or_default();
                            map.serialize_entry(name, &FailureEntry { errors: [failure] })?
                        }
                    }
                }
                map.end()
            }
            PredictionResultSet::Errors(failures) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("errors", failures)?;
                map.end()
            }
        }
    }
}
