use thiserror::Error;

use crate::models::{GuardScores, VegetationReport};
use crate::screening::scoring::ModelRole;

/// Errors that abort a cascade invocation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CascadeError {
    #[error("{0} model is not loaded")]
    ModelUnavailable(ModelRole),

    #[error("{role} model returned malformed output: {reason}")]
    MalformedOutput { role: ModelRole, reason: String },

    #[error("no image supplied (empty raster)")]
    EmptyInput,

    #[error("{role} inference failed: {message}")]
    Inference { role: ModelRole, message: String },

    #[error("failed to write debug output: {0}")]
    DebugOutput(String),

    #[error("classification task aborted: {0}")]
    Aborted(String),
}

impl CascadeError {
    pub(crate) fn malformed(role: ModelRole, reason: impl Into<String>) -> Self {
        CascadeError::MalformedOutput {
            role,
            reason: reason.into(),
        }
    }
}

/// A failed invocation, with whatever diagnostics were computed before it stopped.
///
/// Partial diagnostics are for debugging only and never form a classification.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("classification aborted: {error}")]
pub struct CascadeFailure {
    #[source]
    pub error: CascadeError,
    pub vegetation: Option<VegetationReport>,
    pub guard: Option<GuardScores>,
}

impl CascadeFailure {
    pub fn with_vegetation(mut self, report: &VegetationReport) -> Self {
        self.vegetation = Some(report.clone());
        self
    }

    pub fn with_guard(mut self, scores: &GuardScores) -> Self {
        self.guard = Some(scores.clone());
        self
    }
}

impl From<CascadeError> for CascadeFailure {
    fn from(error: CascadeError) -> Self {
        Self {
            error,
            vegetation: None,
            guard: None,
        }
    }
}
