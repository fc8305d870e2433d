use ndarray::{Array1, ArrayD, ArrayView4};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::CascadeError;

/// Which stage a model serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    Guard,
    Disease,
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelRole::Guard => write!(f, "guard"),
            ModelRole::Disease => write!(f, "disease"),
        }
    }
}

/// Output shapes a model provider may return
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutput {
    Single(ArrayD<f32>),
    Sequence(Vec<ArrayD<f32>>),
    /// Named outputs in the order the provider emitted them
    Named(Vec<(String, ArrayD<f32>)>),
}

impl RawOutput {
    pub fn from_vec(values: Vec<f32>) -> Self {
        RawOutput::Single(Array1::from(values).into_dyn())
    }

    /// The first output tensor, if any
    pub fn first(&self) -> Option<&ArrayD<f32>> {
        match self {
            RawOutput::Single(tensor) => Some(tensor),
            RawOutput::Sequence(tensors) => tensors.first(),
            RawOutput::Named(outputs) => outputs.first().map(|(_, tensor)| tensor),
        }
    }

    /// Flatten the first output into a score vector
    pub fn first_vector(&self, role: ModelRole) -> Result<Vec<f32>, CascadeError> {
        let tensor = self
            .first()
            .ok_or_else(|| CascadeError::malformed(role, "model produced no outputs"))?;
        if tensor.is_empty() {
            return Err(CascadeError::malformed(
                role,
                format!("first output is empty (shape {:?})", tensor.shape()),
            ));
        }
        if let Some(bad) = tensor.iter().find(|v| !v.is_finite()) {
            return Err(CascadeError::malformed(
                role,
                format!("first output contains a non-finite score ({})", bad),
            ));
        }
        Ok(tensor.iter().copied().collect())
    }
}

/// An opaque scoring function supplied by the model provider.
///
/// Implementations are shared read-only between invocations and must not
/// mutate model state while scoring.
pub trait ScoringFunction: Send + Sync {
    /// Score one `[1, S, S, 3]` tensor
    fn score(&self, input: ArrayView4<'_, f32>) -> anyhow::Result<RawOutput>;

    /// Human-readable name (used in logs)
    fn name(&self) -> &str;
}

/// Call a scorer once, attributing any provider failure to `role`
pub fn invoke(
    scorer: &dyn ScoringFunction,
    role: ModelRole,
    input: ArrayView4<'_, f32>,
) -> Result<RawOutput, CascadeError> {
    scorer.score(input).map_err(|err| CascadeError::Inference {
        role,
        message: format!("{:#}", err),
    })
}

/// A model that may or may not be loaded yet.
///
/// Clones share the same slot, so a loader can install a model that the
/// cascade picks up on its next invocation.
#[derive(Clone)]
pub struct ModelSlot {
    role: ModelRole,
    scorer: Arc<RwLock<Option<Arc<dyn ScoringFunction>>>>,
}

impl ModelSlot {
    pub fn empty(role: ModelRole) -> Self {
        Self {
            role,
            scorer: Arc::new(RwLock::new(None)),
        }
    }

    pub fn ready(role: ModelRole, scorer: Arc<dyn ScoringFunction>) -> Self {
        Self {
            role,
            scorer: Arc::new(RwLock::new(Some(scorer))),
        }
    }

    pub fn role(&self) -> ModelRole {
        self.role
    }

    pub fn install(&self, scorer: Arc<dyn ScoringFunction>) {
        *self.scorer.write().unwrap_or_else(PoisonError::into_inner) = Some(scorer);
    }

    pub fn clear(&self) {
        *self.scorer.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_ready(&self) -> bool {
        self.scorer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Take a handle on the current model, or report it as unavailable
    pub fn acquire(&self) -> Result<Arc<dyn ScoringFunction>, CascadeError> {
        self.scorer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(CascadeError::ModelUnavailable(self.role))
    }
}

impl fmt::Debug for ModelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSlot")
            .field("role", &self.role)
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Index of the largest value; the leftmost wins ties.
pub fn argmax(values: &[f32]) -> Option<usize> {
    if values.is_empty() {
        return None;
    }
    let mut best = 0;
    for (i, &value) in values.iter().enumerate().skip(1) {
        if value > values[best] {
            best = i;
        }
    }
    Some(best)
}

/// Numerically stable softmax
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Read a single P(positive) value as a two-class decision: `(index, confidence)`
pub fn sigmoid_decision(p: f32) -> (usize, f32) {
    if p >= 0.5 { (1, p) } else { (0, 1.0 - p) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_leftmost_tie() {
        assert_eq!(argmax(&[0.5, 0.5]), Some(0));
        assert_eq!(argmax(&[0.1, 0.7, 0.7]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[2.0, 0.0]);
        assert!((probs[0] - 0.880797).abs() < 1e-4);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_softmax_handles_large_logits() {
        let probs = softmax(&[1000.0, 999.0]);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!(probs[0] > probs[1]);
    }

    #[test]
    fn test_named_output_takes_first_in_emitted_order() {
        let raw = RawOutput::Named(vec![
            ("zeta".to_string(), Array1::from(vec![0.2f32, 0.8]).into_dyn()),
            ("alpha".to_string(), Array1::from(vec![0.9f32, 0.1]).into_dyn()),
        ]);
        assert_eq!(raw.first_vector(ModelRole::Disease).unwrap(), vec![0.2, 0.8]);
    }

    #[test]
    fn test_empty_outputs_are_malformed() {
        let err = RawOutput::Named(vec![]).first_vector(ModelRole::Guard).unwrap_err();
        assert!(matches!(err, CascadeError::MalformedOutput { role: ModelRole::Guard, .. }));

        let err = RawOutput::from_vec(vec![]).first_vector(ModelRole::Guard).unwrap_err();
        assert!(matches!(err, CascadeError::MalformedOutput { .. }));
    }

    #[test]
    fn test_slot_install_and_clear() {
        struct Fixed;
        impl ScoringFunction for Fixed {
            fn score(&self, _input: ArrayView4<'_, f32>) -> anyhow::Result<RawOutput> {
                Ok(RawOutput::from_vec(vec![1.0]))
            }
            fn name(&self) -> &str {
                "fixed"
            }
        }

        let slot = ModelSlot::empty(ModelRole::Disease);
        assert_eq!(
            slot.acquire().err(),
            Some(CascadeError::ModelUnavailable(ModelRole::Disease))
        );

        let shared = slot.clone();
        shared.install(Arc::new(Fixed));
        assert!(slot.is_ready());
        assert_eq!(slot.acquire().unwrap().name(), "fixed");

        shared.clear();
        assert!(!slot.is_ready());
    }
}
