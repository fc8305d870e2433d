use crate::config::{CascadeConfig, DiseaseOutputMode};
use crate::error::CascadeError;
use crate::models::{DiseasePrediction, ScoreVector, VisualClass};
use crate::screening::preprocessing::ScopedTensor;
use crate::screening::scoring::{self, ModelRole, RawOutput, ScoringFunction, argmax, sigmoid_decision, softmax};

/// Interprets disease model output according to a fixed, configured mode.
///
/// The mode is chosen once when the adapter is built. Output shape never
/// switches it, so a model that already emits probabilities is not softmaxed twice.
#[derive(Debug, Clone)]
pub struct DiseaseAdapter {
    mode: DiseaseOutputMode,
    labels: Vec<String>,
    ok_class_index: usize,
}

impl DiseaseAdapter {
    pub fn new(mode: DiseaseOutputMode, labels: Vec<String>, ok_class_index: usize) -> Self {
        Self {
            mode,
            labels,
            ok_class_index,
        }
    }

    pub fn from_config(config: &CascadeConfig) -> Self {
        Self::new(
            config.disease_output,
            config.disease_labels.clone(),
            config.ok_class_index,
        )
    }

    pub fn mode(&self) -> DiseaseOutputMode {
        self.mode
    }

    /// Run the disease model exactly once on a prepared tensor
    pub fn classify(
        &self,
        scorer: &dyn ScoringFunction,
        tensor: &ScopedTensor,
    ) -> Result<(DiseasePrediction, VisualClass), CascadeError> {
        let raw = scoring::invoke(scorer, ModelRole::Disease, tensor.view())?;
        self.interpret(&raw)
    }

    pub fn interpret(&self, raw: &RawOutput) -> Result<(DiseasePrediction, VisualClass), CascadeError> {
        let values = raw.first_vector(ModelRole::Disease)?;

        let (index, confidence, all_scores) = match self.mode {
            DiseaseOutputMode::Probabilities => {
                if values.len() < 2 {
                    return Err(malformed("probability output needs at least 2 classes", &values));
                }
                let index = argmax(&values).unwrap_or(0);
                (index, values[index], values)
            }
            DiseaseOutputMode::LogitPair => {
                if values.len() < 2 {
                    return Err(malformed("logit-pair output needs at least 2 values", &values));
                }
                let probs = softmax(&values[..2]);
                let index = argmax(&probs).unwrap_or(0);
                (index, probs[index], probs)
            }
            DiseaseOutputMode::SigmoidScalar => {
                if values.len() != 1 {
                    return Err(malformed("sigmoid output must be a single value", &values));
                }
                let p = values[0];
                if !(0.0..=1.0).contains(&p) {
                    return Err(malformed("sigmoid output must lie within [0, 1]", &values));
                }
                let (index, confidence) = sigmoid_decision(p);
                (index, confidence, vec![1.0 - p, p])
            }
        };

        let visual = if index == self.ok_class_index {
            VisualClass::Ok
        } else {
            VisualClass::Alert
        };

        let label = self
            .labels
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("Class {}", index));

        Ok((
            DiseasePrediction {
                index,
                label,
                confidence,
                all_scores: ScoreVector::new(all_scores),
            },
            visual,
        ))
    }
}

fn malformed(reason: &str, values: &[f32]) -> CascadeError {
    CascadeError::malformed(ModelRole::Disease, format!("{} (got {} values)", reason, values.len()))
}
