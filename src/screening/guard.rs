use crate::error::CascadeError;
use crate::models::{GuardScores, ScoreVector};
use crate::screening::preprocessing::ScopedTensor;
use crate::screening::scoring::{self, ModelRole, RawOutput, ScoringFunction};

/// Outcome of the guard gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardVerdict {
    Accepted,
    /// Target probability is under the live threshold
    BelowThreshold,
    /// Another class scored higher than the target (index of that class)
    Outscored(usize),
}

impl GuardVerdict {
    pub fn is_accepted(self) -> bool {
        self == GuardVerdict::Accepted
    }
}

/// Read guard output as `[NO_LEAF, OTHER_CROPS, POTATO_LEAF]` probabilities.
///
/// The values are taken as emitted; the guard's own final activation already
/// normalizes them.
pub fn interpret(raw: &RawOutput) -> Result<GuardScores, CascadeError> {
    let values = raw.first_vector(ModelRole::Guard)?;
    if values.len() != 3 {
        return Err(CascadeError::malformed(
            ModelRole::Guard,
            format!("expected 3 class scores, got {}", values.len()),
        ));
    }
    Ok(GuardScores::new(ScoreVector::new(values)))
}

/// Run the guard model exactly once on a prepared tensor
pub fn score(scorer: &dyn ScoringFunction, tensor: &ScopedTensor) -> Result<GuardScores, CascadeError> {
    let raw = scoring::invoke(scorer, ModelRole::Guard, tensor.view())?;
    interpret(&raw)
}

/// Accept iff the target is at or above `threshold` and no other class beats it.
/// Equality passes on every comparison.
#[allow(clippy::neg_cmp_op_on_partial_ord)]
pub fn evaluate(scores: &GuardScores, threshold: f32) -> GuardVerdict {
    let target = scores.target();
    if !(target >= threshold) {
        return GuardVerdict::BelowThreshold;
    }
    if !(target >= scores.no_leaf()) {
        return GuardVerdict::Outscored(GuardScores::NO_LEAF);
    }
    if !(target >= scores.other_crops()) {
        return GuardVerdict::Outscored(GuardScores::OTHER_CROPS);
    }
    GuardVerdict::Accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(values: [f32; 3]) -> GuardScores {
        interpret(&RawOutput::from_vec(values.to_vec())).unwrap()
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        assert_eq!(evaluate(&scores([0.2, 0.29, 0.51]), 0.51), GuardVerdict::Accepted);
        assert_eq!(evaluate(&scores([0.2, 0.3, 0.5]), 0.51), GuardVerdict::BelowThreshold);
    }

    #[test]
    fn test_other_class_wins() {
        assert_eq!(
            evaluate(&scores([0.6, 0.0, 0.4]), 0.3),
            GuardVerdict::Outscored(GuardScores::NO_LEAF)
        );
        assert_eq!(
            evaluate(&scores([0.0, 0.55, 0.45]), 0.3),
            GuardVerdict::Outscored(GuardScores::OTHER_CROPS)
        );
    }

    #[test]
    fn test_ties_with_other_classes_pass() {
        assert!(evaluate(&scores([0.4, 0.2, 0.4]), 0.4).is_accepted());
    }

    #[test]
    fn test_wrong_length_is_malformed() {
        let err = interpret(&RawOutput::from_vec(vec![0.5, 0.5])).unwrap_err();
        assert!(matches!(err, CascadeError::MalformedOutput { role: ModelRole::Guard, .. }));
    }
}
