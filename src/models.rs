use serde::Serialize;

/// Ordered class scores emitted by one classifier.
///
/// The values are fixed once built; callers only get read access.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ScoreVector {
    values: Vec<f32>,
}

impl ScoreVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f32> {
        self.values.get(index).copied()
    }
}

/// Diagnostics from the color heuristic
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VegetationReport {
    /// Mean intensity per channel, in R, G, B order (0-255 scale)
    pub means: [f32; 3],
    /// G / ((R + B) / 2 + eps)
    pub green_ratio: f32,
    /// Fraction of green-dominant pixels, only computed by the mask policy
    pub green_fraction: Option<f32>,
    pub accepted: bool,
}

/// Guard probabilities ordered `[NO_LEAF, OTHER_CROPS, POTATO_LEAF]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardScores {
    scores: ScoreVector,
}

impl GuardScores {
    pub const NO_LEAF: usize = 0;
    pub const OTHER_CROPS: usize = 1;
    pub const TARGET: usize = 2;

    /// Wraps a vector that has already been checked to hold exactly three entries.
    pub(crate) fn new(scores: ScoreVector) -> Self {
        debug_assert_eq!(scores.len(), 3);
        Self { scores }
    }

    pub fn no_leaf(&self) -> f32 {
        self.scores.as_slice()[Self::NO_LEAF]
    }

    pub fn other_crops(&self) -> f32 {
        self.scores.as_slice()[Self::OTHER_CROPS]
    }

    pub fn target(&self) -> f32 {
        self.scores.as_slice()[Self::TARGET]
    }

    pub fn scores(&self) -> &ScoreVector {
        &self.scores
    }
}

/// How the presentation layer should style a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VisualClass {
    Ok,
    Alert,
}

/// Output of the disease classifier after score interpretation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiseasePrediction {
    pub index: usize,
    pub label: String,
    pub confidence: f32,
    /// Interpreted per-class probabilities
    pub all_scores: ScoreVector,
}

/// Terminal result of one cascade invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Decision {
    RejectedByColorFilter {
        vegetation: VegetationReport,
    },
    RejectedByGuard {
        vegetation: VegetationReport,
        guard_scores: GuardScores,
    },
    Classified {
        vegetation: VegetationReport,
        guard_scores: GuardScores,
        prediction: DiseasePrediction,
        visual: VisualClass,
    },
}

impl Decision {
    pub fn vegetation(&self) -> &VegetationReport {
        match self {
            Decision::RejectedByColorFilter { vegetation }
            | Decision::RejectedByGuard { vegetation, .. }
            | Decision::Classified { vegetation, .. } => vegetation,
        }
    }

    pub fn guard_scores(&self) -> Option<&GuardScores> {
        match self {
            Decision::RejectedByColorFilter { .. } => None,
            Decision::RejectedByGuard { guard_scores, .. }
            | Decision::Classified { guard_scores, .. } => Some(guard_scores),
        }
    }

    pub fn prediction(&self) -> Option<&DiseasePrediction> {
        match self {
            Decision::Classified { prediction, .. } => Some(prediction),
            _ => None,
        }
    }

    pub fn is_classified(&self) -> bool {
        matches!(self, Decision::Classified { .. })
    }
}
