mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from leafcheck for tests
#[allow(unused_imports)]
pub use leafcheck::{
    Cascade, CascadeConfig, CascadeError, CascadeFailure, CascadeSession, CascadeState, Decision,
    DiseaseOutputMode, LiveThreshold, ModelRole, ModelSlot, Profile, RawOutput, ScoringFunction,
    VegetationPolicy, VisualClass,
};
