pub mod backend;
pub mod config;
pub mod error;
pub mod models;
pub mod report;
pub mod screening;
pub mod session;

pub use config::{CascadeConfig, DiseaseOutputMode, LiveThreshold, Profile, VegetationPolicy};
pub use error::{CascadeError, CascadeFailure};
pub use models::{Decision, DiseasePrediction, GuardScores, ScoreVector, VegetationReport, VisualClass};
pub use screening::scoring::{ModelRole, ModelSlot, RawOutput, ScoringFunction};
pub use screening::{Cascade, CascadeState};
pub use session::CascadeSession;
