//! Cascade configuration: per-model input geometry, gate policies and named
//! deployment profiles.

use anyhow::{Context, Result};
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Default guard acceptance threshold for the target class
pub const DEFAULT_POTATO_THRESHOLD: f32 = 0.51;

/// Keeps the green ratio finite on all-black images
pub const RATIO_EPSILON: f32 = 1e-6;

/// Pixel value mapping applied after resizing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// `x / 127.5 - 1`, range [-1, 1]
    SignedUnit,
    /// `x / 255`, range [0, 1]
    Unit,
}

impl Normalization {
    pub fn apply(self, value: u8) -> f32 {
        match self {
            Normalization::SignedUnit => value as f32 / 127.5 - 1.0,
            Normalization::Unit => value as f32 / 255.0,
        }
    }

    pub fn range(self) -> (f32, f32) {
        match self {
            Normalization::SignedUnit => (-1.0, 1.0),
            Normalization::Unit => (0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    Bilinear,
}

impl ResizeFilter {
    pub fn filter_type(self) -> FilterType {
        match self {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Bilinear => FilterType::Triangle,
        }
    }
}

/// Input geometry and value mapping expected by one model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelInput {
    pub size: u32,
    pub normalization: Normalization,
    pub resize: ResizeFilter,
}

impl ModelInput {
    /// Guard models look at silhouette, so nearest-neighbour is enough.
    pub fn guard(size: u32) -> Self {
        Self {
            size,
            normalization: Normalization::SignedUnit,
            resize: ResizeFilter::Nearest,
        }
    }

    /// Disease models need lesion texture, so they get bilinear resampling.
    pub fn disease(size: u32) -> Self {
        Self {
            size,
            normalization: Normalization::Unit,
            resize: ResizeFilter::Bilinear,
        }
    }
}

/// Acceptance rule for the color pre-filter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum VegetationPolicy {
    /// Accept iff `G_mean / ((R_mean + B_mean) / 2 + eps) > threshold`
    MeanRatio { threshold: f32 },
    /// Accept iff the fraction of pixels with `G > dominance*R`, `G > dominance*B`
    /// and `G > min_green` exceeds `min_fraction`
    GreenMask {
        dominance: f32,
        min_green: u8,
        min_fraction: f32,
    },
}

impl VegetationPolicy {
    pub fn mean_ratio(threshold: f32) -> Self {
        VegetationPolicy::MeanRatio { threshold }
    }

    pub fn green_mask(min_fraction: f32) -> Self {
        VegetationPolicy::GreenMask {
            dominance: 1.05,
            min_green: 50,
            min_fraction,
        }
    }
}

/// How the disease model's raw output is to be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DiseaseOutputMode {
    /// Already-activated probabilities, plain argmax
    Probabilities,
    /// Two-class logits, softmax over entries 0 and 1
    LogitPair,
    /// Single P(disease) value
    SigmoidScalar,
}

/// Immutable cascade configuration shared by every invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeConfig {
    pub guard_input: ModelInput,
    pub disease_input: ModelInput,
    pub guard_labels: Vec<String>,
    pub disease_labels: Vec<String>,
    /// Starting value for the live threshold
    pub potato_threshold: f32,
    pub vegetation: VegetationPolicy,
    pub disease_output: DiseaseOutputMode,
    pub ok_class_index: usize,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Profile::Lenient.config()
    }
}

impl CascadeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.guard_labels.len() != 3 {
            anyhow::bail!(
                "guard_labels must name exactly 3 classes, got {}",
                self.guard_labels.len()
            );
        }
        if self.disease_labels.is_empty() {
            anyhow::bail!("disease_labels must not be empty");
        }
        if self.ok_class_index >= self.disease_labels.len() {
            anyhow::bail!(
                "ok_class_index {} is out of range for {} disease labels",
                self.ok_class_index,
                self.disease_labels.len()
            );
        }
        if self.guard_input.size == 0 || self.disease_input.size == 0 {
            anyhow::bail!("model input sizes must be non-zero");
        }
        if !(0.0..=1.0).contains(&self.potato_threshold) {
            anyhow::bail!(
                "potato_threshold must be within [0, 1], got {}",
                self.potato_threshold
            );
        }
        match self.vegetation {
            VegetationPolicy::MeanRatio { threshold } if !threshold.is_finite() => {
                anyhow::bail!("vegetation ratio threshold must be finite");
            }
            VegetationPolicy::GreenMask { min_fraction, .. }
                if !(0.0..=1.0).contains(&min_fraction) =>
            {
                anyhow::bail!("vegetation min_fraction must be within [0, 1]");
            }
            _ => {}
        }
        Ok(())
    }
}

/// Deployment variants seen in the field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Mean-ratio 0.50, 160/256 inputs, probability outputs
    #[default]
    Lenient,
    /// Mean-ratio 1.05, 160/224 inputs, logit-pair outputs
    Strict,
    /// Green-mask fraction 0.04, 160/224 inputs, sigmoid outputs
    Mask,
}

impl Profile {
    pub fn config(self) -> CascadeConfig {
        let (vegetation, disease_size, disease_output) = match self {
            Profile::Lenient => (
                VegetationPolicy::mean_ratio(0.50),
                256,
                DiseaseOutputMode::Probabilities,
            ),
            Profile::Strict => (
                VegetationPolicy::mean_ratio(1.05),
                224,
                DiseaseOutputMode::LogitPair,
            ),
            Profile::Mask => (
                VegetationPolicy::green_mask(0.04),
                224,
                DiseaseOutputMode::SigmoidScalar,
            ),
        };

        CascadeConfig {
            guard_input: ModelInput::guard(160),
            disease_input: ModelInput::disease(disease_size),
            guard_labels: ["NO_LEAF", "OTHER_CROPS", "POTATO_LEAF"]
                .map(String::from)
                .to_vec(),
            disease_labels: ["Healthy", "Late blight"].map(String::from).to_vec(),
            potato_threshold: DEFAULT_POTATO_THRESHOLD,
            vegetation,
            disease_output,
            ok_class_index: 0,
        }
    }
}

/// On-disk configuration: a base profile plus optional overrides
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    pub profile: Option<Profile>,
    pub guard_input: Option<ModelInput>,
    pub disease_input: Option<ModelInput>,
    pub guard_labels: Option<Vec<String>>,
    pub disease_labels: Option<Vec<String>>,
    pub potato_threshold: Option<f32>,
    pub vegetation: Option<VegetationPolicy>,
    pub disease_output: Option<DiseaseOutputMode>,
    pub ok_class_index: Option<usize>,
}

impl ConfigFile {
    pub fn into_config(self) -> Result<CascadeConfig> {
        let mut config = self.profile.unwrap_or_default().config();

        if let Some(input) = self.guard_input {
            config.guard_input = input;
        }
        if let Some(input) = self.disease_input {
            config.disease_input = input;
        }
        if let Some(labels) = self.guard_labels {
            config.guard_labels = labels;
        }
        if let Some(labels) = self.disease_labels {
            config.disease_labels = labels;
        }
        if let Some(threshold) = self.potato_threshold {
            config.potato_threshold = threshold;
        }
        if let Some(policy) = self.vegetation {
            config.vegetation = policy;
        }
        if let Some(mode) = self.disease_output {
            config.disease_output = mode;
        }
        if let Some(index) = self.ok_class_index {
            config.ok_class_index = index;
        }

        config.validate()?;
        Ok(config)
    }
}

pub fn parse_config(contents: &str) -> Result<CascadeConfig> {
    let file: ConfigFile =
        toml::from_str(contents).context("Failed to parse config file as TOML")?;
    file.into_config()
}

pub fn load_config(path: &Path) -> Result<CascadeConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&contents)
}

/// Guard threshold that can be changed while the cascade is running.
///
/// Clones share the same value. The controller reads it when gate 3 is
/// evaluated, never earlier.
#[derive(Debug, Clone)]
pub struct LiveThreshold {
    bits: Arc<AtomicU32>,
}

impl LiveThreshold {
    pub fn new(value: f32) -> Self {
        let value = if value.is_nan() { DEFAULT_POTATO_THRESHOLD } else { value };
        Self {
            bits: Arc::new(AtomicU32::new(value.clamp(0.0, 1.0).to_bits())),
        }
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Store a new threshold, clamped to [0, 1]. Returns the stored value.
    pub fn set(&self, value: f32) -> Result<f32> {
        if value.is_nan() {
            anyhow::bail!("threshold must be a number");
        }
        let clamped = value.clamp(0.0, 1.0);
        if clamped != value {
            tracing::warn!(requested = value, stored = clamped, "threshold clamped to [0, 1]");
        }
        let value = clamped;
        self.bits.store(value.to_bits(), Ordering::Release);
        Ok(value)
    }
}

impl Default for LiveThreshold {
    fn default() -> Self {
        Self::new(DEFAULT_POTATO_THRESHOLD)
    }
}
