#![allow(dead_code)]

use image::{DynamicImage, ImageBuffer, Rgb};
use leafcheck::{Cascade, CascadeConfig, LiveThreshold, ModelRole, ModelSlot, RawOutput, ScoringFunction};
use ndarray::ArrayView4;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Solid-color test image
pub fn solid_image(rgb: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(ImageBuffer::from_fn(64, 48, |_, _| Rgb(rgb)))
}

/// Green enough for every built-in vegetation policy
pub fn leaf_image() -> DynamicImage {
    solid_image([60, 140, 50])
}

/// Rejected by every built-in vegetation policy
pub fn magenta_image() -> DynamicImage {
    solid_image([200, 40, 200])
}

/// Passes the lenient ratio (0.50) but fails the strict one (1.05)
pub fn sky_image() -> DynamicImage {
    solid_image([120, 170, 235])
}

/// What a scorer saw on one call
#[derive(Debug, Clone, PartialEq)]
pub struct SeenInput {
    pub shape: [usize; 4],
    pub min: f32,
    pub max: f32,
}

/// Scorer test double: returns a fixed output, counts calls and records inputs
pub struct CountingScorer {
    name: String,
    output: Result<RawOutput, String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen: Mutex<Vec<SeenInput>>,
}

impl CountingScorer {
    pub fn returning(output: RawOutput) -> Arc<Self> {
        Arc::new(Self {
            name: "counting".to_string(),
            output: Ok(output),
            delay: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn scores(values: &[f32]) -> Arc<Self> {
        Self::returning(RawOutput::from_vec(values.to_vec()))
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            name: "failing".to_string(),
            output: Err(message.to_string()),
            delay: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn slow(values: &[f32], delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: "slow".to_string(),
            output: Ok(RawOutput::from_vec(values.to_vec())),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<SeenInput> {
        self.seen.lock().unwrap().clone()
    }
}

impl ScoringFunction for CountingScorer {
    fn score(&self, input: ArrayView4<'_, f32>) -> anyhow::Result<RawOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (n, h, w, c) = input.dim();
        let min = input.iter().copied().fold(f32::INFINITY, f32::min);
        let max = input.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        self.seen.lock().unwrap().push(SeenInput {
            shape: [n, h, w, c],
            min,
            max,
        });

        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        match &self.output {
            Ok(output) => Ok(output.clone()),
            Err(message) => Err(anyhow::anyhow!("{}", message)),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A cascade wired to two counting scorers
pub struct Harness {
    pub cascade: Cascade,
    pub guard: Arc<CountingScorer>,
    pub disease: Arc<CountingScorer>,
    pub threshold: LiveThreshold,
}

pub fn harness_with(
    config: CascadeConfig,
    guard: Arc<CountingScorer>,
    disease: Arc<CountingScorer>,
) -> Harness {
    let threshold = LiveThreshold::new(config.potato_threshold);
    let cascade = Cascade::new(
        config,
        ModelSlot::ready(ModelRole::Guard, guard.clone()),
        ModelSlot::ready(ModelRole::Disease, disease.clone()),
    );
    Harness {
        cascade,
        guard,
        disease,
        threshold,
    }
}

/// Default (lenient) profile with fixed guard and disease outputs
pub fn harness(guard_scores: &[f32], disease_scores: &[f32]) -> Harness {
    harness_with(
        CascadeConfig::default(),
        CountingScorer::scores(guard_scores),
        CountingScorer::scores(disease_scores),
    )
}

pub fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}
