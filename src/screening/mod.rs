pub mod disease;
pub mod guard;
pub mod preprocessing;
pub mod scoring;
pub mod vegetation;

use anyhow::Result;
use image::{DynamicImage, RgbImage};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{CascadeConfig, LiveThreshold, ModelInput};
use crate::error::{CascadeError, CascadeFailure};
use crate::models::{Decision, GuardScores, VegetationReport};
use disease::DiseaseAdapter;
use preprocessing::{ScopedTensor, TensorLedger};
use scoring::{ModelSlot, ScoringFunction};

/// Cascade states; the last three are terminal and map 1:1 onto [`Decision`] variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeState {
    Idle,
    ColorChecked,
    GuardChecked,
    Classified,
    RejectedColor,
    RejectedGuard,
}

impl CascadeState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CascadeState::Classified | CascadeState::RejectedColor | CascadeState::RejectedGuard
        )
    }
}

impl From<&Decision> for CascadeState {
    fn from(decision: &Decision) -> Self {
        match decision {
            Decision::RejectedByColorFilter { .. } => CascadeState::RejectedColor,
            Decision::RejectedByGuard { .. } => CascadeState::RejectedGuard,
            Decision::Classified { .. } => CascadeState::Classified,
        }
    }
}

/// Intermediate results carried between transitions
enum Stage {
    Idle,
    ColorChecked {
        vegetation: VegetationReport,
    },
    GuardChecked {
        vegetation: VegetationReport,
        guard_scores: GuardScores,
    },
    Done(Decision),
}

impl Stage {
    fn state(&self) -> CascadeState {
        match self {
            Stage::Idle => CascadeState::Idle,
            Stage::ColorChecked { .. } => CascadeState::ColorChecked,
            Stage::GuardChecked { .. } => CascadeState::GuardChecked,
            Stage::Done(decision) => CascadeState::from(decision),
        }
    }
}

/// Debug configuration for cascade execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

/// Context available to every invocation
#[derive(Clone, Debug, Default)]
pub struct CascadeContext {
    pub debug: Option<DebugConfig>,
}

impl CascadeContext {
    /// Save an intermediate raster when debug mode is enabled
    fn save(&self, img: &RgbImage, filename: &str) -> Result<(), CascadeError> {
        if let Some(debug_config) = &self.debug {
            let path = debug_config.output_dir.join(filename);
            img.save(&path)
                .map_err(|e| CascadeError::DebugOutput(format!("{}: {}", path.display(), e)))?;
            debug!(path = %path.display(), "saved debug image");
        }
        Ok(())
    }
}

/// Scorers resolved for a single invocation
struct Bound {
    guard: Arc<dyn ScoringFunction>,
    disease: Arc<dyn ScoringFunction>,
}

/// The vegetation -> guard -> disease cascade.
///
/// Stateless between invocations: each call to [`Cascade::classify`] walks the
/// state machine from `Idle` to exactly one terminal state.
pub struct Cascade {
    config: CascadeConfig,
    guard: ModelSlot,
    disease: ModelSlot,
    disease_adapter: DiseaseAdapter,
    ledger: Arc<TensorLedger>,
    context: CascadeContext,
}

impl Cascade {
    pub fn new(config: CascadeConfig, guard: ModelSlot, disease: ModelSlot) -> Self {
        let disease_adapter = DiseaseAdapter::from_config(&config);
        Self {
            config,
            guard,
            disease,
            disease_adapter,
            ledger: TensorLedger::new(),
            context: CascadeContext::default(),
        }
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.context.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    /// Share an existing ledger (e.g. one owned by a test harness)
    pub fn with_ledger(mut self, ledger: Arc<TensorLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    pub fn guard_slot(&self) -> &ModelSlot {
        &self.guard
    }

    pub fn disease_slot(&self) -> &ModelSlot {
        &self.disease
    }

    pub fn ledger(&self) -> &Arc<TensorLedger> {
        &self.ledger
    }

    /// Classify one image. `threshold` is read when the guard gate runs.
    pub fn classify(
        &self,
        img: &DynamicImage,
        threshold: &LiveThreshold,
    ) -> Result<Decision, CascadeFailure> {
        self.classify_traced(img, threshold).map(|(decision, _)| decision)
    }

    /// Like [`Cascade::classify`], also returning every state visited in order
    pub fn classify_traced(
        &self,
        img: &DynamicImage,
        threshold: &LiveThreshold,
    ) -> Result<(Decision, Vec<CascadeState>), CascadeFailure> {
        // Refuse to start rather than skip a gate
        let bound = Bound {
            guard: self.guard.acquire()?,
            disease: self.disease.acquire()?,
        };
        let rgb = preprocessing::to_rgb(img)?;
        self.context.save(&rgb, "00_input.png")?;

        let mut stage = Stage::Idle;
        let mut trace = vec![CascadeState::Idle];

        loop {
            stage = match stage {
                Stage::Done(decision) => return Ok((decision, trace)),
                Stage::Idle => self.check_color(&rgb),
                Stage::ColorChecked { vegetation } => {
                    self.check_guard(&rgb, &bound, vegetation)?
                }
                Stage::GuardChecked {
                    vegetation,
                    guard_scores,
                } => self.check_disease(&rgb, &bound, threshold, vegetation, guard_scores)?,
            };

            let state = stage.state();
            debug!(?state, "cascade transition");
            trace.push(state);
        }
    }

    fn check_color(&self, rgb: &RgbImage) -> Stage {
        let vegetation = vegetation::check_vegetation(rgb, &self.config.vegetation);
        let [r, g, b] = vegetation.means;
        info!(
            r,
            g,
            b,
            green_ratio = vegetation.green_ratio,
            green_fraction = ?vegetation.green_fraction,
            accepted = vegetation.accepted,
            "vegetation filter"
        );

        if vegetation.accepted {
            Stage::ColorChecked { vegetation }
        } else {
            Stage::Done(Decision::RejectedByColorFilter { vegetation })
        }
    }

    fn check_guard(
        &self,
        rgb: &RgbImage,
        bound: &Bound,
        vegetation: VegetationReport,
    ) -> Result<Stage, CascadeFailure> {
        let guard_scores = self
            .prepare(rgb, &self.config.guard_input, "01_guard_input.png")
            .and_then(|tensor| guard::score(bound.guard.as_ref(), &tensor))
            .map_err(|e| CascadeFailure::from(e).with_vegetation(&vegetation))?;

        info!(
            model = bound.guard.name(),
            no_leaf = guard_scores.no_leaf(),
            other_crops = guard_scores.other_crops(),
            target = guard_scores.target(),
            "guard scores"
        );

        Ok(Stage::GuardChecked {
            vegetation,
            guard_scores,
        })
    }

    fn check_disease(
        &self,
        rgb: &RgbImage,
        bound: &Bound,
        threshold: &LiveThreshold,
        vegetation: VegetationReport,
        guard_scores: GuardScores,
    ) -> Result<Stage, CascadeFailure> {
        let threshold = threshold.get();
        let verdict = guard::evaluate(&guard_scores, threshold);
        if !verdict.is_accepted() {
            info!(threshold, ?verdict, "guard rejected image");
            return Ok(Stage::Done(Decision::RejectedByGuard {
                vegetation,
                guard_scores,
            }));
        }

        let (prediction, visual) = self
            .prepare(rgb, &self.config.disease_input, "02_disease_input.png")
            .and_then(|tensor| self.disease_adapter.classify(bound.disease.as_ref(), &tensor))
            .map_err(|e| {
                CascadeFailure::from(e)
                    .with_vegetation(&vegetation)
                    .with_guard(&guard_scores)
            })?;

        info!(
            model = bound.disease.name(),
            label = %prediction.label,
            confidence = prediction.confidence,
            ?visual,
            "disease classified"
        );

        Ok(Stage::Done(Decision::Classified {
            vegetation,
            guard_scores,
            prediction,
            visual,
        }))
    }

    /// Resize + normalize for one model; the resized raster is freed on return
    fn prepare(
        &self,
        rgb: &RgbImage,
        input: &ModelInput,
        debug_name: &str,
    ) -> Result<ScopedTensor, CascadeError> {
        let resized = preprocessing::resize_for(rgb, input);
        self.context.save(&resized, debug_name)?;
        Ok(ScopedTensor::from_raster(
            &resized,
            input.normalization,
            &self.ledger,
        ))
    }
}
