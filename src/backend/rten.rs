use anyhow::{Context, Result};
use ndarray::{ArrayD, ArrayView4, IxDyn};
use rten::Model;
use rten_tensor::prelude::*;
use rten_tensor::{NdTensor, Tensor};
use std::path::Path;
use tracing::{debug, info};

use crate::screening::scoring::{RawOutput, ScoringFunction};

/// Scores tensors with a `.rten` model loaded from disk
pub struct RtenScorer {
    name: String,
    model: Model,
}

impl RtenScorer {
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading model from {:?}", path);
        let model = Model::load_file(path)
            .with_context(|| format!("Failed to load model: {}", path.display()))?;

        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "rten".to_string());
        debug!(model = %name, "model loaded");

        Ok(Self { name, model })
    }
}

impl ScoringFunction for RtenScorer {
    fn score(&self, input: ArrayView4<'_, f32>) -> Result<RawOutput> {
        let (n, h, w, c) = input.dim();
        let data: Vec<f32> = input.iter().copied().collect();
        let tensor = NdTensor::from_data([n, h, w, c], data);

        let output: Tensor<f32> = self
            .model
            .run_one(tensor.view().into(), None)
            .with_context(|| format!("{} inference failed", self.name))?
            .try_into()
            .map_err(|_| anyhow::anyhow!("{} produced a non-f32 output", self.name))?;

        let shape = output.shape().to_vec();
        let scores = ArrayD::from_shape_vec(IxDyn(&shape), output.to_vec())?;
        Ok(RawOutput::Single(scores))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
