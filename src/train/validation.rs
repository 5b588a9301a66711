use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::data::loader::ImageDataLoader;
use crate::error::{CrowdError, Result};
use crate::network::crowd_counter::CrowdCounter;
use crate::network::model::Model;
use crate::network::spec::ModelSpec;
use crate::network::state_dict::Checkpoint;

/// Count errors over a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    /// Mean absolute count error.
    pub mae: f64,
    /// Root of the mean squared count error.
    pub mse: f64,
}

/// Best checkpoint seen so far by validation MAE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestModel {
    pub mae: f64,
    pub mse: f64,
    pub model: String,
}

/// Scores a saved checkpoint against a loader.
pub trait Evaluator {
    fn evaluate(&mut self, checkpoint: &Path, loader: &ImageDataLoader) -> Result<Scores>;
}

/// Predicts every sample in loader order and compares counts.
pub fn evaluate_model<M: Model + ?Sized>(model: &mut M, loader: &ImageDataLoader) -> Result<Scores> {
    // order only matters when the loader shuffles
    let mut rng = StdRng::seed_from_u64(0);
    let mut abs_sum = 0.0;
    let mut sq_sum = 0.0;
    let mut n = 0usize;
    for blob in loader.iter(&mut rng) {
        let blob = blob?;
        let et_count = model.predict(&blob.image)?.sum();
        let diff = blob.gt_count() - et_count;
        abs_sum += diff.abs();
        sq_sum += diff * diff;
        n += 1;
    }
    if n == 0 {
        return Err(CrowdError::EmptyDataset(loader.image_dir().to_path_buf()));
    }
    Ok(Scores { mae: abs_sum / n as f64, mse: (sq_sum / n as f64).sqrt() })
}

/// Rebuilds a [`CrowdCounter`] from a checkpoint file and evaluates it.
///
/// The architecture comes from the checkpoint; `fallback_spec` is used for
/// checkpoints saved without one.
pub struct CheckpointEvaluator {
    pub fallback_spec: ModelSpec,
}

impl CheckpointEvaluator {
    pub fn new(fallback_spec: ModelSpec) -> CheckpointEvaluator {
        CheckpointEvaluator { fallback_spec }
    }

    pub fn load_model(&self, checkpoint: &Path) -> Result<CrowdCounter> {
        let ckpt = Checkpoint::load_json(checkpoint)?;
        let spec = ckpt.spec.clone().unwrap_or_else(|| self.fallback_spec.clone());
        // weights are overwritten by the state dict
        let mut model = CrowdCounter::new(spec, &mut StdRng::seed_from_u64(0))?;
        model.load_state_dict(&ckpt.state)?;
        Ok(model)
    }
}

impl Evaluator for CheckpointEvaluator {
    fn evaluate(&mut self, checkpoint: &Path, loader: &ImageDataLoader) -> Result<Scores> {
        let mut model = self.load_model(checkpoint)?;
        evaluate_model(&mut model, loader)
    }
}

/// The optional validation stage of the training loop.
///
/// Runs after every epoch divisible by `every` and keeps the best model by
/// MAE. Evaluation errors propagate to the caller.
pub struct ValidationStage<'a> {
    every: usize,
    evaluator: Box<dyn Evaluator + 'a>,
    loader: &'a ImageDataLoader,
    best: Option<BestModel>,
}

impl<'a> ValidationStage<'a> {
    pub fn new(every: usize, evaluator: Box<dyn Evaluator + 'a>, loader: &'a ImageDataLoader) -> Self {
        ValidationStage { every: every.max(1), evaluator, loader, best: None }
    }

    pub fn is_due(&self, epoch: usize) -> bool {
        epoch % self.every == 0
    }

    /// Scores `checkpoint` and updates the best record.
    pub fn run(&mut self, checkpoint: &Path) -> Result<(Scores, BestModel)> {
        let scores = self.evaluator.evaluate(checkpoint, self.loader)?;
        let best = match &self.best {
            Some(best) if scores.mae >= best.mae => best.clone(),
            _ => {
                let model = checkpoint
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| checkpoint.display().to_string());
                let best = BestModel { mae: scores.mae, mse: scores.mse, model };
                self.best = Some(best.clone());
                best
            }
        };
        Ok((scores, best))
    }

    pub fn best(&self) -> Option<&BestModel> {
        self.best.as_ref()
    }
}
