use serde::{Serialize, Deserialize};

use crate::activation::activation::ActivationFunction;

/// Serializable description of the crowd-counting network.
///
/// Saved inside every checkpoint so a model can be rebuilt for evaluation
/// without the training configuration at hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSpec {
    /// Feature planes produced by the shared convolutional trunk.
    pub channels: usize,
    /// Trunk kernel size (odd).
    pub kernel_size: usize,
    /// Output activation of the density head.
    pub density_activation: ActivationFunction,
    /// Weight of the classification loss relative to the density MSE.
    pub ce_weight: f64,
    /// Std-dev of the normal weight initialisation.
    pub init_std: f64,
    pub num_classes: usize,
    /// Predictions are sum-pooled by this factor to match the ground truth.
    pub downsample: usize,
}

impl Default for ModelSpec {
    fn default() -> Self {
        ModelSpec {
            channels: 8,
            kernel_size: 5,
            density_activation: ActivationFunction::ReLU,
            ce_weight: 1e-4,
            init_std: 0.01,
            num_classes: 10,
            downsample: 1,
        }
    }
}
