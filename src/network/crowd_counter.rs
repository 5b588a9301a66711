use rand::Rng;

use crate::activation::activation::ActivationFunction;
use crate::data::blob::Blob;
use crate::data::labels::ClassWeights;
use crate::error::{CrowdError, Result};
use crate::layers::{Conv2d, Dense, Param};
use crate::loss::{MseLoss, WeightedBceLoss};
use crate::math::grid::Grid;
use crate::network::model::Model;
use crate::network::spec::ModelSpec;
use crate::network::state_dict::StateDict;

/// Values from the last training forward pass needed by `backward`.
struct ForwardCache {
    prediction: Grid,
    target: Grid,
    probs: Vec<f64>,
    label: Vec<f64>,
    weights: Vec<f64>,
    feature_shape: (usize, usize),
}

/// Multi-task crowd counter.
///
/// A shared convolutional trunk feeds two heads:
/// - density: 1x1 convolution to a single plane, sum-pooled by
///   `spec.downsample` to the ground-truth resolution;
/// - count class: global average pool, dense layer, sigmoid.
///
/// Loss is `MSE(density) + ce_weight · weighted BCE(class)`.
pub struct CrowdCounter {
    spec: ModelSpec,
    trunk: Conv2d,
    density_head: Conv2d,
    classifier: Dense,
    cache: Option<ForwardCache>,
    loss: Option<f64>,
}

impl CrowdCounter {
    /// Builds the network with weights drawn from N(0, `spec.init_std`) and
    /// zero biases.
    pub fn new<R: Rng + ?Sized>(spec: ModelSpec, rng: &mut R) -> Result<CrowdCounter> {
        if spec.channels == 0 || spec.num_classes == 0 || spec.downsample == 0 {
            return Err(CrowdError::Config(format!("invalid model spec {:?}", spec)));
        }
        let trunk = Conv2d::new(
            "trunk",
            1,
            spec.channels,
            spec.kernel_size,
            ActivationFunction::ReLU,
            spec.init_std,
            rng,
        )?;
        let density_head = Conv2d::new(
            "density",
            spec.channels,
            1,
            1,
            spec.density_activation,
            spec.init_std,
            rng,
        )?;
        let classifier = Dense::new(
            "classifier",
            spec.channels,
            spec.num_classes,
            ActivationFunction::Sigmoid,
            spec.init_std,
            rng,
        );
        Ok(CrowdCounter { spec, trunk, density_head, classifier, cache: None, loss: None })
    }

    pub fn model_spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn num_params(&self) -> usize {
        self.params().iter().map(|p| p.numel()).sum()
    }

    fn params(&self) -> Vec<&Param> {
        let mut all = self.trunk.params();
        all.extend(self.density_head.params());
        all.extend(self.classifier.params());
        all
    }

    /// Trunk features and the pooled density prediction.
    fn run_density(&mut self, image: &Grid) -> Result<(Vec<Grid>, Grid)> {
        let features = self.trunk.forward(std::slice::from_ref(image))?;
        let density = self.density_head.forward(&features)?.remove(0);
        let prediction = if self.spec.downsample > 1 {
            density.sum_pool(self.spec.downsample)?
        } else {
            density
        };
        Ok((features, prediction))
    }
}

impl Model for CrowdCounter {
    fn forward(&mut self, blob: &Blob, class_weights: &ClassWeights) -> Result<Grid> {
        let k = self.spec.num_classes;
        if class_weights.len() != k || blob.gt_class_label.len() != k {
            return Err(CrowdError::Shape(format!(
                "model has {} classes, got {} weights and a label of length {}",
                k,
                class_weights.len(),
                blob.gt_class_label.len()
            )));
        }
        self.cache = None;
        self.loss = None;

        let (features, prediction) = self.run_density(&blob.image)?;
        if prediction.shape() != blob.gt_density.shape() {
            return Err(CrowdError::Shape(format!(
                "prediction is {:?} but ground truth for {} is {:?}",
                prediction.shape(),
                blob.fname,
                blob.gt_density.shape()
            )));
        }
        let density_loss = MseLoss::loss(&prediction.data, &blob.gt_density.data);

        let pooled: Vec<f64> = features.iter().map(|f| f.mean()).collect();
        let probs = self.classifier.forward(&pooled)?;
        let class_loss = WeightedBceLoss::loss(&probs, &blob.gt_class_label, class_weights.as_slice());

        self.loss = Some(density_loss + self.spec.ce_weight * class_loss);
        self.cache = Some(ForwardCache {
            prediction: prediction.clone(),
            target: blob.gt_density.clone(),
            probs,
            label: blob.gt_class_label.clone(),
            weights: class_weights.as_slice().to_vec(),
            feature_shape: features[0].shape(),
        });
        Ok(prediction)
    }

    fn loss(&self) -> Option<f64> {
        self.loss
    }

    fn zero_grad(&mut self) {
        for p in self.params_mut() {
            p.zero_grad();
        }
    }

    fn backward(&mut self) -> Result<()> {
        let cache = self.cache.take().ok_or(CrowdError::NoForwardPass)?;

        // density branch
        let d_pred = MseLoss::derivative(&cache.prediction.data, &cache.target.data);
        let d_pred = Grid::from_vec(cache.prediction.rows, cache.prediction.cols, d_pred)?;
        let d_density = if self.spec.downsample > 1 {
            d_pred.upsample_nearest(self.spec.downsample)
        } else {
            d_pred
        };
        let mut d_features = self.density_head.backward(&[d_density])?;

        // classification branch, through the global average pool
        let d_logits: Vec<f64> =
            WeightedBceLoss::logit_gradient(&cache.probs, &cache.label, &cache.weights)
                .into_iter()
                .map(|g| g * self.spec.ce_weight)
                .collect();
        let d_pooled = self.classifier.backward_pre(&d_logits)?;
        let (rows, cols) = cache.feature_shape;
        let area = (rows * cols) as f64;
        for (plane, g) in d_features.iter_mut().zip(d_pooled) {
            let share = g / area;
            plane.data.iter_mut().for_each(|v| *v += share);
        }

        self.trunk.backward(&d_features)?;
        Ok(())
    }

    fn params_mut(&mut self) -> Vec<&mut Param> {
        let mut all = self.trunk.params_mut();
        all.extend(self.density_head.params_mut());
        all.extend(self.classifier.params_mut());
        all
    }

    fn state_dict(&self) -> StateDict {
        StateDict::from_params(self.params())
    }

    fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        state.copy_into(self.params_mut())
    }

    fn predict(&mut self, image: &Grid) -> Result<Grid> {
        self.cache = None;
        let (_, prediction) = self.run_density(image)?;
        Ok(prediction)
    }

    fn spec(&self) -> Option<ModelSpec> {
        Some(self.spec.clone())
    }
}
