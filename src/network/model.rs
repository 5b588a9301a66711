use crate::data::blob::Blob;
use crate::data::labels::ClassWeights;
use crate::error::Result;
use crate::layers::param::Param;
use crate::math::grid::Grid;
use crate::network::spec::ModelSpec;
use crate::network::state_dict::StateDict;

/// The differentiable function the training loop drives.
///
/// The loop only relies on this contract: `forward` computes a prediction
/// and stores a scalar loss, `backward` accumulates gradients into the
/// parameters returned by `params_mut`, and the optimizer updates them.
pub trait Model {
    /// Training forward pass. Returns the predicted density map at the
    /// resolution of `blob.gt_density` and stores the loss for `loss()`.
    fn forward(&mut self, blob: &Blob, class_weights: &ClassWeights) -> Result<Grid>;

    /// Loss of the most recent `forward`, if any.
    fn loss(&self) -> Option<f64>;

    fn zero_grad(&mut self);

    /// Backpropagates the stored loss into parameter gradients.
    fn backward(&mut self) -> Result<()>;

    fn params_mut(&mut self) -> Vec<&mut Param>;

    fn state_dict(&self) -> StateDict;

    fn load_state_dict(&mut self, state: &StateDict) -> Result<()>;

    /// Inference only: predicted density map for an image.
    fn predict(&mut self, image: &Grid) -> Result<Grid>;

    /// Architecture description stored alongside checkpoints.
    fn spec(&self) -> Option<ModelSpec> {
        None
    }
}
