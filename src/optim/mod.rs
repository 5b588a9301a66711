pub mod sgd;
pub mod adam;

use crate::layers::param::Param;

pub use adam::Adam;
pub use sgd::Sgd;

/// Parameter update rule applied once per training step.
///
/// Implementations read `param.grad` and update `param.value` in place.
/// State is keyed by parameter name, so the order of `params` may change
/// between calls.
pub trait Optimizer {
    fn step(&mut self, params: Vec<&mut Param>);

    fn learning_rate(&self) -> f64;
}
