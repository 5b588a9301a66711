//! Training driver for a multi-task crowd-counting network.
//!
//! A [`data::ImageDataLoader`] pairs images with density-map CSVs, the
//! augmentation stage flips and perturbs each sample, and a
//! [`train::Trainer`] runs a [`network::Model`] through epochs while the
//! checkpoint, display and validation stages fire on their cadences.

pub mod activation;
pub mod data;
pub mod error;
pub mod layers;
pub mod loss;
pub mod math;
pub mod network;
pub mod optim;
pub mod report;
pub mod telemetry;
pub mod train;

// Convenience re-exports
pub use activation::activation::ActivationFunction;
pub use data::{Blob, ClassWeights, ImageDataLoader, LoaderOptions};
pub use error::{CrowdError, MismatchReport, Result};
pub use math::grid::Grid;
pub use network::{CrowdCounter, Model, ModelSpec};
pub use optim::{Adam, Optimizer, Sgd};
pub use train::{Rngs, TrainConfig, TrainSummary, Trainer};
