pub mod mse;
pub mod bce;

pub use mse::MseLoss;
pub use bce::WeightedBceLoss;
