use serde::{Serialize, Deserialize};

/// Per-epoch training statistics collected by the training loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    pub epoch: usize,
    /// Steps run in this epoch (one sample per step).
    pub steps: usize,
    /// Sum of per-step losses; reset at the start of every epoch.
    pub train_loss: f64,
    /// `train_loss / steps`.
    pub mean_loss: f64,
    /// Wall-clock duration of this epoch in milliseconds.
    pub elapsed_ms: u64,
    /// Validation MAE, when the validation stage ran after this epoch.
    pub val_mae: Option<f64>,
    pub val_mse: Option<f64>,
}
