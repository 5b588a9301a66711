use std::path::{Path, PathBuf};

use crate::error::{CrowdError, Result};
use crate::network::model::Model;
use crate::network::state_dict::Checkpoint;

/// File extension of saved checkpoints.
pub const CHECKPOINT_EXT: &str = "json";

/// `{method}_{dataset_name}_{epoch}.json`
pub fn checkpoint_file_name(method: &str, dataset_name: &str, epoch: usize) -> String {
    format!("{}_{}_{}.{}", method, dataset_name, epoch, CHECKPOINT_EXT)
}

/// Writes the model's full parameter state for `epoch` into `output_dir`,
/// creating the directory if needed. Returns the written path.
pub fn save_checkpoint<M: Model + ?Sized>(
    model: &M,
    output_dir: &Path,
    method: &str,
    dataset_name: &str,
    epoch: usize,
) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir).map_err(|e| CrowdError::io(output_dir, e))?;
    let path = output_dir.join(checkpoint_file_name(method, dataset_name, epoch));
    let checkpoint = Checkpoint {
        method: method.to_string(),
        dataset_name: dataset_name.to_string(),
        epoch,
        spec: model.spec(),
        state: model.state_dict(),
    };
    checkpoint.save_json(&path)?;
    tracing::debug!(path = %path.display(), "saved checkpoint");
    Ok(path)
}
