use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::error::{CrowdError, Result};
use crate::layers::param::Param;
use crate::network::spec::ModelSpec;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorRecord {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

/// Snapshot of every parameter value, keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDict {
    pub tensors: BTreeMap<String, TensorRecord>,
}

impl StateDict {
    pub fn from_params<'a>(params: impl IntoIterator<Item = &'a Param>) -> StateDict {
        let tensors = params
            .into_iter()
            .map(|p| (p.name.clone(), TensorRecord { shape: p.shape.clone(), data: p.value.clone() }))
            .collect();
        StateDict { tensors }
    }

    /// Copies stored values into `params`. Every parameter must be present
    /// with a matching shape.
    pub fn copy_into<'a>(&self, params: impl IntoIterator<Item = &'a mut Param>) -> Result<()> {
        for param in params {
            let record = self.tensors.get(&param.name).ok_or_else(|| {
                CrowdError::Checkpoint(format!("missing tensor '{}'", param.name))
            })?;
            if record.shape != param.shape || record.data.len() != param.numel() {
                return Err(CrowdError::Checkpoint(format!(
                    "tensor '{}' has shape {:?}, model expects {:?}",
                    param.name, record.shape, param.shape
                )));
            }
            param.value.copy_from_slice(&record.data);
        }
        Ok(())
    }
}

/// A checkpoint file: run identity, architecture, and weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub method: String,
    pub dataset_name: String,
    pub epoch: usize,
    #[serde(default)]
    pub spec: Option<ModelSpec>,
    pub state: StateDict,
}

impl Checkpoint {
    /// Serializes the checkpoint to a JSON file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path).map_err(|e| CrowdError::io(path, e))?;
        let mut writer = std::io::BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush().map_err(|e| CrowdError::io(path, e))
    }

    /// Deserializes a checkpoint previously written by `save_json`.
    pub fn load_json(path: &Path) -> Result<Checkpoint> {
        let file = std::fs::File::open(path).map_err(|e| CrowdError::io(path, e))?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
