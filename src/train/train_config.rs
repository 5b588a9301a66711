use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::augment::AugmentConfig;
use crate::data::loader::LoaderOptions;
use crate::error::{CrowdError, Result};
use crate::network::spec::ModelSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    Adam,
    /// SGD with momentum.
    Sgd,
}

/// Periodic scoring of saved checkpoints on the validation split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub enabled: bool,
    /// Run after every epoch divisible by this.
    pub every: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        ValidationConfig { enabled: false, every: 2 }
    }
}

/// Optional metrics dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    /// Address the dashboard server binds to.
    pub addr: String,
    /// Experiment to reopen; `None` creates `save_exp_name`.
    pub exp_name: Option<String>,
    /// Name for a new experiment; defaults to `{method}_{dataset_name}_v1`.
    pub save_exp_name: Option<String>,
    /// Delete every stored experiment before starting.
    pub remove_all_log: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        TelemetryConfig {
            enabled: false,
            addr: "127.0.0.1:8889".to_string(),
            exp_name: None,
            save_exp_name: None,
            remove_all_log: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    /// Colour when stdout is a terminal and `NO_COLOR` is unset.
    #[default]
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub color: ColorMode,
}

/// Everything a training run needs, fixed at process start.
///
/// Defaults reproduce the reference run (CMTL on ShanghaiTech part A
/// patches). Components receive it by reference and never mutate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Method name, used in checkpoint file names.
    pub method: String,
    /// Dataset name, used in checkpoint file names.
    pub dataset_name: String,
    pub output_dir: PathBuf,

    pub train_path: PathBuf,
    pub train_gt_path: PathBuf,
    pub val_path: PathBuf,
    pub val_gt_path: PathBuf,

    /// First epoch (inclusive).
    pub start_step: usize,
    /// Last epoch (inclusive).
    pub end_step: usize,
    pub learning_rate: f64,
    /// Only used by `OptimizerKind::Sgd`.
    pub momentum: f64,
    pub optimizer: OptimizerKind,
    /// Steps between console lines and visualization dumps.
    pub disp_interval: usize,
    /// Steps between step-loss samples sent to telemetry.
    pub log_interval: usize,
    pub seed: Option<u64>,

    /// Training loader flags. The validation loader uses the same flags
    /// without shuffling.
    pub loader: LoaderOptions,
    pub augment: AugmentConfig,
    pub model: ModelSpec,
    pub validation: ValidationConfig,
    pub telemetry: TelemetryConfig,
    pub log: LogConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        let data = PathBuf::from("data/formatted_trainval/shanghaitech_part_A_patches_9");
        TrainConfig {
            method: "cmtl".to_string(),
            dataset_name: "shtechA".to_string(),
            output_dir: PathBuf::from("saved_models"),
            train_path: data.join("train"),
            train_gt_path: data.join("train_den"),
            val_path: data.join("val"),
            val_gt_path: data.join("val_den"),
            start_step: 1,
            end_step: 70,
            learning_rate: 0.00001,
            momentum: 0.9,
            optimizer: OptimizerKind::Adam,
            disp_interval: 500,
            log_interval: 250,
            seed: Some(64678),
            loader: LoaderOptions::default(),
            augment: AugmentConfig::default(),
            model: ModelSpec::default(),
            validation: ValidationConfig::default(),
            telemetry: TelemetryConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl TrainConfig {
    /// Loader flags for the validation split.
    pub fn val_loader(&self) -> LoaderOptions {
        LoaderOptions { shuffle: false, ..self.loader }
    }

    /// Model spec with class count and downsample factor taken from the
    /// loader flags.
    pub fn model_spec(&self) -> ModelSpec {
        ModelSpec {
            num_classes: self.loader.num_classes,
            downsample: self.loader.downsample_factor(),
            ..self.model.clone()
        }
    }

    pub fn experiment_name(&self) -> String {
        self.telemetry
            .save_exp_name
            .clone()
            .unwrap_or_else(|| format!("{}_{}_v1", self.method, self.dataset_name))
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("method", &self.method), ("dataset_name", &self.dataset_name)] {
            if value.is_empty() || value.contains(['/', '\\']) {
                return Err(CrowdError::Config(format!(
                    "{} must be a non-empty file-name fragment, got '{}'",
                    field, value
                )));
            }
        }
        if self.start_step > self.end_step {
            return Err(CrowdError::Config(format!(
                "start_step {} is after end_step {}",
                self.start_step, self.end_step
            )));
        }
        if self.disp_interval == 0 || self.log_interval == 0 {
            return Err(CrowdError::Config("disp_interval and log_interval must be positive".into()));
        }
        if self.validation.every == 0 {
            return Err(CrowdError::Config("validation.every must be positive".into()));
        }
        if !(self.learning_rate > 0.0) {
            return Err(CrowdError::Config(format!("learning_rate must be positive, got {}", self.learning_rate)));
        }
        for (name, p) in [("augment.flip_prob", self.augment.flip_prob), ("augment.noise_prob", self.augment.noise_prob)] {
            if !(0.0..=1.0).contains(&p) {
                return Err(CrowdError::Config(format!("{} must be in [0, 1], got {}", name, p)));
            }
        }
        let amp = self.augment.noise_amplitude;
        if !amp.is_finite() || amp < 0.0 {
            return Err(CrowdError::Config(format!(
                "augment.noise_amplitude must be finite and non-negative, got {}",
                amp
            )));
        }
        Ok(())
    }

    /// Reads a JSON config; missing fields take their defaults.
    pub fn load_json(path: &Path) -> Result<TrainConfig> {
        let file = std::fs::File::open(path).map_err(|e| CrowdError::io(path, e))?;
        let reader = std::io::BufReader::new(file);
        let config: TrainConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the config to a pretty-printed JSON file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path).map_err(|e| CrowdError::io(path, e))?;
        let mut writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush().map_err(|e| CrowdError::io(path, e))
    }
}
