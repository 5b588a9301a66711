use std::path::PathBuf;

use anyhow::{Context, Result};

use crowd_mtl::data::loader::{ImageDataLoader, LoaderOptions};
use crowd_mtl::network::CrowdCounter;
use crowd_mtl::optim::{Adam, Optimizer, Sgd};
use crowd_mtl::report::{init_tracing, select_reporter};
use crowd_mtl::telemetry;
use crowd_mtl::train::train_config::{ColorMode, OptimizerKind, TrainConfig};
use crowd_mtl::train::{evaluate_model, CheckpointEvaluator, Rngs, Trainer, ValidationStage};

use super::TrainOverrides;

fn load_config(path: Option<&PathBuf>) -> Result<TrainConfig> {
    match path {
        Some(path) => TrainConfig::load_json(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(TrainConfig::default()),
    }
}

fn apply_overrides(config: &mut TrainConfig, o: TrainOverrides) {
    if let Some(dir) = o.output_dir {
        config.output_dir = dir;
    }
    if let Some(v) = o.start_step {
        config.start_step = v;
    }
    if let Some(v) = o.end_step {
        config.end_step = v;
    }
    if let Some(v) = o.learning_rate {
        config.learning_rate = v;
    }
    if let Some(v) = o.optimizer {
        config.optimizer = v.into();
    }
    if let Some(v) = o.disp_interval {
        config.disp_interval = v;
    }
    if o.seed.is_some() {
        config.seed = o.seed;
    }
    if o.no_seed {
        config.seed = None;
    }
    config.loader.gt_downsample |= o.gt_downsample;
    if o.no_preload {
        config.loader.pre_load = false;
    }
    config.validation.enabled |= o.validate;
    config.telemetry.enabled |= o.dashboard;
    if o.exp_name.is_some() {
        config.telemetry.exp_name = o.exp_name;
    }
    if o.save_exp_name.is_some() {
        config.telemetry.save_exp_name = o.save_exp_name;
    }
    config.telemetry.remove_all_log |= o.remove_all_log;
}

pub fn train(config_path: Option<PathBuf>, overrides: TrainOverrides, color: Option<ColorMode>) -> Result<()> {
    let mut config = load_config(config_path.as_ref())?;
    apply_overrides(&mut config, overrides);
    if let Some(color) = color {
        config.log.color = color;
    }
    init_tracing(config.log.color);
    config.validate().context("invalid training config")?;

    let mut rngs = Rngs::new(config.seed);
    let model = CrowdCounter::new(config.model_spec(), &mut rngs.init).context("failed to build model")?;
    tracing::info!(params = model.num_params(), seed = ?config.seed, "model ready");

    let train_loader = ImageDataLoader::new(&config.train_path, &config.train_gt_path, config.loader)
        .with_context(|| format!("failed to load training data from {}", config.train_path.display()))?;
    let val_loader = if config.validation.enabled {
        Some(
            ImageDataLoader::new(&config.val_path, &config.val_gt_path, config.val_loader())
                .with_context(|| format!("failed to load validation data from {}", config.val_path.display()))?,
        )
    } else {
        None
    };

    match config.optimizer {
        OptimizerKind::Adam => {
            let optimizer = Adam::new(config.learning_rate);
            run_training(&config, model, optimizer, rngs, &train_loader, val_loader.as_ref())
        }
        OptimizerKind::Sgd => {
            let optimizer = Sgd::new(config.learning_rate, config.momentum);
            run_training(&config, model, optimizer, rngs, &train_loader, val_loader.as_ref())
        }
    }
}

fn run_training<O: Optimizer>(
    config: &TrainConfig,
    model: CrowdCounter,
    optimizer: O,
    rngs: Rngs,
    train_loader: &ImageDataLoader,
    val_loader: Option<&ImageDataLoader>,
) -> Result<()> {
    let mut trainer = Trainer::new(config, model, optimizer, rngs)
        .with_reporter(select_reporter(config.log.color))
        .with_telemetry(telemetry::connect(config));
    if let Some(loader) = val_loader {
        let evaluator = CheckpointEvaluator::new(config.model_spec());
        trainer = trainer.with_validation(ValidationStage::new(config.validation.every, Box::new(evaluator), loader));
    }

    let summary = trainer.run(train_loader).context("training failed")?;
    if let Some(best) = &summary.best {
        tracing::info!(mae = best.mae, mse = best.mse, model = %best.model, "best validation model");
    }
    tracing::info!(
        epochs = summary.epochs.len(),
        steps = summary.total_steps,
        checkpoints = summary.checkpoints.len(),
        "training finished"
    );
    Ok(())
}

pub fn eval(
    checkpoint: PathBuf,
    images: PathBuf,
    gt: PathBuf,
    config_path: Option<PathBuf>,
    color: Option<ColorMode>,
) -> Result<()> {
    let config = load_config(config_path.as_ref())?;
    init_tracing(color.unwrap_or(config.log.color));

    let evaluator = CheckpointEvaluator::new(config.model_spec());
    let mut model = evaluator
        .load_model(&checkpoint)
        .with_context(|| format!("failed to load checkpoint {}", checkpoint.display()))?;
    let options = LoaderOptions {
        shuffle: false,
        gt_downsample: model.model_spec().downsample > 1,
        num_classes: model.model_spec().num_classes,
        ..config.loader
    };
    let loader = ImageDataLoader::new(&images, &gt, options)
        .with_context(|| format!("failed to load data from {}", images.display()))?;
    let scores = evaluate_model(&mut model, &loader).context("evaluation failed")?;

    tracing::info!(samples = loader.num_samples(), "evaluated {}", checkpoint.display());
    println!("MAE: {:.1}, MSE: {:.1}", scores.mae, scores.mse);
    Ok(())
}

pub fn print_default_config() -> Result<()> {
    let json = serde_json::to_string_pretty(&TrainConfig::default())?;
    println!("{}", json);
    Ok(())
}
