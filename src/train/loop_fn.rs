use std::path::PathBuf;
use std::time::Instant;

use crate::data::augment::augment;
use crate::data::loader::ImageDataLoader;
use crate::error::{CrowdError, Result};
use crate::network::model::Model;
use crate::optim::Optimizer;
use crate::report::{PlainReporter, Reporter, StepReport, ValidationReport};
use crate::telemetry::{NoopTelemetry, Telemetry};
use crate::train::checkpoint::save_checkpoint;
use crate::train::epoch_stats::EpochStats;
use crate::train::rngs::Rngs;
use crate::train::timer::Timer;
use crate::train::train_config::TrainConfig;
use crate::train::validation::{BestModel, ValidationStage};
use crate::train::visualize::save_results;

/// What a finished run produced.
#[derive(Debug, Clone, Default)]
pub struct TrainSummary {
    pub epochs: Vec<EpochStats>,
    /// Checkpoint paths in epoch order.
    pub checkpoints: Vec<PathBuf>,
    /// `(epoch, step)` of every display event.
    pub display_events: Vec<(usize, usize)>,
    pub best: Option<BestModel>,
    pub total_steps: usize,
}

/// Drives epochs `start_step..=end_step` over a loader.
///
/// Each step augments one sample, runs forward and backward, and applies the
/// optimizer. Display, telemetry, checkpoint and validation stages fire on
/// their configured cadences. Any error aborts the run.
pub struct Trainer<'a, M: Model, O: Optimizer> {
    config: &'a TrainConfig,
    model: M,
    optimizer: O,
    rngs: Rngs,
    timer: Timer,
    /// Steps since the last display; spans epoch boundaries like the timer.
    since_display: usize,
    reporter: Box<dyn Reporter + 'a>,
    telemetry: Box<dyn Telemetry + 'a>,
    validation: Option<ValidationStage<'a>>,
}

impl<'a, M: Model, O: Optimizer> Trainer<'a, M, O> {
    pub fn new(config: &'a TrainConfig, model: M, optimizer: O, rngs: Rngs) -> Self {
        Trainer {
            config,
            model,
            optimizer,
            rngs,
            timer: Timer::new(),
            since_display: 0,
            reporter: Box::new(PlainReporter),
            telemetry: Box::new(NoopTelemetry),
            validation: None,
        }
    }

    pub fn with_reporter(mut self, reporter: Box<dyn Reporter + 'a>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Box<dyn Telemetry + 'a>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_validation(mut self, validation: ValidationStage<'a>) -> Self {
        self.validation = Some(validation);
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    pub fn run(&mut self, loader: &ImageDataLoader) -> Result<TrainSummary> {
        let config = self.config;
        config.validate()?;
        let mut summary = TrainSummary::default();

        tracing::info!(
            samples = loader.num_samples(),
            epochs = config.end_step + 1 - config.start_step,
            lr = self.optimizer.learning_rate(),
            "starting training"
        );
        self.timer.tic();
        self.since_display = 0;
        for epoch in config.start_step..=config.end_step {
            let stats = self.run_epoch(epoch, loader, &mut summary)?;
            self.reporter.epoch(&stats);
            summary.epochs.push(stats);
        }
        summary.best = self.validation.as_ref().and_then(|v| v.best().cloned());
        Ok(summary)
    }

    fn run_epoch(&mut self, epoch: usize, loader: &ImageDataLoader, summary: &mut TrainSummary) -> Result<EpochStats> {
        let config = self.config;
        let class_weights = loader.classifier_weights();
        let epoch_start = Instant::now();
        let mut train_loss = 0.0;
        let mut steps = 0;

        for (step, blob) in loader.iter(&mut self.rngs.shuffle).enumerate() {
            let mut blob = blob?;
            augment(&mut blob, &config.augment, &mut self.rngs.augment);

            let density = self.model.forward(&blob, class_weights)?;
            let loss = self.model.loss().ok_or(CrowdError::NoForwardPass)?;
            if !loss.is_finite() || loss < 0.0 {
                return Err(CrowdError::InvalidLoss { epoch, step, loss });
            }
            train_loss += loss;
            steps += 1;
            self.since_display += 1;
            summary.total_steps += 1;

            self.model.zero_grad();
            self.model.backward()?;
            self.optimizer.step(self.model.params_mut());

            if step % config.log_interval == 0 {
                self.telemetry.add_scalar("train_loss_step", loss, summary.total_steps);
            }

            if step % config.disp_interval == 0 {
                let duration = self.timer.toc(false);
                save_results(&blob.image, &blob.gt_density, &density, &config.output_dir)?;
                self.reporter.step(&StepReport {
                    epoch,
                    step,
                    seconds_per_step: duration / self.since_display as f64,
                    gt_count: blob.gt_count(),
                    et_count: density.sum(),
                    running_loss: train_loss,
                });
                summary.display_events.push((epoch, step));
                self.since_display = 0;
                self.timer.tic();
            }
        }

        let checkpoint = save_checkpoint(
            &self.model,
            &config.output_dir,
            &config.method,
            &config.dataset_name,
            epoch,
        )?;
        summary.checkpoints.push(checkpoint.clone());

        let mut stats = EpochStats {
            epoch,
            steps,
            train_loss,
            mean_loss: if steps > 0 { train_loss / steps as f64 } else { 0.0 },
            elapsed_ms: epoch_start.elapsed().as_millis() as u64,
            val_mae: None,
            val_mse: None,
        };

        if let Some(validation) = self.validation.as_mut().filter(|v| v.is_due(epoch)) {
            let (scores, best) = validation.run(&checkpoint)?;
            self.reporter.validation(&ValidationReport { epoch, scores, best });
            self.telemetry.add_scalar("MAE", scores.mae, epoch);
            self.telemetry.add_scalar("MSE", scores.mse, epoch);
            self.telemetry.add_scalar("train_loss", train_loss / loader.num_samples() as f64, epoch);
            stats.val_mae = Some(scores.mae);
            stats.val_mse = Some(scores.mse);
        }

        Ok(stats)
    }
}
