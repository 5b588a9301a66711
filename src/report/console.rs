use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

use crate::report::{Reporter, StepReport, ValidationReport};
use crate::train::epoch_stats::EpochStats;
use crate::train::train_config::ColorMode;

/// One formatted line per event, no structured fields.
#[derive(Debug, Default)]
pub struct PlainReporter;

impl Reporter for PlainReporter {
    fn step(&mut self, report: &StepReport) {
        tracing::info!("{}", report.log_text());
    }

    fn validation(&mut self, report: &ValidationReport) {
        for line in report.log_lines() {
            tracing::info!("{}", line);
        }
    }
}

/// Same lines, with the values attached as structured fields.
#[derive(Debug, Default)]
pub struct EnrichedReporter;

impl Reporter for EnrichedReporter {
    fn step(&mut self, report: &StepReport) {
        tracing::info!(
            epoch = report.epoch,
            step = report.step,
            gt_cnt = report.gt_count,
            et_cnt = report.et_count,
            "{}",
            report.log_text()
        );
    }

    fn validation(&mut self, report: &ValidationReport) {
        let [current, best] = report.log_lines();
        tracing::info!(epoch = report.epoch, mae = report.scores.mae, mse = report.scores.mse, "{}", current);
        tracing::info!(best_model = %report.best.model, "{}", best);
    }

    fn epoch(&mut self, stats: &EpochStats) {
        tracing::debug!(
            epoch = stats.epoch,
            steps = stats.steps,
            mean_loss = stats.mean_loss,
            elapsed_ms = stats.elapsed_ms,
            "epoch finished"
        );
    }
}

/// Resolves a colour mode against the environment.
pub fn use_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal(),
    }
}

pub fn select_reporter(mode: ColorMode) -> Box<dyn Reporter> {
    if use_color(mode) {
        Box::new(EnrichedReporter)
    } else {
        Box::new(PlainReporter)
    }
}

/// Installs the global `tracing` subscriber. `RUST_LOG` overrides the
/// default `crowd_mtl=info` filter.
pub fn init_tracing(mode: ColorMode) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("crowd_mtl=info,crowd_train=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(use_color(mode))
        .with_target(false)
        .try_init();
}
