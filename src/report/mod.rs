//! Console reporting of training progress.
//!
//! Two strategies share one interface: [`PlainReporter`] writes a single
//! human-readable line per event, [`EnrichedReporter`] adds structured
//! fields for coloured, machine-filterable output. The choice is made once
//! at startup by [`select_reporter`].

pub mod console;

pub use console::{init_tracing, select_reporter, use_color, EnrichedReporter, PlainReporter};

use crate::train::epoch_stats::EpochStats;
use crate::train::validation::{BestModel, Scores};

/// One display-cadence event.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub epoch: usize,
    pub step: usize,
    /// Wall time per step since the previous display.
    pub seconds_per_step: f64,
    pub gt_count: f64,
    pub et_count: f64,
    /// Running epoch loss including this step.
    pub running_loss: f64,
}

impl StepReport {
    pub fn log_text(&self) -> String {
        format!(
            "epoch: {:4}, step {:4}, Time: {:.4}s, gt_cnt: {:4.1}, et_cnt: {:4.1}",
            self.epoch, self.step, self.seconds_per_step, self.gt_count, self.et_count
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub epoch: usize,
    pub scores: Scores,
    pub best: BestModel,
}

impl ValidationReport {
    pub fn log_lines(&self) -> [String; 2] {
        [
            format!("EPOCH: {}, MAE: {:.1}, MSE: {:.1}", self.epoch, self.scores.mae, self.scores.mse),
            format!(
                "BEST MAE: {:.1}, BEST MSE: {:.1}, BEST MODEL: {}",
                self.best.mae, self.best.mse, self.best.model
            ),
        ]
    }
}

/// Receives training progress events.
pub trait Reporter {
    fn step(&mut self, report: &StepReport);

    fn validation(&mut self, report: &ValidationReport);

    fn epoch(&mut self, _stats: &EpochStats) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_line_format() {
        let r = StepReport { epoch: 3, step: 500, seconds_per_step: 0.01234, gt_count: 12.34, et_count: 9.0, running_loss: 0.5 };
        assert_eq!(r.log_text(), "epoch:    3, step  500, Time: 0.0123s, gt_cnt: 12.3, et_cnt:  9.0");
    }

    #[test]
    fn validation_lines() {
        let r = ValidationReport {
            epoch: 2,
            scores: Scores { mae: 101.26, mse: 150.0 },
            best: BestModel { mae: 99.0, mse: 140.04, model: "cmtl_shtechA_1.json".into() },
        };
        let [a, b] = r.log_lines();
        assert_eq!(a, "EPOCH: 2, MAE: 101.3, MSE: 150.0");
        assert_eq!(b, "BEST MAE: 99.0, BEST MSE: 140.0, BEST MODEL: cmtl_shtechA_1.json");
    }
}
