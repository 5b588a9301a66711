//! Scalar metrics sinks.
//!
//! Training reports scalars through [`Telemetry`]. With the `dashboard`
//! feature the values are persisted per experiment and served over HTTP;
//! otherwise (or when the dashboard cannot start) they are dropped.

pub mod store;
#[cfg(feature = "dashboard")]
pub mod dashboard;

#[cfg(feature = "dashboard")]
pub use dashboard::DashboardTelemetry;
pub use store::{ExperimentStore, ScalarPoint};

use crate::train::train_config::TrainConfig;

/// Directory under `output_dir` holding persisted experiments.
pub const TELEMETRY_DIR: &str = "telemetry";

pub trait Telemetry {
    fn add_scalar(&mut self, name: &str, value: f64, step: usize);
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn add_scalar(&mut self, _name: &str, _value: f64, _step: usize) {}
}

/// Builds the sink described by `config.telemetry`.
///
/// Never fails: a disabled, unavailable or broken dashboard degrades to
/// [`NoopTelemetry`] with a warning.
pub fn connect(config: &TrainConfig) -> Box<dyn Telemetry> {
    if !config.telemetry.enabled {
        return Box::new(NoopTelemetry);
    }
    start_dashboard(config)
}

#[cfg(feature = "dashboard")]
fn start_dashboard(config: &TrainConfig) -> Box<dyn Telemetry> {
    match DashboardTelemetry::start(config) {
        Ok(dashboard) => Box::new(dashboard),
        Err(e) => {
            tracing::warn!(error = %e, "telemetry dashboard unavailable, continuing without it");
            Box::new(NoopTelemetry)
        }
    }
}

#[cfg(not(feature = "dashboard"))]
fn start_dashboard(_config: &TrainConfig) -> Box<dyn Telemetry> {
    tracing::warn!("built without the `dashboard` feature, telemetry disabled");
    Box::new(NoopTelemetry)
}
