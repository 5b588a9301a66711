pub mod checkpoint;
pub mod epoch_stats;
pub mod loop_fn;
pub mod rngs;
pub mod timer;
pub mod train_config;
pub mod validation;
pub mod visualize;

pub use checkpoint::{checkpoint_file_name, save_checkpoint};
pub use epoch_stats::EpochStats;
pub use loop_fn::{TrainSummary, Trainer};
pub use rngs::Rngs;
pub use timer::Timer;
pub use train_config::TrainConfig;
pub use validation::{evaluate_model, CheckpointEvaluator, Evaluator, Scores, ValidationStage};
