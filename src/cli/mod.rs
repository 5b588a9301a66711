pub mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use crowd_mtl::train::train_config::{ColorMode, OptimizerKind};

#[derive(Parser)]
#[command(name = "crowd-train")]
#[command(about = "Train and evaluate a multi-task crowd-counting network", long_about = None)]
struct Cli {
    /// Console colour; overrides `log.color` from the config
    #[arg(long, value_enum, global = true)]
    color: Option<ColorArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ColorArg {
    Auto,
    Always,
    Never,
}

impl From<ColorArg> for ColorMode {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => ColorMode::Auto,
            ColorArg::Always => ColorMode::Always,
            ColorArg::Never => ColorMode::Never,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OptimizerArg {
    Adam,
    Sgd,
}

impl From<OptimizerArg> for OptimizerKind {
    fn from(arg: OptimizerArg) -> Self {
        match arg {
            OptimizerArg::Adam => OptimizerKind::Adam,
            OptimizerArg::Sgd => OptimizerKind::Sgd,
        }
    }
}

/// Command-line overrides applied on top of the config file.
#[derive(clap::Args, Default)]
pub struct TrainOverrides {
    #[arg(long)]
    output_dir: Option<PathBuf>,
    #[arg(long)]
    start_step: Option<usize>,
    #[arg(long)]
    end_step: Option<usize>,
    #[arg(long)]
    learning_rate: Option<f64>,
    #[arg(long, value_enum)]
    optimizer: Option<OptimizerArg>,
    #[arg(long)]
    seed: Option<u64>,
    /// Draw the seed from OS entropy
    #[arg(long, conflicts_with = "seed")]
    no_seed: bool,
    #[arg(long)]
    disp_interval: Option<usize>,
    /// Pool ground truth to a quarter of the image size
    #[arg(long)]
    gt_downsample: bool,
    /// Decode samples lazily instead of at startup
    #[arg(long)]
    no_preload: bool,
    /// Score checkpoints on the validation split
    #[arg(long)]
    validate: bool,
    /// Start the telemetry dashboard
    #[arg(long)]
    dashboard: bool,
    #[arg(long)]
    exp_name: Option<String>,
    #[arg(long)]
    save_exp_name: Option<String>,
    #[arg(long)]
    remove_all_log: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a training job
    Train {
        /// JSON config file; defaults are used for missing fields
        #[arg(long)]
        config: Option<PathBuf>,
        #[command(flatten)]
        overrides: TrainOverrides,
    },
    /// Score a saved checkpoint on a dataset
    Eval {
        #[arg(long)]
        checkpoint: PathBuf,
        /// Image directory
        #[arg(long)]
        images: PathBuf,
        /// Ground-truth CSV directory
        #[arg(long)]
        gt: PathBuf,
        /// Config supplying the model spec for checkpoints saved without one
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the default config as JSON
    Config,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let color = cli.color.map(ColorMode::from);

    match cli.command {
        Commands::Train { config, overrides } => commands::train(config, overrides, color),
        Commands::Eval { checkpoint, images, gt, config } => commands::eval(checkpoint, images, gt, config, color),
        Commands::Config => commands::print_default_config(),
    }
}
