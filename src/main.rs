//! `crowd-train`: command-line driver for crowd-counting training runs.

mod cli;

use anyhow::Result;

fn main() -> Result<()> {
    cli::run()
}
