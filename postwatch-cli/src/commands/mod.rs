pub mod check;
pub mod rules;
pub mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use postwatch_core::{config, Settings};

/// `--config` shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Config file (default: ./config.yml, then <config dir>/postwatch/config.yml).
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl ConfigArgs {
    /// Load the file and apply `POSTWATCH_*` environment overrides.
    pub fn load(&self) -> Result<(PathBuf, Settings)> {
        config::load(self.config.as_deref()).context("failed to load configuration")
    }
}
