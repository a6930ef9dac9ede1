mod check_config;
mod run;

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use relay_core::RelayConfig;

use crate::error::Result;

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the coordinator and hub until interrupted
    Run(ConfigArgs),
    /// Validate a configuration file and print the effective settings
    CheckConfig(ConfigArgs),
}

#[derive(Args)]
pub(crate) struct ConfigArgs {
    /// Configuration file (default: built-in settings)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
}

impl ConfigArgs {
    fn load(&self) -> Result<RelayConfig> {
        load_config(self.config.as_deref())
    }
}

impl Commands {
    pub(crate) fn execute(self) -> Result<()> {
        match self {
            Self::Run(args) => run::run(&args.load()?),
            Self::CheckConfig(args) => check_config::run(&args.load()?),
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<RelayConfig> {
    match path {
        Some(path) => Ok(RelayConfig::load(path)?),
        None => Ok(RelayConfig::default()),
    }
}
