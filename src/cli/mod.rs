pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;

#[derive(Parser)]
#[command(name = "davit")]
#[command(version)]
#[command(about = "Deploy build artifacts to hosting platforms")]
#[command(
    long_about = "Deploy build artifacts to hosting platforms.\n\nOne tool, many providers, guaranteed cleanup: your working tree is\nstashed before the deploy and restored afterwards, even on failure."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a deployment with the configured provider
    Deploy {
        /// Path to the deploy configuration file
        #[arg(short, long, default_value = ".davit.yaml")]
        config: PathBuf,

        /// Override a configuration option (repeatable)
        #[arg(short = 'o', long = "opt", value_name = "KEY=VALUE")]
        opts: Vec<String>,

        /// Deploy with a specific provider, overriding the config file
        #[arg(short, long)]
        provider: Option<String>,
    },

    /// List supported providers
    Providers,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Deploy {
                config,
                opts,
                provider,
            } => commands::deploy::execute(&config, &opts, provider).await,
            Commands::Providers => commands::providers::execute(),
        }
    }
}
