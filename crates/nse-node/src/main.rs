//! # NSE Node
//!
//! Entry point of a network size estimation node.
//!
//! ## Commands
//!
//! - `run` - connect to the relay, serve the control API, join every round
//! - `new` - write a default configuration file
//! - `validate` (alias `config`) - check a configuration file
//! - `generate` - create the node's 4096-bit RSA identity

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use nse_node::{generate_key, init_logging, load_private_key, open_ledger, NodeConfig, NodeRuntime};

/// Network size estimation node
#[derive(Parser, Debug)]
#[command(name = "nse-node")]
#[command(about = "Estimates the size of a peer-to-peer network from flooded proximity claims")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = nse_node::DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the node until Ctrl+C
    Run,

    /// Write a default configuration file
    New {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Load and validate the configuration, then print it
    #[command(alias = "config")]
    Validate,

    /// Generate the RSA key configured as `nse.private_key`
    Generate {
        /// Overwrite an existing key
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run => run(&cli.config),
        Command::New { force } => {
            NodeConfig::write_default(&cli.config, force)?;
            println!("Wrote default configuration to {}", cli.config.display());
            Ok(())
        }
        Command::Validate => {
            let config = NodeConfig::load(&cli.config)?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
        Command::Generate { force } => {
            let config = NodeConfig::load(&cli.config)?;
            generate_key(&config.nse.private_key, force)?;
            println!("Wrote private key to {}", config.nse.private_key.display());
            Ok(())
        }
    }
}

fn run(config_path: &Path) -> Result<()> {
    let config = NodeConfig::load(config_path)
        .with_context(|| format!("Cannot load configuration from {}", config_path.display()))?;
    init_logging(&config.logging)?;

    let key = load_private_key(&config.nse.private_key)?;
    let ledger = open_ledger(&config)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Cannot build async runtime")?;

    runtime.block_on(async move {
        let mut node = NodeRuntime::new(config, key, ledger);
        node.start().await?;

        info!("Node is running. Press Ctrl+C to stop.");
        tokio::signal::ctrl_c().await?;

        node.shutdown().await;
        Ok(())
    })
}
