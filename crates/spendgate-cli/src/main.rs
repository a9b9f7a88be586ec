//! Spendgate CLI - drive a delegated payment engine from the terminal
//!
//! Every command runs against an in-memory token ledger and a manual clock,
//! so runs are reproducible end to end.
//!
//! # Quick Start
//!
//! ```bash
//! # Walk through the reference scenarios
//! spendgate demo
//!
//! # Replay a script of calls, printing outcomes and events as JSON
//! spendgate run crates/spendgate-cli/scripts/daily_window.json
//!
//! # Show the effective configuration
//! spendgate config
//! ```

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;
mod display;

use commands::{demo, run};
use crate::config::{CliConfig, LoggingConfig};

/// Spendgate CLI - policy-constrained delegated payments
#[derive(Parser)]
#[command(name = "spendgate")]
#[command(author = "Spendgate Contributors")]
#[command(version)]
#[command(about = "Bounded spending authority for delegated agents", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (TOML, JSON or YAML)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log format override (pretty, json)
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk through the reference payment scenarios
    Demo,

    /// Execute a JSON script of steps against a fresh engine
    Run {
        /// Path to the script
        script: String,

        /// Continue past failed calls instead of stopping
        #[arg(long)]
        keep_going: bool,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cli_config = CliConfig::load(cli.config.as_deref())?;
    if let Some(format) = cli.log_format {
        cli_config.logging.format = format;
    }
    init_logging(&cli_config.logging)?;

    match cli.command {
        Commands::Demo => demo::run_demo(&cli_config)?,
        Commands::Run { script, keep_going } => {
            run::run_script(&cli_config, &script, keep_going).await?
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&cli_config)?);
        }
    }

    Ok(())
}

/// Initialize logging; `RUST_LOG` takes precedence over the configured level
fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            subscriber
                .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
                .try_init()?;
        }
        _ => {
            subscriber
                .with(fmt::layer().pretty().with_target(true).with_writer(std::io::stderr))
                .try_init()?;
        }
    }

    Ok(())
}
