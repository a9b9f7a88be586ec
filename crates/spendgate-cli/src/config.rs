//! CLI configuration
//!
//! Sources, lowest precedence first: `config/default`, `config/local`, the
//! file given with `--config`, then `SPENDGATE__`-prefixed environment
//! variables (`SPENDGATE__ENGINE__WINDOW_SECONDS=3600`).

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use spendgate_core::EngineConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub token: TokenSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The in-memory token ledger the CLI runs against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSettings {
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Unix time the manual clock starts at
    #[serde(default = "default_start_time")]
    pub start_time: u64,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            start_time: default_start_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_symbol() -> String {
    "USDC".to_string()
}

fn default_start_time() -> u64 {
    1_700_000_000
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl CliConfig {
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();
        Self::load_from(Path::new("."), config_path)
    }

    /// Load with `config/default` and `config/local` resolved under `root`
    fn load_from(root: &Path, config_path: Option<&str>) -> anyhow::Result<Self> {
        let defaults = root.join("config/default");
        let local = root.join("config/local");

        let mut builder = config::Config::builder()
            .add_source(config::File::from(defaults).required(false))
            .add_source(config::File::from(local).required(false));

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("SPENDGATE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let cli_config: CliConfig = builder
            .build()?
            .try_deserialize()
            .context("invalid configuration")?;
        cli_config
            .engine
            .validate()
            .context("invalid engine configuration")?;

        Ok(cli_config)
    }
}
