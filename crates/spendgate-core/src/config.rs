//! Engine configuration

use serde::{Deserialize, Serialize};
use spendgate_types::{Address, AddressExt, DAY_SECONDS};
use thiserror::Error;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// The engine's own account on the token ledger; every agent balance is held here
    #[serde(default = "default_custody")]
    pub custody: Address,

    /// Length of the rolling spend window
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,

    /// Shortest allowed subscription period
    #[serde(default = "default_min_subscription_period")]
    pub min_subscription_period: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("custody must not be the null identity")]
    NullCustody,

    #[error("window_seconds must be greater than zero")]
    ZeroWindow,

    #[error("min_subscription_period must be greater than zero")]
    ZeroSubscriptionPeriod,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.custody.is_null() {
            return Err(ConfigError::NullCustody);
        }
        if self.window_seconds == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.min_subscription_period == 0 {
            return Err(ConfigError::ZeroSubscriptionPeriod);
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            custody: default_custody(),
            window_seconds: default_window_seconds(),
            min_subscription_period: default_min_subscription_period(),
        }
    }
}

fn default_custody() -> Address {
    Address::repeat_byte(0xcc)
}

fn default_window_seconds() -> u64 {
    DAY_SECONDS
}

fn default_min_subscription_period() -> u64 {
    3_600
}
