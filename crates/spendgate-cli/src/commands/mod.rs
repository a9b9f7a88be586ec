//! CLI command implementations

pub mod demo;
pub mod run;

use std::sync::Arc;

use spendgate_core::{InMemoryToken, ManualClock, PaymentEngine, Timestamp};

use crate::config::CliConfig;

/// A fresh engine over an empty in-memory token, driven by a manual clock
pub fn build_engine(
    config: &CliConfig,
) -> anyhow::Result<(PaymentEngine<InMemoryToken>, Arc<ManualClock>)> {
    let clock = Arc::new(ManualClock::new(Timestamp(config.token.start_time)));
    let engine = PaymentEngine::new(
        config.engine.clone(),
        InMemoryToken::new(config.token.symbol.clone()),
        clock.clone(),
    )?;
    Ok((engine, clock))
}
