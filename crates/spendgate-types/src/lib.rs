//! Spendgate Types - Canonical domain types for delegated agent payments
//!
//! This crate contains all foundational types for Spendgate with zero dependencies
//! on other spendgate crates. It defines:
//!
//! - Identity types (Address, AgentId, SubscriptionId)
//! - Amounts (unsigned 256-bit) and timestamps
//! - The Policy value and its daily-window accounting
//! - Agent and Subscription records
//! - The append-only event model
//! - The error taxonomy shared by every engine operation
//!
//! # Invariants
//!
//! These types carry the ledger invariants the engine must preserve:
//!
//! 1. `per_tx_limit <= daily_limit`, both strictly positive
//! 2. `spent_today <= daily_limit` after every committed operation
//! 3. Balances never go negative (checked arithmetic only)
//! 4. Whitelists deny by default

pub mod identity;
pub mod time;
pub mod policy;
pub mod agent;
pub mod event;
pub mod error;

pub use identity::*;
pub use time::*;
pub use policy::*;
pub use agent::*;
pub use event::*;
pub use error::*;

pub use alloy_primitives::{Address, Bytes, U256};

/// Funds, limits and spend figures are all unsigned 256-bit integers in token base units.
pub type Amount = U256;

/// Length of the rolling spend window, in seconds
pub const DAY_SECONDS: u64 = 86_400;
