//! Spendgate Core - policy-constrained delegated payments
//!
//! An owner custodies funds with the engine and delegates bounded spending
//! authority to an agent identity. Every spend is checked against the agent's
//! policy: an active flag, a per-transaction cap, a rolling daily cap and a
//! merchant allow-list.
//!
//! # Components
//!
//! - **AccessControl** ([`access`]): owner/delegate guards and the reentrancy latch
//! - **AgentRegistry** ([`registry`]): agent creation, delegate binding, limits
//! - **WhitelistStore** ([`whitelist`]): per-agent merchant allow-list
//! - **FundingManager** ([`funding`]): deposit, withdraw, emergency withdraw
//! - **PaymentAuthorizer** ([`payment`]): the authorization and settlement pipeline
//! - **SubscriptionScheduler** ([`subscription`]): recurring payments over the same pipeline
//!
//! # Atomicity
//!
//! Each operation runs in a frame that snapshots ledger state, marks the event
//! log and opens a token savepoint. Any error restores all three, so callers
//! observe either the full effect of an operation or none of it.
//!
//! # Reentrancy
//!
//! Funds-moving operations share one latch. Merchant code invoked during a
//! pull payment can call back into the engine, but any guarded operation it
//! attempts fails with `ReentrantCall`. The debit is committed before the
//! merchant runs in any case.

pub mod access;
pub mod call;
pub mod clock;
pub mod config;
pub mod engine;
pub mod funding;
pub mod merchant;
pub mod payment;
pub mod registry;
pub mod service;
pub mod state;
pub mod subscription;
pub mod whitelist;

pub use call::{CallOutcome, EngineCall};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use engine::PaymentEngine;
pub use merchant::{
    decode_invoice_id, encode_invoice_payload, CallbackHost, InvoicePullMerchant,
    InvoiceReceipt, MerchantEndpoint, MerchantError, PaymentNotice,
};
pub use service::{EngineService, EventPublisher, MemoryPublisher, PublishError, TracingPublisher};
pub use state::LedgerState;

pub use spendgate_token::{InMemoryToken, TokenError, TokenLedger};
pub use spendgate_types::*;
