//! Error types for Spendgate
//!
//! Every error is fatal to the current operation only. The engine evaluates its
//! checks before mutating anything, and whatever it did commit before a later
//! failure is rolled back by the execution frame.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AgentId, SubscriptionId, Timestamp};

/// Result type for Spendgate operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Spendgate error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    // ========================================================================
    // Access Errors
    // ========================================================================

    /// No agent record under this id
    #[error("Agent {agent_id} not found")]
    AgentNotFound { agent_id: AgentId },

    /// Caller is not the agent's owner
    #[error("Caller {caller} is not the owner of {agent_id}")]
    NotAgentOwner { agent_id: AgentId, caller: Address },

    /// Caller is not the agent's delegate
    #[error("Caller {caller} is not the delegate of {agent_id}")]
    NotAgent { agent_id: AgentId, caller: Address },

    /// A guarded entry point was entered while another one is still running
    #[error("Reentrant call rejected")]
    ReentrantCall,

    // ========================================================================
    // Policy Errors
    // ========================================================================

    /// Policy is paused
    #[error("Policy of {agent_id} is inactive")]
    PolicyInactive { agent_id: AgentId },

    /// Merchant is not on the agent's whitelist
    #[error("Merchant {merchant} is not whitelisted for {agent_id}")]
    MerchantNotAllowed { agent_id: AgentId, merchant: Address },

    /// Amount exceeds the per-transaction cap
    #[error("Amount {amount} exceeds per-transaction limit {limit}")]
    PerTxLimitExceeded { amount: U256, limit: U256 },

    /// Amount would push the window's spend past the daily cap
    #[error("Spend {spent} + {amount} exceeds daily limit {limit}")]
    DailyLimitExceeded { spent: U256, amount: U256, limit: U256 },

    // ========================================================================
    // Funds Errors
    // ========================================================================

    /// Custodied balance is too small
    #[error("Insufficient balance for {agent_id}: requested {requested}, available {available}")]
    InsufficientBalance {
        agent_id: AgentId,
        requested: U256,
        available: U256,
    },

    /// The token ledger or merchant code refused the movement
    #[error("External transfer failed: {reason}")]
    ExternalTransferFailed { reason: String },

    /// Checked arithmetic would wrap
    #[error("Arithmetic overflow in {context}")]
    ArithmeticOverflow { context: &'static str },

    // ========================================================================
    // Input Errors
    // ========================================================================

    /// Null identity where a principal is required
    #[error("Invalid address: {field} must not be the null identity")]
    InvalidAddress { field: &'static str },

    /// Zero amount, or a subscription period below the minimum granularity
    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    /// Limits are zero or per-transaction exceeds daily
    #[error("Invalid limits: daily {daily_limit}, per-transaction {per_tx_limit}")]
    InvalidLimits { daily_limit: U256, per_tx_limit: U256 },

    // ========================================================================
    // Subscription Errors
    // ========================================================================

    /// No subscription under this id for the agent
    #[error("Subscription {subscription_id} of {agent_id} not found")]
    SubscriptionNotFound {
        agent_id: AgentId,
        subscription_id: SubscriptionId,
    },

    /// Subscription is deactivated
    #[error("Subscription {subscription_id} of {agent_id} is inactive")]
    SubscriptionInactive {
        agent_id: AgentId,
        subscription_id: SubscriptionId,
    },

    /// Subscription period has not come due yet
    #[error("Subscription {subscription_id} of {agent_id} is not due until {next_execution_at}")]
    SubscriptionNotDue {
        agent_id: AgentId,
        subscription_id: SubscriptionId,
        next_execution_at: Timestamp,
    },
}

/// Fieldless discriminant of [`EngineError`], for callers that only match on kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    AgentNotFound,
    NotAgentOwner,
    NotAgent,
    ReentrantCall,
    PolicyInactive,
    MerchantNotAllowed,
    PerTxLimitExceeded,
    DailyLimitExceeded,
    InsufficientBalance,
    ExternalTransferFailed,
    ArithmeticOverflow,
    InvalidAddress,
    InvalidAmount,
    InvalidLimits,
    SubscriptionNotFound,
    SubscriptionInactive,
    SubscriptionNotDue,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AgentNotFound { .. } => ErrorKind::AgentNotFound,
            Self::NotAgentOwner { .. } => ErrorKind::NotAgentOwner,
            Self::NotAgent { .. } => ErrorKind::NotAgent,
            Self::ReentrantCall => ErrorKind::ReentrantCall,
            Self::PolicyInactive { .. } => ErrorKind::PolicyInactive,
            Self::MerchantNotAllowed { .. } => ErrorKind::MerchantNotAllowed,
            Self::PerTxLimitExceeded { .. } => ErrorKind::PerTxLimitExceeded,
            Self::DailyLimitExceeded { .. } => ErrorKind::DailyLimitExceeded,
            Self::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Self::ExternalTransferFailed { .. } => ErrorKind::ExternalTransferFailed,
            Self::ArithmeticOverflow { .. } => ErrorKind::ArithmeticOverflow,
            Self::InvalidAddress { .. } => ErrorKind::InvalidAddress,
            Self::InvalidAmount { .. } => ErrorKind::InvalidAmount,
            Self::InvalidLimits { .. } => ErrorKind::InvalidLimits,
            Self::SubscriptionNotFound { .. } => ErrorKind::SubscriptionNotFound,
            Self::SubscriptionInactive { .. } => ErrorKind::SubscriptionInactive,
            Self::SubscriptionNotDue { .. } => ErrorKind::SubscriptionNotDue,
        }
    }

    pub fn external(reason: impl Into<String>) -> Self {
        Self::ExternalTransferFailed {
            reason: reason.into(),
        }
    }

    pub fn invalid_amount(message: impl Into<String>) -> Self {
        Self::InvalidAmount {
            message: message.into(),
        }
    }
}
