//! Append-only ledger events
//!
//! Each event carries the full set of values its operation mutated, so an
//! external indexer can rebuild ledger state without reading it back.

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::{AgentId, SubscriptionId, Timestamp};

/// Events emitted by committed operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum LedgerEvent {
    AgentCreated {
        agent_id: AgentId,
        owner: Address,
        delegate: Address,
    },
    AgentUpdated {
        agent_id: AgentId,
        previous_delegate: Address,
        delegate: Address,
    },
    AgentPaused {
        agent_id: AgentId,
        paused: bool,
    },
    PolicyLimitsUpdated {
        agent_id: AgentId,
        daily_limit: U256,
        per_tx_limit: U256,
        spent_today: U256,
    },
    MerchantWhitelistUpdated {
        agent_id: AgentId,
        merchant: Address,
        allowed: bool,
    },
    Deposit {
        agent_id: AgentId,
        from: Address,
        amount: U256,
        new_balance: U256,
    },
    Withdraw {
        agent_id: AgentId,
        to: Address,
        amount: U256,
        new_balance: U256,
    },
    EmergencyWithdraw {
        agent_id: AgentId,
        to: Address,
        amount: U256,
    },
    AgentPayment {
        agent_id: AgentId,
        merchant: Address,
        amount: U256,
        payload: Bytes,
    },
    DailySpendReset {
        agent_id: AgentId,
        window_start: Timestamp,
    },
    SubscriptionCreated {
        agent_id: AgentId,
        subscription_id: SubscriptionId,
        merchant: Address,
        amount_per_period: U256,
        period_seconds: u64,
        next_execution_at: Timestamp,
    },
    SubscriptionExecuted {
        agent_id: AgentId,
        subscription_id: SubscriptionId,
        amount: U256,
        next_execution_at: Timestamp,
    },
    SubscriptionStatusChanged {
        agent_id: AgentId,
        subscription_id: SubscriptionId,
        active: bool,
    },
}

impl LedgerEvent {
    /// The agent this event concerns; every event is scoped to one
    pub fn agent_id(&self) -> AgentId {
        match self {
            Self::AgentCreated { agent_id, .. }
            | Self::AgentUpdated { agent_id, .. }
            | Self::AgentPaused { agent_id, .. }
            | Self::PolicyLimitsUpdated { agent_id, .. }
            | Self::MerchantWhitelistUpdated { agent_id, .. }
            | Self::Deposit { agent_id, .. }
            | Self::Withdraw { agent_id, .. }
            | Self::EmergencyWithdraw { agent_id, .. }
            | Self::AgentPayment { agent_id, .. }
            | Self::DailySpendReset { agent_id, .. }
            | Self::SubscriptionCreated { agent_id, .. }
            | Self::SubscriptionExecuted { agent_id, .. }
            | Self::SubscriptionStatusChanged { agent_id, .. } => *agent_id,
        }
    }

    /// Event name as indexers see it
    pub fn name(&self) -> &'static str {
        match self {
            Self::AgentCreated { .. } => "AgentCreated",
            Self::AgentUpdated { .. } => "AgentUpdated",
            Self::AgentPaused { .. } => "AgentPaused",
            Self::PolicyLimitsUpdated { .. } => "PolicyLimitsUpdated",
            Self::MerchantWhitelistUpdated { .. } => "MerchantWhitelistUpdated",
            Self::Deposit { .. } => "Deposit",
            Self::Withdraw { .. } => "Withdraw",
            Self::EmergencyWithdraw { .. } => "EmergencyWithdraw",
            Self::AgentPayment { .. } => "AgentPayment",
            Self::DailySpendReset { .. } => "DailySpendReset",
            Self::SubscriptionCreated { .. } => "SubscriptionCreated",
            Self::SubscriptionExecuted { .. } => "SubscriptionExecuted",
            Self::SubscriptionStatusChanged { .. } => "SubscriptionStatusChanged",
        }
    }
}

/// An event with its position in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Monotonically increasing across the engine's lifetime
    pub sequence: u64,
    pub emitted_at: Timestamp,
    #[serde(flatten)]
    pub event: LedgerEvent,
}
