//! Agent and subscription records

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{AgentId, Amount, Policy, Timestamp};

/// A delegated spender bound to its owner and policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: AgentId,
    /// Principal with administrative rights over policy, funds and whitelist
    pub owner: Address,
    /// Identity authorized to trigger spends
    pub delegate: Address,
    pub policy: Policy,
}

impl Agent {
    pub fn is_owner(&self, who: Address) -> bool {
        self.owner == who
    }

    pub fn is_delegate(&self, who: Address) -> bool {
        self.delegate == who
    }
}

/// A recurring payment authorization, executed by anyone once due
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub merchant: Address,
    pub amount_per_period: Amount,
    pub period_seconds: u64,
    pub next_execution_at: Timestamp,
    pub active: bool,
}

impl Subscription {
    pub fn is_due(&self, now: Timestamp) -> bool {
        now >= self.next_execution_at
    }
}
