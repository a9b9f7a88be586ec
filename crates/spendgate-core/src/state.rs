//! Ledger state arena
//!
//! Every entity is keyed by an opaque numeric id and owned by its agent's
//! record. The whole arena is `Clone` so the execution frame can snapshot it.

use std::collections::{BTreeMap, HashMap, HashSet};

use spendgate_types::{
    Address, AddressExt, Agent, AgentId, EngineError, Result, Subscription, SubscriptionId, U256,
};

#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    agents: BTreeMap<AgentId, Agent>,
    balances: HashMap<AgentId, U256>,
    whitelist: HashSet<(AgentId, Address)>,
    subscriptions: BTreeMap<(AgentId, SubscriptionId), Subscription>,
    subscription_counters: HashMap<AgentId, u64>,
    last_agent_id: u64,
    next_event_sequence: u64,
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Agents
    // ========================================================================

    /// Reserve the next agent id. Ids start at 1 and are never reused.
    pub fn allocate_agent_id(&mut self) -> Result<AgentId> {
        let next = self
            .last_agent_id
            .checked_add(1)
            .ok_or(EngineError::ArithmeticOverflow {
                context: "agent id allocation",
            })?;
        self.last_agent_id = next;
        Ok(AgentId::new(next))
    }

    pub fn insert_agent(&mut self, agent: Agent) {
        self.agents.insert(agent.agent_id, agent);
    }

    /// Look up an agent. A null owner is the existence sentinel.
    pub fn agent(&self, agent_id: AgentId) -> Result<&Agent> {
        self.agents
            .get(&agent_id)
            .filter(|agent| !agent.owner.is_null())
            .ok_or(EngineError::AgentNotFound { agent_id })
    }

    pub fn agent_mut(&mut self, agent_id: AgentId) -> Result<&mut Agent> {
        self.agents
            .get_mut(&agent_id)
            .filter(|agent| !agent.owner.is_null())
            .ok_or(EngineError::AgentNotFound { agent_id })
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    // ========================================================================
    // Balances
    // ========================================================================

    pub fn balance(&self, agent_id: AgentId) -> U256 {
        self.balances.get(&agent_id).copied().unwrap_or(U256::ZERO)
    }

    pub fn credit(&mut self, agent_id: AgentId, amount: U256) -> Result<U256> {
        let new_balance = self
            .balance(agent_id)
            .checked_add(amount)
            .ok_or(EngineError::ArithmeticOverflow {
                context: "balance credit",
            })?;
        self.balances.insert(agent_id, new_balance);
        Ok(new_balance)
    }

    /// Checked debit; a failed debit leaves the balance untouched
    pub fn debit(&mut self, agent_id: AgentId, amount: U256) -> Result<U256> {
        let available = self.balance(agent_id);
        let new_balance =
            available
                .checked_sub(amount)
                .ok_or(EngineError::InsufficientBalance {
                    agent_id,
                    requested: amount,
                    available,
                })?;
        self.balances.insert(agent_id, new_balance);
        Ok(new_balance)
    }

    /// Zero the balance and return what it held
    pub fn drain(&mut self, agent_id: AgentId) -> U256 {
        self.balances.remove(&agent_id).unwrap_or(U256::ZERO)
    }

    /// Sum of all custodied balances
    pub fn total_custodied(&self) -> U256 {
        self.balances
            .values()
            .fold(U256::ZERO, |acc, v| acc.saturating_add(*v))
    }

    // ========================================================================
    // Whitelist
    // ========================================================================

    pub fn is_whitelisted(&self, agent_id: AgentId, merchant: Address) -> bool {
        self.whitelist.contains(&(agent_id, merchant))
    }

    pub fn set_whitelisted(&mut self, agent_id: AgentId, merchant: Address, allowed: bool) {
        if allowed {
            self.whitelist.insert((agent_id, merchant));
        } else {
            self.whitelist.remove(&(agent_id, merchant));
        }
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Reserve the next subscription id for an agent. Ids start at 0.
    pub fn allocate_subscription_id(&mut self, agent_id: AgentId) -> Result<SubscriptionId> {
        let counter = self.subscription_counters.entry(agent_id).or_insert(0);
        let id = SubscriptionId::new(*counter);
        *counter = counter
            .checked_add(1)
            .ok_or(EngineError::ArithmeticOverflow {
                context: "subscription id allocation",
            })?;
        Ok(id)
    }

    pub fn insert_subscription(
        &mut self,
        agent_id: AgentId,
        subscription_id: SubscriptionId,
        subscription: Subscription,
    ) {
        self.subscriptions
            .insert((agent_id, subscription_id), subscription);
    }

    pub fn subscription(
        &self,
        agent_id: AgentId,
        subscription_id: SubscriptionId,
    ) -> Result<&Subscription> {
        self.subscriptions
            .get(&(agent_id, subscription_id))
            .ok_or(EngineError::SubscriptionNotFound {
                agent_id,
                subscription_id,
            })
    }

    pub fn subscription_mut(
        &mut self,
        agent_id: AgentId,
        subscription_id: SubscriptionId,
    ) -> Result<&mut Subscription> {
        self.subscriptions
            .get_mut(&(agent_id, subscription_id))
            .ok_or(EngineError::SubscriptionNotFound {
                agent_id,
                subscription_id,
            })
    }

    pub fn subscription_count(&self, agent_id: AgentId) -> u64 {
        self.subscription_counters
            .get(&agent_id)
            .copied()
            .unwrap_or(0)
    }

    // ========================================================================
    // Event sequencing
    // ========================================================================

    pub fn next_event_sequence(&mut self) -> u64 {
        let sequence = self.next_event_sequence;
        self.next_event_sequence = sequence.saturating_add(1);
        sequence
    }
}
