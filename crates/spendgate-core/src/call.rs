//! Message-style operation dispatch
//!
//! The relay layer and re-entering merchant code both talk to the engine by
//! sending an [`EngineCall`] together with the authenticated caller.

use serde::{Deserialize, Serialize};
use spendgate_token::TokenLedger;
use spendgate_types::{
    Address, Agent, AgentId, Bytes, Result, Subscription, SubscriptionId, Timestamp, U256,
};

use crate::engine::PaymentEngine;

/// Every operation and read the engine exposes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EngineCall {
    // Registry
    CreateAgent {
        delegate: Address,
        daily_limit: U256,
        per_tx_limit: U256,
    },
    SetAgentAddress {
        agent_id: AgentId,
        delegate: Address,
    },
    SetPolicyActive {
        agent_id: AgentId,
        active: bool,
    },
    UpdateLimits {
        agent_id: AgentId,
        daily_limit: U256,
        per_tx_limit: U256,
    },

    // Whitelist
    SetMerchantWhitelist {
        agent_id: AgentId,
        merchant: Address,
        allowed: bool,
    },

    // Funding
    Deposit {
        agent_id: AgentId,
        amount: U256,
    },
    Withdraw {
        agent_id: AgentId,
        amount: U256,
    },
    EmergencyWithdraw {
        agent_id: AgentId,
    },

    // Payments
    Pay {
        agent_id: AgentId,
        merchant: Address,
        amount: U256,
        #[serde(default)]
        payload: Bytes,
    },

    // Subscriptions
    CreateSubscription {
        agent_id: AgentId,
        merchant: Address,
        amount_per_period: U256,
        period_seconds: u64,
        #[serde(default)]
        first_execution_at: Timestamp,
    },
    SetSubscriptionStatus {
        agent_id: AgentId,
        subscription_id: SubscriptionId,
        active: bool,
    },
    ExecuteSubscription {
        agent_id: AgentId,
        subscription_id: SubscriptionId,
        #[serde(default)]
        payload: Bytes,
    },

    // Reads
    Agent {
        agent_id: AgentId,
    },
    BalanceOf {
        agent_id: AgentId,
    },
    IsMerchantWhitelisted {
        agent_id: AgentId,
        merchant: Address,
    },
    SpentToday {
        agent_id: AgentId,
    },
    Subscription {
        agent_id: AgentId,
        subscription_id: SubscriptionId,
    },
    SubscriptionCount {
        agent_id: AgentId,
    },
}

impl EngineCall {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateAgent { .. } => "create_agent",
            Self::SetAgentAddress { .. } => "set_agent_address",
            Self::SetPolicyActive { .. } => "set_policy_active",
            Self::UpdateLimits { .. } => "update_limits",
            Self::SetMerchantWhitelist { .. } => "set_merchant_whitelist",
            Self::Deposit { .. } => "deposit",
            Self::Withdraw { .. } => "withdraw",
            Self::EmergencyWithdraw { .. } => "emergency_withdraw",
            Self::Pay { .. } => "pay",
            Self::CreateSubscription { .. } => "create_subscription",
            Self::SetSubscriptionStatus { .. } => "set_subscription_status",
            Self::ExecuteSubscription { .. } => "execute_subscription",
            Self::Agent { .. } => "agent",
            Self::BalanceOf { .. } => "balance_of",
            Self::IsMerchantWhitelisted { .. } => "is_merchant_whitelisted",
            Self::SpentToday { .. } => "spent_today",
            Self::Subscription { .. } => "subscription",
            Self::SubscriptionCount { .. } => "subscription_count",
        }
    }

    /// Reads never mutate state or emit events
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Self::Agent { .. }
                | Self::BalanceOf { .. }
                | Self::IsMerchantWhitelisted { .. }
                | Self::SpentToday { .. }
                | Self::Subscription { .. }
                | Self::SubscriptionCount { .. }
        )
    }
}

/// Result of a dispatched call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "value", rename_all = "snake_case")]
pub enum CallOutcome {
    Done,
    AgentId(AgentId),
    SubscriptionId(SubscriptionId),
    Amount(U256),
    Flag(bool),
    Agent(Agent),
    Subscription(Subscription),
    Count(u64),
}

impl<T: TokenLedger> PaymentEngine<T> {
    /// Route a call from `caller` to the matching operation
    pub fn dispatch(&mut self, caller: Address, call: EngineCall) -> Result<CallOutcome> {
        use EngineCall as C;

        let outcome = match call {
            C::CreateAgent {
                delegate,
                daily_limit,
                per_tx_limit,
            } => CallOutcome::AgentId(self.create_agent(
                caller,
                delegate,
                daily_limit,
                per_tx_limit,
            )?),
            C::SetAgentAddress { agent_id, delegate } => {
                self.set_agent_address(caller, agent_id, delegate)?;
                CallOutcome::Done
            }
            C::SetPolicyActive { agent_id, active } => {
                self.set_policy_active(caller, agent_id, active)?;
                CallOutcome::Done
            }
            C::UpdateLimits {
                agent_id,
                daily_limit,
                per_tx_limit,
            } => {
                self.update_limits(caller, agent_id, daily_limit, per_tx_limit)?;
                CallOutcome::Done
            }
            C::SetMerchantWhitelist {
                agent_id,
                merchant,
                allowed,
            } => {
                self.set_merchant_whitelist(caller, agent_id, merchant, allowed)?;
                CallOutcome::Done
            }
            C::Deposit { agent_id, amount } => {
                CallOutcome::Amount(self.deposit(caller, agent_id, amount)?)
            }
            C::Withdraw { agent_id, amount } => {
                CallOutcome::Amount(self.withdraw(caller, agent_id, amount)?)
            }
            C::EmergencyWithdraw { agent_id } => {
                CallOutcome::Amount(self.emergency_withdraw(caller, agent_id)?)
            }
            C::Pay {
                agent_id,
                merchant,
                amount,
                payload,
            } => {
                self.pay(caller, agent_id, merchant, amount, payload)?;
                CallOutcome::Done
            }
            C::CreateSubscription {
                agent_id,
                merchant,
                amount_per_period,
                period_seconds,
                first_execution_at,
            } => CallOutcome::SubscriptionId(self.create_subscription(
                caller,
                agent_id,
                merchant,
                amount_per_period,
                period_seconds,
                first_execution_at,
            )?),
            C::SetSubscriptionStatus {
                agent_id,
                subscription_id,
                active,
            } => {
                self.set_subscription_status(caller, agent_id, subscription_id, active)?;
                CallOutcome::Done
            }
            C::ExecuteSubscription {
                agent_id,
                subscription_id,
                payload,
            } => {
                self.execute_subscription(caller, agent_id, subscription_id, payload)?;
                CallOutcome::Done
            }
            C::Agent { agent_id } => CallOutcome::Agent(self.agent(agent_id)?),
            C::BalanceOf { agent_id } => CallOutcome::Amount(self.balance_of(agent_id)),
            C::IsMerchantWhitelisted { agent_id, merchant } => {
                CallOutcome::Flag(self.is_merchant_whitelisted(agent_id, merchant))
            }
            C::SpentToday { agent_id } => CallOutcome::Amount(self.spent_today(agent_id)?),
            C::Subscription {
                agent_id,
                subscription_id,
            } => CallOutcome::Subscription(self.subscription(agent_id, subscription_id)?),
            C::SubscriptionCount { agent_id } => {
                CallOutcome::Count(self.subscription_count(agent_id))
            }
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use spendgate_token::InMemoryToken;
    use spendgate_types::ErrorKind;

    use crate::clock::ManualClock;
    use crate::config::EngineConfig;

    use super::*;

    #[test]
    fn calls_deserialize_from_tagged_json() {
        let call: EngineCall = serde_json::from_value(json!({
            "op": "pay",
            "agent_id": 1,
            "merchant": "0x5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a",
            "amount": "0x30d40",
        }))
        .unwrap();

        assert_eq!(call.name(), "pay");
        assert!(!call.is_read());
        match call {
            EngineCall::Pay {
                agent_id,
                amount,
                payload,
                ..
            } => {
                assert_eq!(agent_id, AgentId::new(1));
                assert_eq!(amount, U256::from(200_000));
                assert!(payload.is_empty());
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[test]
    fn outcomes_serialize_with_result_tag() {
        let value = serde_json::to_value(CallOutcome::AgentId(AgentId::new(3))).unwrap();
        assert_eq!(value, json!({"result": "agent_id", "value": 3}));
        let value = serde_json::to_value(CallOutcome::Done).unwrap();
        assert_eq!(value, json!({"result": "done"}));
    }

    #[test]
    fn dispatch_routes_to_operations() {
        let owner = Address::repeat_byte(0x0a);
        let delegate = Address::repeat_byte(0x0d);
        let mut engine = PaymentEngine::new(
            EngineConfig::default(),
            InMemoryToken::new("USDC"),
            Arc::new(ManualClock::new(Timestamp(1))),
        )
        .unwrap();

        let outcome = engine
            .dispatch(
                owner,
                EngineCall::CreateAgent {
                    delegate,
                    daily_limit: U256::from(100),
                    per_tx_limit: U256::from(10),
                },
            )
            .unwrap();
        let CallOutcome::AgentId(agent_id) = outcome else {
            panic!("expected an agent id, got {outcome:?}");
        };

        let read = engine
            .dispatch(delegate, EngineCall::SpentToday { agent_id })
            .unwrap();
        assert_eq!(read, CallOutcome::Amount(U256::ZERO));

        let err = engine
            .dispatch(delegate, EngineCall::EmergencyWithdraw { agent_id })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAgentOwner);

        let count = engine
            .dispatch(delegate, EngineCall::SubscriptionCount { agent_id })
            .unwrap();
        assert_eq!(count, CallOutcome::Count(0));
    }
}
