//! Subscription scheduler
//!
//! A subscription is a standing authorisation to pay a fixed merchant a fixed
//! amount once per period. Anyone may trigger a due execution; the payment
//! itself goes through the same pipeline as a delegate's spend.

use spendgate_token::TokenLedger;
use spendgate_types::{
    Address, AgentId, Bytes, EngineError, LedgerEvent, Result, Subscription, SubscriptionId,
    Timestamp, U256,
};
use tracing::info;

use crate::access::{require_nonzero, require_owner};
use crate::engine::PaymentEngine;

impl<T: TokenLedger> PaymentEngine<T> {
    /// Create a subscription and return its per-agent id.
    ///
    /// A zero `first_execution_at` makes it due immediately. The amount is not
    /// checked against the policy here; limits apply at execution time.
    pub fn create_subscription(
        &mut self,
        caller: Address,
        agent_id: AgentId,
        merchant: Address,
        amount_per_period: U256,
        period_seconds: u64,
        first_execution_at: Timestamp,
    ) -> Result<SubscriptionId> {
        self.atomically("create_subscription", |engine| {
            require_owner(engine.state.agent(agent_id)?, caller)?;
            if !engine.state.is_whitelisted(agent_id, merchant) {
                return Err(EngineError::MerchantNotAllowed { agent_id, merchant });
            }
            require_nonzero(amount_per_period, "amount per period")?;
            let min_period = engine.config.min_subscription_period;
            if period_seconds < min_period {
                return Err(EngineError::invalid_amount(format!(
                    "period of {period_seconds}s is below the minimum of {min_period}s"
                )));
            }

            let next_execution_at = if first_execution_at.is_zero() {
                engine.now()
            } else {
                first_execution_at
            };

            let subscription_id = engine.state.allocate_subscription_id(agent_id)?;
            engine.state.insert_subscription(
                agent_id,
                subscription_id,
                Subscription {
                    merchant,
                    amount_per_period,
                    period_seconds,
                    next_execution_at,
                    active: true,
                },
            );
            engine.emit(LedgerEvent::SubscriptionCreated {
                agent_id,
                subscription_id,
                merchant,
                amount_per_period,
                period_seconds,
                next_execution_at,
            });

            info!(%agent_id, %subscription_id, %merchant, %amount_per_period, period_seconds, "subscription created");
            Ok(subscription_id)
        })
    }

    pub fn set_subscription_status(
        &mut self,
        caller: Address,
        agent_id: AgentId,
        subscription_id: SubscriptionId,
        active: bool,
    ) -> Result<()> {
        self.atomically("set_subscription_status", |engine| {
            require_owner(engine.state.agent(agent_id)?, caller)?;
            engine
                .state
                .subscription_mut(agent_id, subscription_id)?
                .active = active;

            engine.emit(LedgerEvent::SubscriptionStatusChanged {
                agent_id,
                subscription_id,
                active,
            });
            Ok(())
        })
    }

    /// Execute one due period. Open to any caller.
    ///
    /// The schedule advances before the payment runs, so a retried or
    /// re-entered call cannot pay the same period twice.
    pub fn execute_subscription(
        &mut self,
        caller: Address,
        agent_id: AgentId,
        subscription_id: SubscriptionId,
        payload: Bytes,
    ) -> Result<()> {
        self.guarded("execute_subscription", |engine| {
            let now = engine.now();
            engine.state.agent(agent_id)?;
            let subscription = engine.state.subscription(agent_id, subscription_id)?.clone();

            if !subscription.active {
                return Err(EngineError::SubscriptionInactive {
                    agent_id,
                    subscription_id,
                });
            }
            if !subscription.is_due(now) {
                return Err(EngineError::SubscriptionNotDue {
                    agent_id,
                    subscription_id,
                    next_execution_at: subscription.next_execution_at,
                });
            }

            let next_execution_at = subscription
                .next_execution_at
                .checked_plus(subscription.period_seconds)
                .ok_or(EngineError::ArithmeticOverflow {
                    context: "subscription schedule",
                })?;
            engine
                .state
                .subscription_mut(agent_id, subscription_id)?
                .next_execution_at = next_execution_at;

            engine.authorize_and_settle(
                agent_id,
                subscription.merchant,
                subscription.amount_per_period,
                payload,
            )?;

            engine.emit(LedgerEvent::SubscriptionExecuted {
                agent_id,
                subscription_id,
                amount: subscription.amount_per_period,
                next_execution_at,
            });
            info!(%agent_id, %subscription_id, %caller, %next_execution_at, "subscription executed");
            Ok(())
        })
    }
}
