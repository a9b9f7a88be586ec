//! Payment authorizer
//!
//! The pipeline every spend goes through, whether a delegate pays ad hoc or
//! a subscription comes due:
//!
//! 1. roll the daily window if it has elapsed
//! 2. policy must be active
//! 3. merchant must be whitelisted
//! 4. per-transaction cap
//! 5. daily cap
//! 6. custodied balance
//! 7. debit and record the spend
//! 8. settle, directly or through a merchant callback
//! 9. emit the payment event
//!
//! Step 7 commits before control can leave the engine in step 8. A failure in
//! step 8 is undone by the enclosing frame together with everything before it.

use spendgate_token::TokenLedger;
use spendgate_types::{Address, AgentId, Bytes, EngineError, LedgerEvent, Result, U256};
use tracing::info;

use crate::access::{require_address, require_delegate, require_nonzero};
use crate::engine::{token_failure, PaymentEngine};
use crate::merchant::{self, PaymentNotice};

impl<T: TokenLedger> PaymentEngine<T> {
    /// Spend from the agent's balance on behalf of its delegate.
    ///
    /// An empty `payload` settles by pushing to `merchant`. Otherwise the
    /// merchant is granted a one-time authorisation for `amount` and invoked
    /// with the payload.
    pub fn pay(
        &mut self,
        caller: Address,
        agent_id: AgentId,
        merchant: Address,
        amount: U256,
        payload: Bytes,
    ) -> Result<()> {
        self.guarded("pay", |engine| {
            require_delegate(engine.state.agent(agent_id)?, caller)?;
            require_nonzero(amount, "payment amount")?;
            require_address(merchant, "merchant")?;

            engine.authorize_and_settle(agent_id, merchant, amount, payload)
        })
    }

    pub(crate) fn authorize_and_settle(
        &mut self,
        agent_id: AgentId,
        merchant: Address,
        amount: U256,
        payload: Bytes,
    ) -> Result<()> {
        let now = self.now();
        let window = self.config.window_seconds;

        let agent = self.state.agent_mut(agent_id)?;
        if agent.policy.roll_window(now, window) {
            self.emit(LedgerEvent::DailySpendReset {
                agent_id,
                window_start: now,
            });
        }

        let policy = &self.state.agent(agent_id)?.policy;
        if !policy.active {
            return Err(EngineError::PolicyInactive { agent_id });
        }
        if !self.state.is_whitelisted(agent_id, merchant) {
            return Err(EngineError::MerchantNotAllowed { agent_id, merchant });
        }
        policy.check_spend(amount)?;

        self.state.debit(agent_id, amount)?;
        self.state
            .agent_mut(agent_id)?
            .policy
            .record_spend(amount)?;

        self.settle(agent_id, merchant, amount, &payload)?;

        self.emit(LedgerEvent::AgentPayment {
            agent_id,
            merchant,
            amount,
            payload,
        });
        info!(%agent_id, %merchant, %amount, "payment settled");
        Ok(())
    }

    fn settle(
        &mut self,
        agent_id: AgentId,
        merchant: Address,
        amount: U256,
        payload: &Bytes,
    ) -> Result<()> {
        let custody = self.config.custody;

        if payload.is_empty() {
            return self
                .token
                .transfer(custody, merchant, amount)
                .map_err(|err| token_failure("settlement push", err));
        }

        // A leftover authorisation from an earlier callback must not add up
        if !self.token.allowance(custody, merchant).is_zero() {
            self.token
                .approve(custody, merchant, U256::ZERO)
                .map_err(|err| token_failure("revoke stale authorisation", err))?;
        }
        self.token
            .approve(custody, merchant, amount)
            .map_err(|err| token_failure("grant authorisation", err))?;

        merchant::invoke(
            self,
            merchant,
            PaymentNotice {
                agent_id,
                amount,
                payload: payload.clone(),
            },
        )
    }
}
