//! Funding manager: moving value between owners and custody

use spendgate_token::TokenLedger;
use spendgate_types::{Address, AgentId, LedgerEvent, Result, U256};
use tracing::info;

use crate::access::{require_nonzero, require_owner};
use crate::engine::{token_failure, PaymentEngine};

impl<T: TokenLedger> PaymentEngine<T> {
    /// Pull `amount` from the owner into custody and credit the agent.
    ///
    /// The owner must have authorised the custody account on the token ledger
    /// beforehand. Returns the new balance.
    pub fn deposit(&mut self, caller: Address, agent_id: AgentId, amount: U256) -> Result<U256> {
        self.guarded("deposit", |engine| {
            let agent = engine.state.agent(agent_id)?;
            require_owner(agent, caller)?;
            let owner = agent.owner;
            require_nonzero(amount, "deposit amount")?;

            let custody = engine.config.custody;
            engine
                .token
                .transfer_from(custody, owner, custody, amount)
                .map_err(|err| token_failure("deposit pull", err))?;
            let new_balance = engine.state.credit(agent_id, amount)?;

            engine.emit(LedgerEvent::Deposit {
                agent_id,
                from: owner,
                amount,
                new_balance,
            });
            info!(%agent_id, %amount, %new_balance, "deposit");
            Ok(new_balance)
        })
    }

    /// Debit the agent and push `amount` to the owner. Returns the new balance.
    pub fn withdraw(&mut self, caller: Address, agent_id: AgentId, amount: U256) -> Result<U256> {
        self.guarded("withdraw", |engine| {
            let agent = engine.state.agent(agent_id)?;
            require_owner(agent, caller)?;
            let owner = agent.owner;
            require_nonzero(amount, "withdraw amount")?;

            let new_balance = engine.state.debit(agent_id, amount)?;
            let custody = engine.config.custody;
            engine
                .token
                .transfer(custody, owner, amount)
                .map_err(|err| token_failure("withdraw push", err))?;

            engine.emit(LedgerEvent::Withdraw {
                agent_id,
                to: owner,
                amount,
                new_balance,
            });
            info!(%agent_id, %amount, %new_balance, "withdraw");
            Ok(new_balance)
        })
    }

    /// Drain the whole balance to the owner, whatever the policy says.
    ///
    /// An empty balance drains to zero without touching the token ledger.
    pub fn emergency_withdraw(&mut self, caller: Address, agent_id: AgentId) -> Result<U256> {
        self.guarded("emergency_withdraw", |engine| {
            let agent = engine.state.agent(agent_id)?;
            require_owner(agent, caller)?;
            let owner = agent.owner;

            let amount = engine.state.drain(agent_id);
            if !amount.is_zero() {
                let custody = engine.config.custody;
                engine
                    .token
                    .transfer(custody, owner, amount)
                    .map_err(|err| token_failure("emergency withdraw push", err))?;
            }

            engine.emit(LedgerEvent::EmergencyWithdraw {
                agent_id,
                to: owner,
                amount,
            });
            info!(%agent_id, %amount, "emergency withdraw");
            Ok(amount)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use spendgate_token::InMemoryToken;
    use spendgate_types::{ErrorKind, Timestamp};

    use crate::clock::ManualClock;
    use crate::config::EngineConfig;

    use super::*;

    const OWNER: Address = Address::repeat_byte(0x0a);
    const DELEGATE: Address = Address::repeat_byte(0x0d);

    fn amt(v: u64) -> U256 {
        U256::from(v)
    }

    fn funded(initial: u64) -> (PaymentEngine<InMemoryToken>, AgentId) {
        let mut engine = PaymentEngine::new(
            EngineConfig::default(),
            InMemoryToken::new("USDC"),
            Arc::new(ManualClock::new(Timestamp(1))),
        )
        .unwrap();
        let custody = engine.custody();
        engine.token_mut().mint(OWNER, amt(initial)).unwrap();
        engine.token_mut().approve(OWNER, custody, amt(initial)).unwrap();
        let id = engine
            .create_agent(OWNER, DELEGATE, amt(1_000_000), amt(250_000))
            .unwrap();
        (engine, id)
    }

    #[test]
    fn test_deposit_pulls_into_custody() {
        let (mut engine, id) = funded(5_000);
        let balance = engine.deposit(OWNER, id, amt(3_000)).unwrap();

        assert_eq!(balance, amt(3_000));
        assert_eq!(engine.balance_of(id), amt(3_000));
        assert_eq!(engine.token().balance_of(OWNER), amt(2_000));
        assert_eq!(engine.token().balance_of(engine.custody()), amt(3_000));
    }

    #[test]
    fn test_deposit_without_authorisation_changes_nothing() {
        let (mut engine, id) = funded(5_000);
        let err = engine.deposit(OWNER, id, amt(6_000)).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ExternalTransferFailed);
        assert_eq!(engine.balance_of(id), U256::ZERO);
        assert_eq!(engine.token().balance_of(OWNER), amt(5_000));
        assert_eq!(engine.events().len(), 1);
    }

    #[test]
    fn test_deposit_checks() {
        let (mut engine, id) = funded(5_000);
        assert_eq!(
            engine.deposit(DELEGATE, id, amt(1)).unwrap_err().kind(),
            ErrorKind::NotAgentOwner
        );
        assert_eq!(
            engine.deposit(OWNER, id, U256::ZERO).unwrap_err().kind(),
            ErrorKind::InvalidAmount
        );
        assert_eq!(
            engine
                .deposit(OWNER, AgentId::new(42), amt(1))
                .unwrap_err()
                .kind(),
            ErrorKind::AgentNotFound
        );
    }

    #[test]
    fn test_withdraw() {
        let (mut engine, id) = funded(5_000);
        engine.deposit(OWNER, id, amt(5_000)).unwrap();

        assert_eq!(
            engine.withdraw(OWNER, id, amt(5_001)).unwrap_err().kind(),
            ErrorKind::InsufficientBalance
        );
        assert_eq!(engine.withdraw(OWNER, id, amt(1_500)).unwrap(), amt(3_500));
        assert_eq!(engine.token().balance_of(OWNER), amt(1_500));
    }

    #[test]
    fn test_withdraw_to_frozen_owner_rolls_back_debit() {
        let (mut engine, id) = funded(5_000);
        engine.deposit(OWNER, id, amt(5_000)).unwrap();
        engine.token_mut().freeze(OWNER);

        let err = engine.withdraw(OWNER, id, amt(1_000)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalTransferFailed);
        assert_eq!(engine.balance_of(id), amt(5_000));
    }

    #[test]
    fn test_emergency_withdraw_of_empty_balance() {
        let (mut engine, id) = funded(0);
        engine.token_mut().freeze(OWNER);

        assert_eq!(engine.emergency_withdraw(OWNER, id).unwrap(), U256::ZERO);
        assert_eq!(
            engine.events().last().unwrap().event,
            LedgerEvent::EmergencyWithdraw {
                agent_id: id,
                to: OWNER,
                amount: U256::ZERO,
            }
        );
    }
}
