//! Agent registry: creation, delegate binding, pause and limit updates

use spendgate_token::TokenLedger;
use spendgate_types::{Address, Agent, AgentId, LedgerEvent, Policy, Result, U256};
use tracing::info;

use crate::access::{require_address, require_owner};
use crate::engine::PaymentEngine;

impl<T: TokenLedger> PaymentEngine<T> {
    /// Create an agent owned by `caller` and return its id
    pub fn create_agent(
        &mut self,
        caller: Address,
        delegate: Address,
        daily_limit: U256,
        per_tx_limit: U256,
    ) -> Result<AgentId> {
        self.atomically("create_agent", |engine| {
            require_address(caller, "owner")?;
            require_address(delegate, "delegate")?;
            let policy = Policy::new(daily_limit, per_tx_limit, engine.now())?;

            let agent_id = engine.state.allocate_agent_id()?;
            engine.state.insert_agent(Agent {
                agent_id,
                owner: caller,
                delegate,
                policy,
            });
            engine.emit(LedgerEvent::AgentCreated {
                agent_id,
                owner: caller,
                delegate,
            });

            info!(%agent_id, owner = %caller, %delegate, "agent created");
            Ok(agent_id)
        })
    }

    /// Rebind the identity allowed to spend for the agent
    pub fn set_agent_address(
        &mut self,
        caller: Address,
        agent_id: AgentId,
        new_delegate: Address,
    ) -> Result<()> {
        self.atomically("set_agent_address", |engine| {
            let agent = engine.state.agent_mut(agent_id)?;
            require_owner(agent, caller)?;
            require_address(new_delegate, "delegate")?;

            let previous_delegate = std::mem::replace(&mut agent.delegate, new_delegate);
            engine.emit(LedgerEvent::AgentUpdated {
                agent_id,
                previous_delegate,
                delegate: new_delegate,
            });
            Ok(())
        })
    }

    /// Pause or resume spending. Limits are left as they are.
    pub fn set_policy_active(
        &mut self,
        caller: Address,
        agent_id: AgentId,
        active: bool,
    ) -> Result<()> {
        self.atomically("set_policy_active", |engine| {
            let agent = engine.state.agent_mut(agent_id)?;
            require_owner(agent, caller)?;

            agent.policy.active = active;
            engine.emit(LedgerEvent::AgentPaused {
                agent_id,
                paused: !active,
            });
            info!(%agent_id, active, "policy status changed");
            Ok(())
        })
    }

    /// Replace both limits.
    ///
    /// A due window reset is applied first. Accrued spend is clamped down to a
    /// tighter daily limit but never raised when the limit is loosened.
    pub fn update_limits(
        &mut self,
        caller: Address,
        agent_id: AgentId,
        daily_limit: U256,
        per_tx_limit: U256,
    ) -> Result<()> {
        self.atomically("update_limits", |engine| {
            let now = engine.now();
            let window = engine.config.window_seconds;

            let agent = engine.state.agent_mut(agent_id)?;
            require_owner(agent, caller)?;
            spendgate_types::validate_limits(daily_limit, per_tx_limit)?;

            let reset = agent.policy.roll_window(now, window);
            agent.policy.set_limits(daily_limit, per_tx_limit)?;
            let spent_today = agent.policy.spent_today;

            if reset {
                engine.emit(LedgerEvent::DailySpendReset {
                    agent_id,
                    window_start: now,
                });
            }
            engine.emit(LedgerEvent::PolicyLimitsUpdated {
                agent_id,
                daily_limit,
                per_tx_limit,
                spent_today,
            });
            Ok(())
        })
    }
}
