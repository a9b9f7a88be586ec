//! Access guards
//!
//! Early-return checks applied at the top of each operation, before anything
//! is mutated, plus the reentrancy latch shared by every funds-moving entry
//! point.

use spendgate_types::{Address, AddressExt, Agent, EngineError, Result, U256};

/// Fails with `NotAgentOwner` unless `caller` owns the agent
pub fn require_owner(agent: &Agent, caller: Address) -> Result<()> {
    if !agent.is_owner(caller) {
        return Err(EngineError::NotAgentOwner {
            agent_id: agent.agent_id,
            caller,
        });
    }
    Ok(())
}

/// Fails with `NotAgent` unless `caller` is the agent's delegate
pub fn require_delegate(agent: &Agent, caller: Address) -> Result<()> {
    if !agent.is_delegate(caller) {
        return Err(EngineError::NotAgent {
            agent_id: agent.agent_id,
            caller,
        });
    }
    Ok(())
}

pub fn require_address(address: Address, field: &'static str) -> Result<()> {
    if address.is_null() {
        return Err(EngineError::InvalidAddress { field });
    }
    Ok(())
}

pub fn require_nonzero(amount: U256, what: &str) -> Result<()> {
    if amount.is_zero() {
        return Err(EngineError::invalid_amount(format!("{what} must be non-zero")));
    }
    Ok(())
}

/// Not-entered/entered latch.
///
/// One latch covers the whole family of guarded operations, so a merchant
/// callback cannot start a deposit, withdraw or pay while a pay is running.
#[derive(Debug, Default)]
pub struct ReentrancyLatch {
    entered: bool,
}

impl ReentrancyLatch {
    pub fn new() -> Self {
        Self { entered: false }
    }

    pub fn enter(&mut self) -> Result<()> {
        if self.entered {
            return Err(EngineError::ReentrantCall);
        }
        self.entered = true;
        Ok(())
    }

    pub fn exit(&mut self) {
        self.entered = false;
    }

    pub fn is_entered(&self) -> bool {
        self.entered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spendgate_types::{AgentId, ErrorKind, Policy, Timestamp};

    fn agent() -> Agent {
        Agent {
            agent_id: AgentId::new(7),
            owner: Address::repeat_byte(0x0a),
            delegate: Address::repeat_byte(0x0d),
            policy: Policy::new(U256::from(10), U256::from(5), Timestamp(0)).unwrap(),
        }
    }

    #[test]
    fn owner_and_delegate_are_distinct_roles() {
        let agent = agent();
        assert!(require_owner(&agent, agent.owner).is_ok());
        assert_eq!(
            require_owner(&agent, agent.delegate).unwrap_err().kind(),
            ErrorKind::NotAgentOwner
        );
        assert!(require_delegate(&agent, agent.delegate).is_ok());
        assert_eq!(
            require_delegate(&agent, agent.owner).unwrap_err().kind(),
            ErrorKind::NotAgent
        );
    }

    #[test]
    fn input_guards() {
        assert_eq!(
            require_address(Address::ZERO, "merchant"),
            Err(EngineError::InvalidAddress { field: "merchant" })
        );
        assert!(require_address(Address::repeat_byte(1), "merchant").is_ok());
        assert_eq!(
            require_nonzero(U256::ZERO, "amount").unwrap_err().kind(),
            ErrorKind::InvalidAmount
        );
    }

    #[test]
    fn latch_rejects_nested_entry_until_cleared() {
        let mut latch = ReentrancyLatch::new();
        latch.enter().unwrap();
        assert!(latch.is_entered());
        assert_eq!(latch.enter(), Err(EngineError::ReentrantCall));
        latch.exit();
        assert!(!latch.is_entered());
        assert!(latch.enter().is_ok());
    }
}
