//! Per-agent merchant allow-list

use spendgate_token::TokenLedger;
use spendgate_types::{Address, AgentId, LedgerEvent, Result};

use crate::access::{require_address, require_owner};
use crate::engine::PaymentEngine;

impl<T: TokenLedger> PaymentEngine<T> {
    /// Allow or revoke payments to `merchant`. Setting the current value again
    /// is not an error and still emits the event.
    pub fn set_merchant_whitelist(
        &mut self,
        caller: Address,
        agent_id: AgentId,
        merchant: Address,
        allowed: bool,
    ) -> Result<()> {
        self.atomically("set_merchant_whitelist", |engine| {
            require_owner(engine.state.agent(agent_id)?, caller)?;
            require_address(merchant, "merchant")?;

            engine.state.set_whitelisted(agent_id, merchant, allowed);
            engine.emit(LedgerEvent::MerchantWhitelistUpdated {
                agent_id,
                merchant,
                allowed,
            });
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use spendgate_token::InMemoryToken;
    use spendgate_types::{ErrorKind, U256};

    use crate::clock::SystemClock;
    use crate::config::EngineConfig;

    use super::*;

    #[test]
    fn test_whitelist_toggle() {
        let owner = Address::repeat_byte(0x0a);
        let merchant = Address::repeat_byte(0x33);
        let mut engine = PaymentEngine::new(
            EngineConfig::default(),
            InMemoryToken::new("USDC"),
            Arc::new(SystemClock),
        )
        .unwrap();
        let id = engine
            .create_agent(owner, Address::repeat_byte(0x0d), U256::from(10), U256::from(5))
            .unwrap();

        assert!(!engine.is_merchant_whitelisted(id, merchant));
        engine.set_merchant_whitelist(owner, id, merchant, true).unwrap();
        engine.set_merchant_whitelist(owner, id, merchant, true).unwrap();
        assert!(engine.is_merchant_whitelisted(id, merchant));
        engine.set_merchant_whitelist(owner, id, merchant, false).unwrap();
        assert!(!engine.is_merchant_whitelisted(id, merchant));

        let err = engine
            .set_merchant_whitelist(owner, id, Address::ZERO, true)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAddress);
        let err = engine
            .set_merchant_whitelist(merchant, id, merchant, true)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAgentOwner);

        // created + three updates
        assert_eq!(engine.events().len(), 4);
    }
}
