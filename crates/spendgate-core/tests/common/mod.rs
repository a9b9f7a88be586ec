#![allow(dead_code)]

use std::sync::Arc;

use spendgate_core::{
    Address, AgentId, EngineConfig, InMemoryToken, ManualClock, PaymentEngine, Timestamp,
    TokenLedger, U256,
};

pub const OWNER: Address = Address::repeat_byte(0x0a);
pub const DELEGATE: Address = Address::repeat_byte(0x0d);
pub const MERCHANT: Address = Address::repeat_byte(0x5a);
pub const KEEPER: Address = Address::repeat_byte(0x4b);

pub const START: Timestamp = Timestamp(1_700_000_000);
pub const OWNER_FUNDS: u64 = 10_000_000;

pub fn amt(v: u64) -> U256 {
    U256::from(v)
}

pub struct Harness {
    pub engine: PaymentEngine<InMemoryToken>,
    pub clock: Arc<ManualClock>,
    pub agent_id: AgentId,
}

impl Harness {
    /// Engine with one agent and an owner holding funds pre-authorised for custody
    pub fn new(daily_limit: u64, per_tx_limit: u64) -> Self {
        let clock = Arc::new(ManualClock::new(START));
        let mut engine = PaymentEngine::new(
            EngineConfig::default(),
            InMemoryToken::new("USDC"),
            clock.clone(),
        )
        .unwrap();

        let custody = engine.custody();
        engine.token_mut().mint(OWNER, amt(OWNER_FUNDS)).unwrap();
        engine
            .token_mut()
            .approve(OWNER, custody, amt(OWNER_FUNDS))
            .unwrap();

        let agent_id = engine
            .create_agent(OWNER, DELEGATE, amt(daily_limit), amt(per_tx_limit))
            .unwrap();

        Self {
            engine,
            clock,
            agent_id,
        }
    }

    pub fn fund(&mut self, amount: u64) -> U256 {
        self.engine
            .deposit(OWNER, self.agent_id, amt(amount))
            .unwrap()
    }

    pub fn allow(&mut self, merchant: Address) {
        self.engine
            .set_merchant_whitelist(OWNER, self.agent_id, merchant, true)
            .unwrap();
    }

    pub fn balance(&self) -> U256 {
        self.engine.balance_of(self.agent_id)
    }

    pub fn spent(&self) -> U256 {
        self.engine.spent_today(self.agent_id).unwrap()
    }

    pub fn token_balance(&self, account: Address) -> U256 {
        self.engine.token().balance_of(account)
    }

    pub fn custody_balance(&self) -> U256 {
        self.token_balance(self.engine.custody())
    }

    pub fn event_names(&self) -> Vec<&'static str> {
        self.engine
            .events()
            .iter()
            .map(|record| record.event.name())
            .collect()
    }
}
