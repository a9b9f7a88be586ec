//! The payment engine and its atomic execution frame

use std::collections::HashMap;
use std::sync::Arc;

use spendgate_token::{TokenError, TokenLedger};
use spendgate_types::{
    Address, Agent, AgentId, EngineError, EventRecord, LedgerEvent, Result, Subscription,
    SubscriptionId, Timestamp, U256,
};
use tracing::{debug, info, warn};

use crate::access::ReentrancyLatch;
use crate::clock::Clock;
use crate::config::{ConfigError, EngineConfig};
use crate::merchant::MerchantEndpoint;
use crate::state::LedgerState;

/// Policy-constrained payment engine.
///
/// Every operation takes the authenticated caller explicitly and runs to
/// completion or not at all. The engine custodies agent funds in `T` under
/// `config.custody` and never moves value any other way.
pub struct PaymentEngine<T: TokenLedger> {
    pub(crate) config: EngineConfig,
    pub(crate) token: T,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) state: LedgerState,
    pub(crate) events: Vec<EventRecord>,
    pub(crate) merchants: HashMap<Address, Arc<dyn MerchantEndpoint>>,
    pub(crate) latch: ReentrancyLatch,
    frame_depth: usize,
    frame_now: Option<Timestamp>,
}

impl<T: TokenLedger> PaymentEngine<T> {
    pub fn new(
        config: EngineConfig,
        token: T,
        clock: Arc<dyn Clock>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        info!(
            custody = %config.custody,
            window_seconds = config.window_seconds,
            min_subscription_period = config.min_subscription_period,
            "payment engine initialised"
        );
        Ok(Self {
            config,
            token,
            clock,
            state: LedgerState::new(),
            events: Vec::new(),
            merchants: HashMap::new(),
            latch: ReentrancyLatch::new(),
            frame_depth: 0,
            frame_now: None,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn custody(&self) -> Address {
        self.config.custody
    }

    pub fn token(&self) -> &T {
        &self.token
    }

    /// Direct access to the token ledger, for environment setup between operations
    pub fn token_mut(&mut self) -> &mut T {
        &mut self.token
    }

    /// Current time. Fixed for the whole of an operation once it has started.
    pub fn now(&self) -> Timestamp {
        self.frame_now.unwrap_or_else(|| self.clock.now())
    }

    /// Deploy callable merchant code at an address
    pub fn register_merchant(&mut self, address: Address, endpoint: Arc<dyn MerchantEndpoint>) {
        debug!(merchant = %address, "merchant endpoint registered");
        self.merchants.insert(address, endpoint);
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn agent(&self, agent_id: AgentId) -> Result<Agent> {
        self.state.agent(agent_id).cloned()
    }

    pub fn agent_count(&self) -> usize {
        self.state.agent_count()
    }

    pub fn balance_of(&self, agent_id: AgentId) -> U256 {
        self.state.balance(agent_id)
    }

    pub fn is_merchant_whitelisted(&self, agent_id: AgentId, merchant: Address) -> bool {
        self.state.is_whitelisted(agent_id, merchant)
    }

    /// Accrued spend as of now, reading zero once the window has elapsed
    pub fn spent_today(&self, agent_id: AgentId) -> Result<U256> {
        let agent = self.state.agent(agent_id)?;
        Ok(agent
            .policy
            .spent_at(self.now(), self.config.window_seconds))
    }

    pub fn remaining_daily(&self, agent_id: AgentId) -> Result<U256> {
        let agent = self.state.agent(agent_id)?;
        Ok(agent
            .policy
            .remaining_daily_at(self.now(), self.config.window_seconds))
    }

    pub fn subscription(
        &self,
        agent_id: AgentId,
        subscription_id: SubscriptionId,
    ) -> Result<Subscription> {
        self.state.subscription(agent_id, subscription_id).cloned()
    }

    pub fn subscription_count(&self, agent_id: AgentId) -> u64 {
        self.state.subscription_count(agent_id)
    }

    /// Sum of every agent balance; always covered by the custody account's token balance
    pub fn total_custodied(&self) -> U256 {
        self.state.total_custodied()
    }

    /// Committed events not yet drained
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.events)
    }

    // ========================================================================
    // Execution frame
    // ========================================================================

    /// Run `f` as one all-or-nothing unit.
    ///
    /// Ledger state, the event log and the token ledger are restored together
    /// if `f` fails. Frames nest; time is captured once by the outermost one.
    pub(crate) fn atomically<R>(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        let outermost = self.frame_depth == 0;
        if outermost {
            self.frame_now = Some(self.clock.now());
        }
        self.frame_depth += 1;

        let snapshot = self.state.clone();
        let event_mark = self.events.len();
        let savepoint = self.token.savepoint();

        let result = f(self);

        match &result {
            Ok(_) => {
                self.token.release(savepoint);
                debug!(operation, events = self.events.len() - event_mark, "committed");
            }
            Err(err) => {
                self.token.rollback_to(savepoint);
                self.state = snapshot;
                self.events.truncate(event_mark);
                warn!(operation, kind = ?err.kind(), error = %err, "rolled back");
            }
        }

        self.frame_depth -= 1;
        if outermost {
            self.frame_now = None;
        }
        result
    }

    /// An atomic frame behind the reentrancy latch. The latch is cleared on
    /// every exit path.
    pub(crate) fn guarded<R>(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        if let Err(err) = self.latch.enter() {
            warn!(operation, "reentrant call rejected");
            return Err(err);
        }
        let result = self.atomically(operation, f);
        self.latch.exit();
        result
    }

    pub(crate) fn emit(&mut self, event: LedgerEvent) {
        let record = EventRecord {
            sequence: self.state.next_event_sequence(),
            emitted_at: self.now(),
            event,
        };
        debug!(
            sequence = record.sequence,
            event = record.event.name(),
            agent_id = %record.event.agent_id(),
            "event"
        );
        self.events.push(record);
    }
}

/// Map a token ledger refusal onto the engine's error taxonomy
pub(crate) fn token_failure(operation: &str, err: TokenError) -> EngineError {
    EngineError::external(format!("{operation}: {err}"))
}

impl<T: TokenLedger + std::fmt::Debug> std::fmt::Debug for PaymentEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentEngine")
            .field("config", &self.config)
            .field("token", &self.token)
            .field("agents", &self.state.agent_count())
            .field("pending_events", &self.events.len())
            .field("merchants", &self.merchants.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use spendgate_token::InMemoryToken;
    use spendgate_types::ErrorKind;

    fn engine() -> (PaymentEngine<InMemoryToken>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Timestamp(1_000)));
        let engine = PaymentEngine::new(
            EngineConfig::default(),
            InMemoryToken::new("USDC"),
            clock.clone(),
        )
        .unwrap();
        (engine, clock)
    }

    #[test]
    fn rejects_invalid_config() {
        let config = EngineConfig {
            window_seconds: 0,
            ..Default::default()
        };
        let result = PaymentEngine::new(
            config,
            InMemoryToken::new("USDC"),
            Arc::new(ManualClock::default()),
        );
        assert!(matches!(result, Err(ConfigError::ZeroWindow)));
    }

    #[test]
    fn failed_frame_restores_state_events_and_token() {
        let (mut engine, _) = engine();
        let custody = engine.custody();
        let someone = Address::repeat_byte(0x42);
        engine.token_mut().mint(custody, U256::from(100)).unwrap();

        let result: Result<()> = engine.atomically("test", |e| {
            e.state.credit(AgentId::new(1), U256::from(5))?;
            e.emit(LedgerEvent::AgentPaused {
                agent_id: AgentId::new(1),
                paused: true,
            });
            e.token
                .transfer(custody, someone, U256::from(60))
                .map_err(|err| token_failure("test", err))?;
            Err(EngineError::external("boom"))
        });

        assert_eq!(result.unwrap_err().kind(), ErrorKind::ExternalTransferFailed);
        assert_eq!(engine.balance_of(AgentId::new(1)), U256::ZERO);
        assert!(engine.events().is_empty());
        assert_eq!(engine.token().balance_of(custody), U256::from(100));
        assert_eq!(engine.token().balance_of(someone), U256::ZERO);
    }

    #[test]
    fn event_sequence_is_reused_after_rollback() {
        let (mut engine, _) = engine();
        let event = LedgerEvent::AgentPaused {
            agent_id: AgentId::new(1),
            paused: false,
        };

        let _: Result<()> = engine.atomically("fails", |e| {
            e.emit(event.clone());
            Err(EngineError::ReentrantCall)
        });
        engine
            .atomically("succeeds", |e| {
                e.emit(event.clone());
                Ok(())
            })
            .unwrap();

        assert_eq!(engine.events().len(), 1);
        assert_eq!(engine.events()[0].sequence, 0);
    }

    #[test]
    fn guarded_frames_reject_nesting_and_always_clear_the_latch() {
        let (mut engine, _) = engine();

        let nested = engine.guarded("outer", |e| Ok(e.guarded("inner", |_| Ok(()))));
        assert_eq!(nested.unwrap(), Err(EngineError::ReentrantCall));
        assert!(!engine.latch.is_entered());

        let failed: Result<()> = engine.guarded("fails", |_| Err(EngineError::ReentrantCall));
        assert!(failed.is_err());
        assert!(!engine.latch.is_entered());
        assert!(engine.guarded("again", |_| Ok(())).is_ok());
    }

    #[test]
    fn time_is_fixed_inside_a_frame() {
        let (mut engine, clock) = engine();
        let observed = engine
            .atomically("time", |e| {
                let before = e.now();
                clock.advance(50);
                Ok((before, e.now()))
            })
            .unwrap();
        assert_eq!(observed.0, observed.1);
        assert_eq!(engine.now(), Timestamp(1_050));
    }

    #[test]
    fn drain_takes_committed_events() {
        let (mut engine, _) = engine();
        engine
            .atomically("emit", |e| {
                e.emit(LedgerEvent::AgentPaused {
                    agent_id: AgentId::new(3),
                    paused: true,
                });
                Ok(())
            })
            .unwrap();
        let drained = engine.drain_events();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].emitted_at, Timestamp(1_000));
        assert!(engine.events().is_empty());
    }
}
