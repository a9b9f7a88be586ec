//! Async service facade
//!
//! The engine itself is synchronous and assumes one operation at a time.
//! `EngineService` gives concurrent async callers that model by queueing them
//! on a mutex, then publishes whatever each call committed.

use std::sync::Arc;

use async_trait::async_trait;
use spendgate_token::TokenLedger;
use spendgate_types::{Address, EventRecord, Result};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::call::{CallOutcome, EngineCall};
use crate::engine::PaymentEngine;

#[derive(Debug, Clone, Error)]
pub enum PublishError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// Downstream consumer of committed events (an indexer, a log, a queue)
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, records: &[EventRecord]) -> std::result::Result<(), PublishError>;
}

/// Keeps every published record in memory
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    records: RwLock<Vec<EventRecord>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<EventRecord> {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl EventPublisher for MemoryPublisher {
    async fn publish(&self, records: &[EventRecord]) -> std::result::Result<(), PublishError> {
        self.records.write().await.extend_from_slice(records);
        Ok(())
    }
}

/// Logs each record as one structured line
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPublisher;

#[async_trait]
impl EventPublisher for TracingPublisher {
    async fn publish(&self, records: &[EventRecord]) -> std::result::Result<(), PublishError> {
        for record in records {
            let payload = serde_json::to_string(record)
                .map_err(|e| PublishError::Serialization(e.to_string()))?;
            info!(
                sequence = record.sequence,
                event = record.event.name(),
                agent_id = %record.event.agent_id(),
                %payload,
                "ledger event"
            );
        }
        Ok(())
    }
}

/// Shared handle to an engine
pub struct EngineService<T: TokenLedger> {
    engine: Arc<Mutex<PaymentEngine<T>>>,
    publisher: Arc<dyn EventPublisher>,
}

impl<T: TokenLedger> Clone for EngineService<T> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            publisher: Arc::clone(&self.publisher),
        }
    }
}

impl<T: TokenLedger> EngineService<T> {
    pub fn new(engine: PaymentEngine<T>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            publisher,
        }
    }

    /// Apply one call and publish the events it committed.
    ///
    /// A publishing failure is logged; it does not undo the committed call.
    pub async fn submit(&self, caller: Address, call: EngineCall) -> Result<CallOutcome> {
        if call.is_read() {
            return self.engine.lock().await.dispatch(caller, call);
        }

        let (outcome, records) = {
            let mut engine = self.engine.lock().await;
            let outcome = engine.dispatch(caller, call);
            (outcome, engine.drain_events())
        };

        if !records.is_empty() {
            if let Err(err) = self.publisher.publish(&records).await {
                warn!(error = %err, count = records.len(), "event publishing failed");
            }
        }
        outcome
    }

    /// Run `f` with exclusive access to the engine, between operations
    pub async fn with_engine<R>(&self, f: impl FnOnce(&mut PaymentEngine<T>) -> R) -> R {
        let mut engine = self.engine.lock().await;
        f(&mut engine)
    }
}
