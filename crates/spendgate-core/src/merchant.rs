//! Merchant callback boundary
//!
//! A payment with a payload hands control to merchant code. That code is
//! untrusted: it only sees a [`CallbackHost`], its result is fallible, and a
//! panic inside it is contained here and turned into a failed settlement.

use std::panic::{catch_unwind, AssertUnwindSafe};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use spendgate_token::{TokenError, TokenLedger};
use spendgate_types::{Address, AgentId, Bytes, EngineError, Timestamp, U256};
use thiserror::Error;
use tracing::{debug, warn};

use crate::call::{CallOutcome, EngineCall};
use crate::engine::PaymentEngine;

/// Errors raised by merchant code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MerchantError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Token movement refused: {0}")]
    Token(#[from] TokenError),

    #[error("Engine call failed: {0}")]
    Engine(#[from] EngineError),

    #[error("Rejected by merchant: {0}")]
    Rejected(String),
}

/// What the merchant is told about the payment it is being invoked for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentNotice {
    pub agent_id: AgentId,
    pub amount: U256,
    pub payload: Bytes,
}

/// The surface merchant code can reach while it runs
pub trait CallbackHost {
    /// The merchant's own identity
    fn identity(&self) -> Address;

    fn custody(&self) -> Address;

    fn now(&self) -> Timestamp;

    /// What custody has currently authorised this merchant to pull
    fn allowance(&self) -> U256;

    fn balance_of(&self, account: Address) -> U256;

    /// Pull from custody against the granted authorisation
    fn pull(&mut self, amount: U256) -> Result<(), TokenError>;

    /// Move from the merchant's own balance
    fn transfer(&mut self, to: Address, amount: U256) -> Result<(), TokenError>;

    /// Call back into the engine with the merchant as caller
    fn call(&mut self, call: EngineCall) -> spendgate_types::Result<CallOutcome>;
}

/// Code deployed at a merchant address
pub trait MerchantEndpoint: Send + Sync {
    fn on_payment(
        &self,
        host: &mut dyn CallbackHost,
        notice: &PaymentNotice,
    ) -> Result<(), MerchantError>;
}

struct EngineHost<'a, T: TokenLedger> {
    engine: &'a mut PaymentEngine<T>,
    identity: Address,
}

impl<T: TokenLedger> CallbackHost for EngineHost<'_, T> {
    fn identity(&self) -> Address {
        self.identity
    }

    fn custody(&self) -> Address {
        self.engine.config.custody
    }

    fn now(&self) -> Timestamp {
        self.engine.now()
    }

    fn allowance(&self) -> U256 {
        self.engine
            .token
            .allowance(self.engine.config.custody, self.identity)
    }

    fn balance_of(&self, account: Address) -> U256 {
        self.engine.token.balance_of(account)
    }

    fn pull(&mut self, amount: U256) -> Result<(), TokenError> {
        let custody = self.engine.config.custody;
        self.engine
            .token
            .transfer_from(self.identity, custody, self.identity, amount)
    }

    fn transfer(&mut self, to: Address, amount: U256) -> Result<(), TokenError> {
        self.engine.token.transfer(self.identity, to, amount)
    }

    fn call(&mut self, call: EngineCall) -> spendgate_types::Result<CallOutcome> {
        debug!(merchant = %self.identity, op = call.name(), "merchant re-entered engine");
        self.engine.dispatch(self.identity, call)
    }
}

/// Run merchant code at `merchant` for one payment
pub(crate) fn invoke<T: TokenLedger>(
    engine: &mut PaymentEngine<T>,
    merchant: Address,
    notice: PaymentNotice,
) -> spendgate_types::Result<()> {
    let endpoint = engine
        .merchants
        .get(&merchant)
        .cloned()
        .ok_or_else(|| EngineError::external(format!("no callable code at {merchant}")))?;

    let mut host = EngineHost {
        engine,
        identity: merchant,
    };
    let outcome = catch_unwind(AssertUnwindSafe(|| endpoint.on_payment(&mut host, &notice)));

    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => {
            warn!(%merchant, error = %err, "merchant callback failed");
            Err(EngineError::external(format!("merchant {merchant}: {err}")))
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(%merchant, %message, "merchant callback panicked");
            Err(EngineError::external(format!(
                "merchant {merchant} aborted: {message}"
            )))
        }
    }
}

// ============================================================================
// Invoice pull merchant
// ============================================================================

/// Build a payload carrying an invoice id as a 32-byte big-endian word
pub fn encode_invoice_payload(invoice_id: U256) -> Bytes {
    Bytes::from(invoice_id.to_be_bytes::<32>().to_vec())
}

/// Read the invoice id from the first word of a payload
pub fn decode_invoice_id(payload: &[u8]) -> Result<U256, MerchantError> {
    let word = payload.get(..32).ok_or_else(|| {
        MerchantError::MalformedPayload(format!(
            "expected at least 32 bytes, got {}",
            payload.len()
        ))
    })?;
    Ok(U256::from_be_slice(word))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceReceipt {
    pub agent_id: AgentId,
    pub invoice_id: U256,
    pub amount: U256,
    pub settled_at: Timestamp,
}

/// Pull-style merchant: claims the whole granted authorisation and records
/// which invoice it was paid for.
#[derive(Debug, Default)]
pub struct InvoicePullMerchant {
    receipts: Mutex<Vec<InvoiceReceipt>>,
}

impl InvoicePullMerchant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn receipts(&self) -> Vec<InvoiceReceipt> {
        self.receipts.lock().clone()
    }

    pub fn last_invoice_id(&self) -> Option<U256> {
        self.receipts.lock().last().map(|r| r.invoice_id)
    }
}

impl MerchantEndpoint for InvoicePullMerchant {
    fn on_payment(
        &self,
        host: &mut dyn CallbackHost,
        notice: &PaymentNotice,
    ) -> Result<(), MerchantError> {
        let invoice_id = decode_invoice_id(&notice.payload)?;
        let granted = host.allowance();
        if granted.is_zero() {
            return Err(MerchantError::Rejected("nothing authorised".to_string()));
        }
        host.pull(granted)?;

        self.receipts.lock().push(InvoiceReceipt {
            agent_id: notice.agent_id,
            invoice_id,
            amount: granted,
            settled_at: host.now(),
        });
        debug!(merchant = %host.identity(), %invoice_id, amount = %granted, "invoice settled");
        Ok(())
    }
}
