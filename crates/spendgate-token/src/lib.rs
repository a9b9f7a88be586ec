//! Spendgate Token - the value-transfer capability the engine is built on
//!
//! The engine never moves value itself. It custodies funds in a token ledger
//! and drives that ledger through four primitives:
//!
//! - `transfer`: push from one account to another
//! - `transfer_from`: pull on behalf of an owner, spending an allowance
//! - `approve`: set a one-time spending authorization
//! - `allowance`: query an authorization
//!
//! # Invariants
//!
//! 1. No negative balances
//! 2. Caller identity is explicit on every mutating call
//! 3. Every movement inside an open savepoint can be undone
//!
//! Implementations may be in-process ([`InMemoryToken`]), a remote service, or
//! an external settlement network; the engine is agnostic as long as savepoints
//! are honoured.

use spendgate_types::{Address, U256};
use thiserror::Error;

pub mod memory;

pub use memory::InMemoryToken;

/// Errors that can occur in token operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Insufficient balance in {account}: have {available}, need {required}")]
    InsufficientBalance {
        account: Address,
        available: U256,
        required: U256,
    },

    #[error("Insufficient allowance from {owner} to {spender}: have {available}, need {required}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        available: U256,
        required: U256,
    },

    #[error("Account {account} is frozen")]
    AccountFrozen { account: Address },

    #[error("Balance overflow crediting {account}")]
    Overflow { account: Address },
}

pub type Result<T> = std::result::Result<T, TokenError>;

/// Marker for a point the ledger can be rolled back to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Savepoint(pub usize);

/// Value-transfer capability injected into the engine
pub trait TokenLedger: Send {
    fn balance_of(&self, account: Address) -> U256;

    fn allowance(&self, owner: Address, spender: Address) -> U256;

    /// Move `amount` from `from` to `to`, with `from` as the caller
    fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<()>;

    /// Move `amount` from `from` to `to`, with `spender` as the caller,
    /// consuming `from`'s authorization for `spender`
    fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<()>;

    /// Set `owner`'s authorization for `spender` to exactly `amount`
    fn approve(&mut self, owner: Address, spender: Address, amount: U256) -> Result<()>;

    /// Open a savepoint. Savepoints nest and must be closed in LIFO order.
    fn savepoint(&mut self) -> Savepoint;

    /// Undo every movement since `savepoint` and close it
    fn rollback_to(&mut self, savepoint: Savepoint);

    /// Keep every movement since `savepoint` and close it
    fn release(&mut self, savepoint: Savepoint);
}
