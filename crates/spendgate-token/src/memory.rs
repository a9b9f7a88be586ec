//! In-process token ledger
//!
//! Balances and allowances live in hash maps. While any savepoint is open,
//! every write first records the value it overwrites in an undo journal, so a
//! rollback restores the exact prior state.

use std::collections::{HashMap, HashSet};

use spendgate_types::{Address, U256};
use tracing::{debug, warn};

use crate::{Result, Savepoint, TokenError, TokenLedger};

/// One undo step
#[derive(Debug, Clone)]
enum JournalEntry {
    Balance {
        account: Address,
        previous: U256,
    },
    Allowance {
        owner: Address,
        spender: Address,
        previous: U256,
    },
}

/// The reference token ledger
#[derive(Debug, Default)]
pub struct InMemoryToken {
    symbol: String,
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    frozen: HashSet<Address>,
    journal: Vec<JournalEntry>,
    open_savepoints: usize,
}

impl InMemoryToken {
    /// Create an empty ledger
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Credit new units to an account (environment setup, not an engine path)
    pub fn mint(&mut self, to: Address, amount: U256) -> Result<U256> {
        let current = self.balance_of(to);
        let new_balance = current
            .checked_add(amount)
            .ok_or(TokenError::Overflow { account: to })?;
        self.write_balance(to, new_balance);
        debug!(account = %to, %amount, symbol = %self.symbol, "minted");
        Ok(new_balance)
    }

    /// Make every transfer touching `account` fail
    pub fn freeze(&mut self, account: Address) {
        self.frozen.insert(account);
    }

    pub fn unfreeze(&mut self, account: Address) {
        self.frozen.remove(&account);
    }

    /// Sum of all balances
    pub fn total_supply(&self) -> U256 {
        self.balances
            .values()
            .fold(U256::ZERO, |acc, v| acc.saturating_add(*v))
    }

    fn record(&mut self, entry: JournalEntry) {
        if self.open_savepoints > 0 {
            self.journal.push(entry);
        }
    }

    fn write_balance(&mut self, account: Address, value: U256) {
        let previous = self.balance_of(account);
        self.record(JournalEntry::Balance { account, previous });
        if value.is_zero() {
            self.balances.remove(&account);
        } else {
            self.balances.insert(account, value);
        }
    }

    fn write_allowance(&mut self, owner: Address, spender: Address, value: U256) {
        let previous = self.allowance(owner, spender);
        self.record(JournalEntry::Allowance {
            owner,
            spender,
            previous,
        });
        if value.is_zero() {
            self.allowances.remove(&(owner, spender));
        } else {
            self.allowances.insert((owner, spender), value);
        }
    }

    fn ensure_not_frozen(&self, account: Address) -> Result<()> {
        if self.frozen.contains(&account) {
            return Err(TokenError::AccountFrozen { account });
        }
        Ok(())
    }

    /// Debit then credit. All checks run before either write.
    fn move_funds(&mut self, from: Address, to: Address, amount: U256) -> Result<()> {
        self.ensure_not_frozen(from)?;
        self.ensure_not_frozen(to)?;

        let from_balance = self.balance_of(from);
        let new_from = from_balance
            .checked_sub(amount)
            .ok_or(TokenError::InsufficientBalance {
                account: from,
                available: from_balance,
                required: amount,
            })?;

        if from == to {
            return Ok(());
        }

        let new_to = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(TokenError::Overflow { account: to })?;

        self.write_balance(from, new_from);
        self.write_balance(to, new_to);
        Ok(())
    }
}

impl TokenLedger for InMemoryToken {
    fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or(U256::ZERO)
    }

    fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<()> {
        self.move_funds(from, to, amount)?;
        debug!(%from, %to, %amount, "transfer");
        Ok(())
    }

    fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<()> {
        let allowed = self.allowance(from, spender);
        let remaining = allowed
            .checked_sub(amount)
            .ok_or(TokenError::InsufficientAllowance {
                owner: from,
                spender,
                available: allowed,
                required: amount,
            })?;

        self.move_funds(from, to, amount)?;
        self.write_allowance(from, spender, remaining);
        debug!(%spender, %from, %to, %amount, "transfer_from");
        Ok(())
    }

    fn approve(&mut self, owner: Address, spender: Address, amount: U256) -> Result<()> {
        self.write_allowance(owner, spender, amount);
        debug!(%owner, %spender, %amount, "approve");
        Ok(())
    }

    fn savepoint(&mut self) -> Savepoint {
        self.open_savepoints += 1;
        Savepoint(self.journal.len())
    }

    fn rollback_to(&mut self, savepoint: Savepoint) {
        let undone = self.journal.len().saturating_sub(savepoint.0);
        while self.journal.len() > savepoint.0 {
            match self.journal.pop() {
                Some(JournalEntry::Balance { account, previous }) => {
                    if previous.is_zero() {
                        self.balances.remove(&account);
                    } else {
                        self.balances.insert(account, previous);
                    }
                }
                Some(JournalEntry::Allowance {
                    owner,
                    spender,
                    previous,
                }) => {
                    if previous.is_zero() {
                        self.allowances.remove(&(owner, spender));
                    } else {
                        self.allowances.insert((owner, spender), previous);
                    }
                }
                None => break,
            }
        }
        self.close_savepoint();
        if undone > 0 {
            warn!(undone, "token movements rolled back");
        }
    }

    fn release(&mut self, _savepoint: Savepoint) {
        self.close_savepoint();
    }
}

impl InMemoryToken {
    fn close_savepoint(&mut self) {
        self.open_savepoints = self.open_savepoints.saturating_sub(1);
        if self.open_savepoints == 0 {
            self.journal.clear();
        }
    }
}
