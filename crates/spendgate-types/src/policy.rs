//! Spending policy bound to every agent
//!
//! A policy is bounded authority: an active flag, an absolute per-operation
//! cap, and a rolling daily cap with its accrued spend.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::{Amount, Timestamp};

/// Policy governing an agent's spending authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub active: bool,
    pub daily_limit: Amount,
    pub per_tx_limit: Amount,
    pub spent_today: Amount,
    pub window_start: Timestamp,
}

/// Validate a (daily, per-transaction) limit pair.
///
/// Both must be strictly positive and the per-transaction cap must fit inside
/// the daily one.
pub fn validate_limits(daily_limit: U256, per_tx_limit: U256) -> Result<()> {
    if daily_limit.is_zero() || per_tx_limit.is_zero() || per_tx_limit > daily_limit {
        return Err(EngineError::InvalidLimits {
            daily_limit,
            per_tx_limit,
        });
    }
    Ok(())
}

impl Policy {
    /// Create an active policy whose window opens at `now`
    pub fn new(daily_limit: U256, per_tx_limit: U256, now: Timestamp) -> Result<Self> {
        validate_limits(daily_limit, per_tx_limit)?;
        Ok(Self {
            active: true,
            daily_limit,
            per_tx_limit,
            spent_today: U256::ZERO,
            window_start: now,
        })
    }

    /// Whether the current window has run its full length
    pub fn window_elapsed(&self, now: Timestamp, window_seconds: u64) -> bool {
        now >= self.window_start.plus(window_seconds)
    }

    /// Reset the accrued spend if the window has elapsed.
    ///
    /// Returns whether a reset happened. Calling this twice inside the same
    /// window leaves `window_start` untouched.
    pub fn roll_window(&mut self, now: Timestamp, window_seconds: u64) -> bool {
        if !self.window_elapsed(now, window_seconds) {
            return false;
        }
        self.spent_today = U256::ZERO;
        self.window_start = now;
        true
    }

    /// Accrued spend as it would read at `now`, without mutating anything
    pub fn spent_at(&self, now: Timestamp, window_seconds: u64) -> U256 {
        if self.window_elapsed(now, window_seconds) {
            U256::ZERO
        } else {
            self.spent_today
        }
    }

    /// How much more can be spent in the window as it would read at `now`
    pub fn remaining_daily_at(&self, now: Timestamp, window_seconds: u64) -> U256 {
        self.daily_limit
            .saturating_sub(self.spent_at(now, window_seconds))
    }

    /// Check an amount against both caps, assuming the window is already current
    pub fn check_spend(&self, amount: U256) -> Result<()> {
        if amount > self.per_tx_limit {
            return Err(EngineError::PerTxLimitExceeded {
                amount,
                limit: self.per_tx_limit,
            });
        }

        let exceeded = match self.spent_today.checked_add(amount) {
            Some(total) => total > self.daily_limit,
            None => true,
        };
        if exceeded {
            return Err(EngineError::DailyLimitExceeded {
                spent: self.spent_today,
                amount,
                limit: self.daily_limit,
            });
        }
        Ok(())
    }

    /// Record a spend that already passed [`Policy::check_spend`]
    pub fn record_spend(&mut self, amount: U256) -> Result<()> {
        self.spent_today = self
            .spent_today
            .checked_add(amount)
            .ok_or(EngineError::ArithmeticOverflow {
                context: "daily spend accounting",
            })?;
        Ok(())
    }

    /// Replace both limits.
    ///
    /// Accrued spend is clamped down to a tightened daily limit and never
    /// raised when limits are loosened.
    pub fn set_limits(&mut self, daily_limit: U256, per_tx_limit: U256) -> Result<()> {
        validate_limits(daily_limit, per_tx_limit)?;
        self.daily_limit = daily_limit;
        self.per_tx_limit = per_tx_limit;
        if self.spent_today > daily_limit {
            self.spent_today = daily_limit;
        }
        Ok(())
    }

    /// The invariant every committed operation must leave intact
    pub fn is_consistent(&self) -> bool {
        !self.daily_limit.is_zero()
            && !self.per_tx_limit.is_zero()
            && self.per_tx_limit <= self.daily_limit
            && self.spent_today <= self.daily_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, DAY_SECONDS};

    fn amt(v: u64) -> U256 {
        U256::from(v)
    }

    fn policy() -> Policy {
        Policy::new(amt(1_000_000), amt(250_000), Timestamp(1_000)).unwrap()
    }

    #[test]
    fn new_policy_is_active_and_empty() {
        let p = policy();
        assert!(p.active);
        assert_eq!(p.daily_limit, amt(1_000_000));
        assert_eq!(p.per_tx_limit, amt(250_000));
        assert_eq!(p.spent_today, U256::ZERO);
        assert_eq!(p.window_start, Timestamp(1_000));
    }

    #[test]
    fn limits_must_be_positive_and_ordered() {
        assert_eq!(
            validate_limits(U256::ZERO, amt(1)).unwrap_err().kind(),
            ErrorKind::InvalidLimits
        );
        assert_eq!(
            validate_limits(amt(1), U256::ZERO).unwrap_err().kind(),
            ErrorKind::InvalidLimits
        );
        assert_eq!(
            validate_limits(amt(10), amt(11)).unwrap_err().kind(),
            ErrorKind::InvalidLimits
        );
        assert!(validate_limits(amt(10), amt(10)).is_ok());
    }

    #[test]
    fn window_resets_only_after_a_full_day() {
        let mut p = policy();
        p.record_spend(amt(900)).unwrap();

        assert!(!p.roll_window(Timestamp(1_000 + DAY_SECONDS - 1), DAY_SECONDS));
        assert_eq!(p.spent_today, amt(900));

        assert!(p.roll_window(Timestamp(1_000 + DAY_SECONDS), DAY_SECONDS));
        assert_eq!(p.spent_today, U256::ZERO);
        assert_eq!(p.window_start, Timestamp(1_000 + DAY_SECONDS));
    }

    #[test]
    fn roll_window_is_idempotent_within_a_window() {
        let mut p = policy();
        let later = Timestamp(1_000 + DAY_SECONDS + 5);
        assert!(p.roll_window(later, DAY_SECONDS));
        let start = p.window_start;
        assert!(!p.roll_window(later.plus(60), DAY_SECONDS));
        assert_eq!(p.window_start, start);
    }

    #[test]
    fn spent_at_is_window_adjusted() {
        let mut p = policy();
        p.record_spend(amt(500)).unwrap();
        assert_eq!(p.spent_at(Timestamp(2_000), DAY_SECONDS), amt(500));
        assert_eq!(p.spent_at(Timestamp(1_000 + DAY_SECONDS), DAY_SECONDS), U256::ZERO);
        assert_eq!(p.remaining_daily_at(Timestamp(2_000), DAY_SECONDS), amt(999_500));
    }

    #[test]
    fn check_spend_orders_per_tx_before_daily() {
        let mut p = policy();
        p.record_spend(amt(900_000)).unwrap();
        let err = p.check_spend(amt(300_000)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PerTxLimitExceeded);
        let err = p.check_spend(amt(200_000)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DailyLimitExceeded);
        assert!(p.check_spend(amt(100_000)).is_ok());
    }

    #[test]
    fn tightening_clamps_spend_and_loosening_does_not_raise_it() {
        let mut p = policy();
        p.record_spend(amt(800_000)).unwrap();

        p.set_limits(amt(500_000), amt(100_000)).unwrap();
        assert_eq!(p.spent_today, amt(500_000));

        p.set_limits(amt(2_000_000), amt(100_000)).unwrap();
        assert_eq!(p.spent_today, amt(500_000));
        assert!(p.is_consistent());
    }

    #[test]
    fn invalid_update_leaves_policy_untouched() {
        let mut p = policy();
        let before = p.clone();
        assert!(p.set_limits(amt(10), amt(20)).is_err());
        assert_eq!(p, before);
    }
}
