//! Timestamps supplied by the hosting execution environment

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds since the unix epoch.
///
/// The engine never reads the wall clock directly; every operation is stamped
/// with the time its host supplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// The "unset" sentinel
    pub const ZERO: Self = Self(0);

    pub const fn as_secs(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        Self(Utc::now().timestamp().max(0) as u64)
    }

    /// Add seconds, saturating at the far end of time
    pub fn plus(self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Checked addition, used where overflow must be reported rather than clamped
    pub fn checked_plus(self, secs: u64) -> Option<Self> {
        self.0.checked_add(secs).map(Self)
    }

    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        i64::try_from(self.0)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}s", self.0),
        }
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp().max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plus_saturates() {
        assert_eq!(Timestamp(u64::MAX - 1).plus(10), Timestamp(u64::MAX));
        assert_eq!(Timestamp(u64::MAX).checked_plus(1), None);
    }

    #[test]
    fn display_is_rfc3339() {
        assert_eq!(Timestamp(0).to_string(), "1970-01-01T00:00:00+00:00");
    }
}
