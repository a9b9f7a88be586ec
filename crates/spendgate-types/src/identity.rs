//! Identity types for Spendgate
//!
//! Principals (owners, delegates, merchants, the custody account) are 20-byte
//! addresses. Records owned by the engine are keyed by strongly typed numeric
//! ids so an agent id can never be passed where a subscription id is expected.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate sequential ID types with common implementations
macro_rules! define_id_type {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[derive(Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Wrap a raw id
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Get the raw value
            pub const fn get(self) -> u64 {
                self.0
            }

            /// The id allocated after this one
            pub fn next(self) -> Option<Self> {
                self.0.checked_add(1).map(Self)
            }

            /// Convert to prefixed string
            pub fn to_prefixed_string(&self) -> String {
                format!("{}#{}", $prefix, self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $prefix, self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

define_id_type!(AgentId, "agent", "Identifier of an agent record, assigned monotonically and never reused");
define_id_type!(SubscriptionId, "sub", "Identifier of a subscription, assigned monotonically per agent");

/// Null-identity check shared by every operation that takes a principal
pub trait AddressExt {
    /// Whether this is the null (all-zero) identity
    fn is_null(&self) -> bool;
}

impl AddressExt for Address {
    fn is_null(&self) -> bool {
        *self == Address::ZERO
    }
}
