//! Identifier types used throughout the cfgplane core.
//!
//! Transactions and targets are identified by caller-supplied strings.
//! Ordering between transactions is carried by [`Index`], which the
//! transaction store assigns once at creation.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from any string-like value.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Unique identifier for a transaction.
    TransactionId
);

string_id!(
    /// Identity of a configuration target (a device or schema domain).
    TargetId
);

string_id!(
    /// The schema family of a target, e.g. `devicesim`.
    TargetType
);

string_id!(
    /// The schema version of a target, e.g. `1.0.x`.
    TargetVersion
);

/// Position of a transaction in the global admission order.
///
/// Index `0` means "not yet assigned"; the store hands out `1, 2, 3, ...`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Index(u64);

impl Index {
    /// The unassigned index.
    pub const NONE: Index = Index(0);

    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Returns true if this index was assigned by a store.
    #[must_use]
    pub const fn is_assigned(&self) -> bool {
        self.0 != 0
    }

    /// The index immediately before this one, if it can exist.
    #[must_use]
    pub fn prev(&self) -> Option<Index> {
        match self.0 {
            0 | 1 => None,
            n => Some(Index(n - 1)),
        }
    }

    /// The index immediately after this one.
    #[must_use]
    pub fn next(&self) -> Index {
        Index(self.0.saturating_add(1))
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque object revision used for optimistic concurrency.
///
/// Revision `0` marks an object that has never been stored.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Revision(u64);

impl Revision {
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn next(&self) -> Revision {
        Revision(self.0 + 1)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
