//! Typed identifier newtypes backed by strings.
//!
//! Identifiers in the farm registry are human-readable slugs (`north_paddock`,
//! `north_paddock_b_01`, `rb_040`) rather than random values, so they are
//! ordered and compared as plain strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier string.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Access the inner string.
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

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(ValidationError::EmptyId);
                }
                Ok(Self(trimmed.to_string()))
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a [`Farm`](crate::topology::Farm).
    FarmId
);

define_id!(
    /// Unique identifier for a [`Paddock`](crate::topology::Paddock), derived from its name.
    PaddockId
);

define_id!(
    /// Unique identifier for a [`Bay`](crate::topology::Bay), scoped to its paddock.
    BayId
);

define_id!(
    /// Identifier of a physical device (door, valve, spur, channel supply, level sensor).
    DeviceId
);

impl PaddockId {
    /// Derive a paddock id from its display name.
    ///
    /// Lowercases ASCII letters and collapses every run of other characters
    /// into a single `_`, e.g. `"North Paddock #2"` becomes `north_paddock_2`.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self(slugify(name))
    }
}

impl BayId {
    /// Build the id of the bay at `order` within `paddock`.
    #[must_use]
    pub fn for_order(paddock: &PaddockId, order: u32) -> Self {
        Self(format!("{paddock}_b_{order:02}"))
    }
}

fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_sep = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    slug
}
