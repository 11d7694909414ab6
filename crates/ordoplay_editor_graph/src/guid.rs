// SPDX-License-Identifier: MIT OR Apache-2.0
//! GUIDs and the identifier service.
//!
//! Every script element and graph node is addressed by a [`Guid`]. The nil
//! GUID doubles as "no reference" in persisted data.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Globally unique identifier for elements and nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Guid(pub Uuid);

impl Guid {
    /// The nil GUID
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Create a new random GUID
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    /// Build a GUID from a raw 128-bit value
    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    /// Check whether this is the nil GUID
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// `None` for the nil GUID, `Some(self)` otherwise
    pub fn non_nil(self) -> Option<Self> {
        if self.is_nil() {
            None
        } else {
            Some(self)
        }
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for Guid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for Guid {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Identifier service.
///
/// Implementations must never hand out the same GUID twice within a process.
pub trait GuidGenerator: Send + Sync {
    /// Issue a fresh GUID
    fn new_guid(&self) -> Guid;
}

/// Random (v4) GUID generator
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomGuidGenerator;

impl GuidGenerator for RandomGuidGenerator {
    fn new_guid(&self) -> Guid {
        Guid::new_v4()
    }
}

/// Deterministic generator handing out increasing GUIDs.
///
/// Useful for reproducible documents in tools and tests.
#[derive(Debug)]
pub struct SequentialGuidGenerator {
    next: AtomicU64,
}

impl SequentialGuidGenerator {
    /// Create a generator whose first GUID is `first`
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for SequentialGuidGenerator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl GuidGenerator for SequentialGuidGenerator {
    fn new_guid(&self) -> Guid {
        let value = self.next.fetch_add(1, Ordering::Relaxed);
        Guid::from_u128(u128::from(value))
    }
}

/// Old-to-new GUID mapping applied when elements are duplicated or pasted
#[derive(Debug, Clone, Default)]
pub struct GuidRemapper {
    mapping: HashMap<Guid, Guid>,
}

impl GuidRemapper {
    /// Create an empty remapper
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `from` to `to`
    pub fn bind(&mut self, from: Guid, to: Guid) {
        self.mapping.insert(from, to);
    }

    /// Remap a GUID, leaving unbound GUIDs untouched
    pub fn remap(&self, guid: Guid) -> Guid {
        self.mapping.get(&guid).copied().unwrap_or(guid)
    }

    /// Remap an optional GUID
    pub fn remap_opt(&self, guid: Option<Guid>) -> Option<Guid> {
        guid.map(|g| self.remap(g))
    }

    /// Number of bindings
    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    /// Whether no bindings exist
    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}
