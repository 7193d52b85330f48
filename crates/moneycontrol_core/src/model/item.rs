//! Item domain model.
//!
//! # Responsibility
//! - Define the single persisted record: one point-in-time value.
//! - Stay free of persistence mechanics; identity lives in the context.
//!
//! # Invariants
//! - `timestamp` is always set.
//! - Construction and mutation are total; there is nothing to validate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier assigned by the persistence context.
///
/// Not part of `Item` itself; see `ItemRecord` for the managed pairing.
pub type ItemId = Uuid;

/// One persisted record carrying a single timezone-aware instant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    timestamp: DateTime<Utc>,
}

impl Item {
    /// Creates an item holding `timestamp` as-is.
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self { timestamp }
    }

    /// Returns the currently stored instant.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Replaces the stored instant. Last write wins; no history is kept.
    pub fn set_timestamp(&mut self, value: DateTime<Utc>) {
        self.timestamp = value;
    }
}

/// Item paired with the identity its persistence context assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRecord {
    pub id: ItemId,
    pub item: Item,
}

impl ItemRecord {
    pub fn new(id: ItemId, item: Item) -> Self {
        Self { id, item }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.item.timestamp()
    }
}
