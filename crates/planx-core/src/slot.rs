//! # Slots
//!
//! A slot is the resolved identity of one output column of a bound plan node: a
//! stable `SlotId` plus the column's name, type and nullability. Parents refer to
//! their inputs' columns through `Expr::SlotRef`, so ids (not names) are what keep
//! references correct when rules reorder or rename operators.
//!
//! Slots only exist on bound nodes. Asking an unbound node for its slots is an
//! invariant violation (see `PlanError::Unbound`).

use crate::types::DataType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Stable identifier of a resolved column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId(pub u32);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Resolved output column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub id: SlotId,
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    /// Relation name parts the column can be qualified with (e.g. `["sales", "orders"]`).
    pub qualifier: Vec<String>,
}

impl Slot {
    pub fn new(id: SlotId, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            id,
            name: name.into(),
            data_type,
            nullable: true,
            qualifier: Vec::new(),
        }
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_qualifier(mut self, qualifier: Vec<String>) -> Self {
        self.qualifier = qualifier;
        self
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.id)
    }
}

/// Hands out fresh `SlotId`s.
///
/// One generator is shared by every pass working on the same statement so that ids
/// never collide. It is atomic, so concurrent passes may share it through an `Arc`.
#[derive(Debug, Default)]
pub struct SlotIdGenerator {
    next: AtomicU32,
}

impl SlotIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start numbering at `first`, e.g. to continue after ids already in use.
    pub fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
        }
    }

    pub fn next_id(&self) -> SlotId {
        SlotId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_generator_is_unique_across_threads() {
        let ids = Arc::new(SlotIdGenerator::starting_at(10));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..100).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(id.0 >= 10);
                assert!(seen.insert(id), "duplicate slot id {}", id);
            }
        }
        assert_eq!(seen.len(), 400);
    }

    #[test]
    fn test_slot_display() {
        let slot = Slot::new(SlotId(3), "price", DataType::Double);
        assert_eq!(slot.to_string(), "price#3");
        assert!(slot.nullable);
    }
}
