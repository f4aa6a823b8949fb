//! Validated environment-slot selections shared by every batched operation.
use smallvec::SmallVec;
use thiserror::Error;

/// Errors raised when a batched call is malformed. Rejected calls never mutate state.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ArgumentError {
    #[error("{what} length {actual} does not match expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("slot {slot} is out of range for {num_slots} slots")]
    SlotOutOfRange { slot: u32, num_slots: usize },
    #[error("slot {slot} appears more than once")]
    DuplicateSlot { slot: u32 },
    #[error("{what} range is empty or non-finite (lo {lo}, hi {hi})")]
    InvalidRange { what: &'static str, lo: f64, hi: f64 },
}

/// Inline capacity covering typical partial-reset batches without allocating.
type SlotVec = SmallVec<[usize; 16]>;

/// A list of distinct, in-range slot indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotIds {
    slots: SlotVec,
}

impl SlotIds {
    /// Validate raw ids against a slot count.
    ///
    /// # Errors
    ///
    /// Returns `ArgumentError::SlotOutOfRange` or `ArgumentError::DuplicateSlot`.
    pub fn new(ids: &[u32], num_slots: usize) -> Result<Self, ArgumentError> {
        let mut seen = vec![false; num_slots];
        let mut slots = SlotVec::with_capacity(ids.len());
        for &id in ids {
            let slot = crate::numbers::u32_to_usize(id);
            let Some(flag) = seen.get_mut(slot) else {
                return Err(ArgumentError::SlotOutOfRange { slot: id, num_slots });
            };
            if *flag {
                return Err(ArgumentError::DuplicateSlot { slot: id });
            }
            *flag = true;
            slots.push(slot);
        }
        Ok(Self { slots })
    }

    /// Every slot in `0..num_slots`, in order.
    #[must_use]
    pub fn all(num_slots: usize) -> Self {
        Self {
            slots: (0..num_slots).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn contains(&self, slot: usize) -> bool {
        self.slots.contains(&slot)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[usize] {
        &self.slots
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.iter().copied()
    }
}
