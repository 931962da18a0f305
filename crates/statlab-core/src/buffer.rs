#![forbid(unsafe_code)]

//! Bounded sample buffer with incrementally maintained aggregates.
//!
//! [`SampleBuffer`] keeps the most recent `capacity` samples in arrival
//! order and evicts the oldest first. Alongside the items it maintains
//! [`Aggregates`] (count, sum, sum of squares, success count) by delta on
//! every push, eviction, and edit, so reading statistics never needs a pass
//! over the items.
//!
//! # Invariants
//!
//! 1. `len() <= capacity()` after every operation.
//! 2. `aggregates()` equals the fold of the current items (up to
//!    floating-point rounding of the incremental sums).
//! 3. `push` evicts before it adds, so the aggregates never describe more
//!    than `capacity` items.
//! 4. `replace_all` builds the new items and aggregates off to the side and
//!    swaps both in together. No caller can observe new items with old
//!    aggregates or the reverse.
//! 5. Item order is arrival order; ids are strictly increasing front to back
//!    for trial-generated samples.
//!
//! # Failure Modes
//!
//! - Zero capacity: construction fails with [`BufferError::ZeroCapacity`].
//! - Editing an id that is no longer present (evicted, reset): returns
//!   [`EditOutcome::Stale`] and changes nothing. This is an expected race
//!   between a drag and an ongoing simulation, not an error.
//! - Non-finite values: edits are rejected as [`EditOutcome::Rejected`],
//!   pushes are refused, and `replace_all` drops them, so a NaN can never
//!   enter the sums.

use std::collections::VecDeque;
use std::fmt;

use crate::sample::{Sample, SampleId};
use crate::stats::StatSnapshot;

/// Buffer construction errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// A buffer must hold at least one sample.
    ZeroCapacity,
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroCapacity => f.write_str("sample buffer capacity must be at least 1"),
        }
    }
}

impl std::error::Error for BufferError {}

/// Running aggregates over the buffer's items.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Aggregates {
    /// Number of items.
    pub count: usize,
    /// Sum of values.
    pub sum: f64,
    /// Sum of squared values.
    pub sum_squares: f64,
    /// Number of items whose outcome is a success.
    pub success_count: usize,
}

impl Aggregates {
    /// Fold a sequence of samples from scratch.
    #[must_use]
    pub fn fold<'a>(samples: impl IntoIterator<Item = &'a Sample>) -> Self {
        let mut agg = Self::default();
        for sample in samples {
            agg.add(sample);
        }
        agg
    }

    fn add(&mut self, sample: &Sample) {
        self.count += 1;
        self.sum += sample.value;
        self.sum_squares += sample.value * sample.value;
        if sample.outcome {
            self.success_count += 1;
        }
    }

    fn remove(&mut self, sample: &Sample) {
        self.count -= 1;
        if self.count == 0 {
            // Drop accumulated rounding residue once the buffer is empty.
            *self = Self::default();
            return;
        }
        self.sum -= sample.value;
        self.sum_squares -= sample.value * sample.value;
        if sample.outcome {
            self.success_count -= 1;
        }
    }
}

/// Result of [`SampleBuffer::edit`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditOutcome {
    /// The value changed from `previous`.
    Applied { previous: f64 },
    /// The sample already had this value; nothing changed.
    Unchanged,
    /// No sample with that id is present.
    Stale,
    /// The new value is NaN or infinite.
    Rejected,
}

impl EditOutcome {
    /// Whether the sample still exists after the edit attempt.
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Applied { .. } | Self::Unchanged)
    }
}

/// Bounded FIFO of samples with incremental aggregates.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    items: VecDeque<Sample>,
    capacity: usize,
    aggregates: Aggregates,
}

impl SampleBuffer {
    /// Create an empty buffer holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Result<Self, BufferError> {
        if capacity == 0 {
            return Err(BufferError::ZeroCapacity);
        }
        Ok(Self {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            aggregates: Aggregates::default(),
        })
    }

    /// Maximum number of items.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of items.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the buffer holds no items.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether the next push will evict.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    /// Current aggregates.
    #[inline]
    #[must_use]
    pub fn aggregates(&self) -> &Aggregates {
        &self.aggregates
    }

    /// Items in arrival order (oldest first).
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Sample> + DoubleEndedIterator {
        self.items.iter()
    }

    /// Look up a sample by id.
    #[must_use]
    pub fn get(&self, id: SampleId) -> Option<&Sample> {
        self.items.iter().find(|s| s.id == id)
    }

    /// Whether a sample with this id is present.
    #[must_use]
    pub fn contains(&self, id: SampleId) -> bool {
        self.get(id).is_some()
    }

    /// Append a sample, evicting the oldest one first when full.
    ///
    /// Returns the evicted sample, if any. A sample with a non-finite value
    /// is refused and nothing is evicted; check with [`accepts`](Self::accepts)
    /// first when the caller needs to know.
    pub fn push(&mut self, sample: Sample) -> Option<Sample> {
        if !Self::accepts(sample.value) {
            tracing::debug!(
                target: "statlab.buffer",
                id = sample.id.0,
                "non-finite sample refused"
            );
            return None;
        }
        let evicted = if self.is_full() {
            let old = self.items.pop_front();
            if let Some(old) = &old {
                self.aggregates.remove(old);
                tracing::trace!(
                    target: "statlab.buffer",
                    evicted = old.id.0,
                    "sample evicted"
                );
            }
            old
        } else {
            None
        };
        self.aggregates.add(&sample);
        self.items.push_back(sample);
        evicted
    }

    /// Whether `value` may enter the buffer.
    #[inline]
    #[must_use]
    pub fn accepts(value: f64) -> bool {
        value.is_finite()
    }

    /// Rewrite the value of the sample with `id`, updating aggregates by delta.
    ///
    /// A missing id is a no-op reported as [`EditOutcome::Stale`].
    pub fn edit(&mut self, id: SampleId, value: f64) -> EditOutcome {
        if !Self::accepts(value) {
            return EditOutcome::Rejected;
        }
        let Some(sample) = self.items.iter_mut().find(|s| s.id == id) else {
            tracing::trace!(target: "statlab.buffer", id = id.0, "edit on stale sample ignored");
            return EditOutcome::Stale;
        };
        if sample.value == value {
            return EditOutcome::Unchanged;
        }
        let previous = sample.value;
        self.aggregates.sum += value - previous;
        self.aggregates.sum_squares += value * value - previous * previous;
        sample.value = value;
        EditOutcome::Applied { previous }
    }

    /// Replace every item at once, recomputing aggregates from scratch.
    ///
    /// Non-finite samples are dropped. If more than `capacity` remain, only
    /// the newest `capacity` are kept.
    pub fn replace_all(&mut self, samples: impl IntoIterator<Item = Sample>) {
        let mut items: VecDeque<Sample> = samples
            .into_iter()
            .filter(|s| Self::accepts(s.value))
            .collect();
        let excess = items.len().saturating_sub(self.capacity);
        items.drain(..excess);
        let aggregates = Aggregates::fold(&items);
        tracing::debug!(
            target: "statlab.buffer",
            count = items.len(),
            dropped = excess,
            "buffer replaced"
        );
        self.items = items;
        self.aggregates = aggregates;
    }

    /// Remove every item.
    pub fn clear(&mut self) {
        self.items.clear();
        self.aggregates = Aggregates::default();
    }

    /// Derived statistics over the current aggregates.
    #[must_use]
    pub fn snapshot(&self) -> StatSnapshot {
        StatSnapshot::from_aggregates(&self.aggregates)
    }

    /// Fold the items from scratch. Used to check the incremental sums.
    #[must_use]
    pub fn recomputed(&self) -> Aggregates {
        Aggregates::fold(&self.items)
    }
}
