#![forbid(unsafe_code)]

//! Samples, trials, and their stable identities.
//!
//! A [`Trial`] is what a trial generator produces: a value, a success flag,
//! and an optional label. Once it is recorded it becomes a [`Sample`],
//! stamped with a [`SampleId`] from a [`SequenceGen`]. The id, not the value,
//! is the identity used for keyed diffing and drag targeting; values may be
//! rewritten by a drag, ids never change.

use std::fmt;

/// Stable identity of a recorded sample (its creation sequence number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SampleId(pub u64);

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One generated outcome, before it is recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    /// Numeric value (die face, sampled measurement, 1.0/0.0 for a coin).
    pub value: f64,
    /// Whether this trial counts as a success for proportion statistics.
    pub outcome: bool,
    /// Optional display label ("H", "T", "six").
    pub label: Option<String>,
}

impl Trial {
    /// A trial with a value and success flag, no label.
    #[must_use]
    pub fn new(value: f64, outcome: bool) -> Self {
        Self {
            value,
            outcome,
            label: None,
        }
    }

    /// Attach a display label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A recorded data point, either trial-generated or user-placed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sample {
    /// Creation sequence id; stable for the sample's lifetime.
    pub id: SampleId,
    /// Current value. Only the drag path rewrites it.
    pub value: f64,
    /// Success flag.
    pub outcome: bool,
    /// Optional display label.
    pub label: Option<String>,
}

impl Sample {
    /// Record a trial under the given id.
    #[must_use]
    pub fn from_trial(id: SampleId, trial: Trial) -> Self {
        Self {
            id,
            value: trial.value,
            outcome: trial.outcome,
            label: trial.label,
        }
    }
}

/// Monotonic id allocator. Ids are never reused, even across resets, so a
/// stale reference from before a reset can never alias a new sample.
#[derive(Debug, Clone, Default)]
pub struct SequenceGen {
    next: u64,
}

impl SequenceGen {
    /// Start allocating at 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id.
    pub fn next_id(&mut self) -> SampleId {
        let id = SampleId(self.next);
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    #[must_use]
    pub fn issued(&self) -> u64 {
        self.next
    }

    /// Record a trial with a fresh id.
    pub fn stamp(&mut self, trial: Trial) -> Sample {
        Sample::from_trial(self.next_id(), trial)
    }
}
