#![forbid(unsafe_code)]

//! Simulation session state.
//!
//! A [`SimulationSession`] is the data a widget's simulation owns: the
//! bounded sample buffer, trial counters, current run mode, and the
//! failure message of the last aborted run. It holds no timers; the
//! scheduler and the lifecycle registry own those.
//!
//! # Invariants
//!
//! 1. `trials_completed` counts recorded trials since the last reset, not
//!    the buffer length (eviction does not decrement it).
//! 2. User-inserted samples do not count as trials.
//! 3. Sample ids come from one [`SequenceGen`] that survives resets, so ids
//!    are never reused.

use std::fmt;

use statlab_core::{
    BufferError, EditOutcome, Sample, SampleBuffer, SampleId, SequenceGen, StatSnapshot, Trial,
};

/// What the scheduler is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum RunMode {
    /// No run active.
    #[default]
    Idle,
    /// One synchronous step in progress.
    Single,
    /// A fixed number of steps at an interval.
    Batch,
    /// Steps until stopped or a target count is reached.
    Auto,
}

impl RunMode {
    /// Whether a timer-driven run is active.
    #[must_use]
    pub fn is_running(self) -> bool {
        matches!(self, Self::Batch | Self::Auto)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Single => "single",
            Self::Batch => "batch",
            Self::Auto => "auto",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only session counters and statistics, for host persistence.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionSnapshot {
    pub trials_requested: u64,
    pub trials_completed: u64,
    pub mode: RunMode,
    pub target: Option<u64>,
    pub buffered: usize,
    pub stats: StatSnapshot,
    pub failure: Option<String>,
}

/// Buffer, counters, and mode of one simulation.
#[derive(Debug, Clone)]
pub struct SimulationSession {
    buffer: SampleBuffer,
    ids: SequenceGen,
    trials_requested: u64,
    trials_completed: u64,
    mode: RunMode,
    target: Option<u64>,
    failure: Option<String>,
}

impl SimulationSession {
    /// Create an idle session with a buffer of `capacity` samples.
    pub fn new(capacity: usize) -> Result<Self, BufferError> {
        Ok(Self {
            buffer: SampleBuffer::new(capacity)?,
            ids: SequenceGen::new(),
            trials_requested: 0,
            trials_completed: 0,
            mode: RunMode::Idle,
            target: None,
            failure: None,
        })
    }

    #[must_use]
    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    #[must_use]
    pub fn trials_requested(&self) -> u64 {
        self.trials_requested
    }

    #[must_use]
    pub fn trials_completed(&self) -> u64 {
        self.trials_completed
    }

    #[must_use]
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Target count of the active auto run, if any.
    #[must_use]
    pub fn target(&self) -> Option<u64> {
        self.target
    }

    /// Message of the last generator failure, until the next start or reset.
    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// Derived statistics over the buffer.
    #[must_use]
    pub fn stats(&self) -> StatSnapshot {
        self.buffer.snapshot()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            trials_requested: self.trials_requested,
            trials_completed: self.trials_completed,
            mode: self.mode,
            target: self.target,
            buffered: self.buffer.len(),
            stats: self.stats(),
            failure: self.failure.clone(),
        }
    }

    /// Insert a user-placed sample. It gets a fresh id but is not a trial.
    ///
    /// Returns `None` and stamps nothing if the value is not finite.
    pub fn insert(&mut self, trial: Trial) -> Option<Sample> {
        if !SampleBuffer::accepts(trial.value) {
            return None;
        }
        let sample = self.ids.stamp(trial);
        self.buffer.push(sample.clone());
        Some(sample)
    }

    /// Rewrite one sample's value (the drag path).
    pub fn edit(&mut self, id: SampleId, value: f64) -> EditOutcome {
        self.buffer.edit(id, value)
    }

    /// Atomically replace every sample, stamping fresh ids.
    pub fn replace_all(&mut self, trials: impl IntoIterator<Item = Trial>) -> Vec<SampleId> {
        let samples: Vec<Sample> = trials.into_iter().map(|t| self.ids.stamp(t)).collect();
        self.buffer.replace_all(samples);
        self.buffer.iter().map(|s| s.id).collect()
    }

    pub(crate) fn record_trial(&mut self, trial: Trial) -> Sample {
        let sample = self.ids.stamp(trial);
        self.buffer.push(sample.clone());
        self.trials_completed += 1;
        sample
    }

    pub(crate) fn request(&mut self, n: u64) {
        self.trials_requested = self.trials_requested.saturating_add(n);
    }

    pub(crate) fn set_mode(&mut self, mode: RunMode, target: Option<u64>) {
        self.mode = mode;
        self.target = target;
    }

    pub(crate) fn set_failure(&mut self, failure: Option<String>) {
        self.failure = failure;
    }

    /// Clear samples, counters, and failure. Ids keep counting.
    pub(crate) fn clear(&mut self) {
        self.buffer.clear();
        self.trials_requested = 0;
        self.trials_completed = 0;
        self.mode = RunMode::Idle;
        self.target = None;
        self.failure = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_not_a_trial() {
        let mut s = SimulationSession::new(4).unwrap();
        s.insert(Trial::new(2.0, false));
        assert_eq!(s.trials_completed(), 0);
        assert_eq!(s.buffer().len(), 1);
    }

    #[test]
    fn insert_refuses_non_finite() {
        let mut s = SimulationSession::new(4).unwrap();
        assert!(s.insert(Trial::new(f64::NAN, false)).is_none());
        assert!(s.insert(Trial::new(f64::INFINITY, false)).is_none());
        assert!(s.buffer().is_empty());
        assert_eq!(s.stats().mean, None);
    }

    #[test]
    fn completed_counts_past_eviction() {
        let mut s = SimulationSession::new(2).unwrap();
        for v in 0..5 {
            s.record_trial(Trial::new(f64::from(v), false));
        }
        assert_eq!(s.trials_completed(), 5);
        assert_eq!(s.buffer().len(), 2);
    }

    #[test]
    fn clear_keeps_ids_unique() {
        let mut s = SimulationSession::new(4).unwrap();
        let before = s.record_trial(Trial::new(1.0, true)).id;
        s.clear();
        let after = s.record_trial(Trial::new(1.0, true)).id;
        assert!(after > before);
        assert_eq!(s.trials_completed(), 1);
    }

    #[test]
    fn replace_all_returns_kept_ids() {
        let mut s = SimulationSession::new(2).unwrap();
        let ids = s.replace_all((0..3).map(|v| Trial::new(f64::from(v), false)));
        assert_eq!(ids.len(), 2);
        assert_eq!(s.buffer().get(ids[0]).map(|x| x.value), Some(1.0));
    }

    #[test]
    fn snapshot_reflects_state() {
        let mut s = SimulationSession::new(3).unwrap();
        s.request(2);
        s.record_trial(Trial::new(4.0, true));
        let snap = s.snapshot();
        assert_eq!(snap.trials_requested, 2);
        assert_eq!(snap.trials_completed, 1);
        assert_eq!(snap.mode, RunMode::Idle);
        assert_eq!(snap.stats.mean, Some(4.0));
    }
}
