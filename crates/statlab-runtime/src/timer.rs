#![forbid(unsafe_code)]

//! Cooperative timer queue.
//!
//! [`TimerQueue`] is the single place scheduled work waits. The host drives
//! it by calling [`TimerQueue::pop_due`] with the current instant and
//! routing each returned [`TimerId`] to whichever component owns it. Timers
//! never run code themselves, so a firing can never touch state its owner
//! has already torn down.
//!
//! # Invariants
//!
//! 1. `pop_due(now)` returns at most one firing per call, earliest due first,
//!    ties broken by registration order.
//! 2. A timer whose token is cancelled is discarded before it can fire. A
//!    cancellation issued while handling one firing therefore takes effect
//!    before the next `pop_due`.
//! 3. Periodic timers re-arm at `due + period`, not `now + period`. A host
//!    that polls late catches up one firing per call with no drift.
//! 4. Ids are never reused.
//!
//! # Failure Modes
//!
//! - Zero period: clamped to 1ms so a periodic timer cannot fire unboundedly
//!   within one instant.
//! - Huge period: clamped to one day. A periodic timer whose next due
//!   instant would overflow the clock is dropped instead of re-armed.

use std::fmt;
use std::time::Duration;

use web_time::Instant;

use crate::cancellation::CancellationToken;

/// Smallest allowed period for a repeating timer.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Largest allowed period for a repeating timer.
pub const MAX_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Identity of a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    /// Raw id, for logging.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

#[derive(Debug)]
struct TimerEntry {
    id: TimerId,
    due: Instant,
    period: Option<Duration>,
    token: CancellationToken,
}

/// Pending timers, polled by the host event loop.
#[derive(Debug, Default)]
pub struct TimerQueue {
    entries: Vec<TimerEntry>,
    next_id: u64,
}

impl TimerQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a timer first due at `first_due`, repeating every `period`
    /// when one is given.
    pub fn schedule(
        &mut self,
        first_due: Instant,
        period: Option<Duration>,
        token: CancellationToken,
    ) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.entries.push(TimerEntry {
            id,
            due: first_due,
            period: period.map(|p| p.clamp(MIN_PERIOD, MAX_PERIOD)),
            token,
        });
        id
    }

    /// Remove a timer directly. Returns `false` if it was not pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Pop the earliest timer due at or before `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<TimerId> {
        self.prune();
        // Entries are kept in registration order, so the first minimum wins ties.
        let (index, _) = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.due <= now)
            .min_by_key(|(_, e)| e.due)?;

        let entry = &mut self.entries[index];
        let id = entry.id;
        match entry.period.and_then(|p| entry.due.checked_add(p)) {
            Some(next) => entry.due = next,
            None => {
                self.entries.remove(index);
            }
        }
        Some(id)
    }

    /// Earliest instant at which a live timer is due.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries
            .iter()
            .filter(|e| !e.token.is_cancelled())
            .map(|e| e.due)
            .min()
    }

    /// Whether `id` is still pending and not cancelled.
    #[must_use]
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.entries
            .iter()
            .any(|e| e.id == id && !e.token.is_cancelled())
    }

    /// Number of live (uncancelled) timers.
    #[must_use]
    pub fn live(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| !e.token.is_cancelled())
            .count()
    }

    /// Whether no live timers remain.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.live() == 0
    }

    fn prune(&mut self) {
        let before = self.entries.len();
        self.entries.retain(|e| !e.token.is_cancelled());
        let dropped = before - self.entries.len();
        if dropped > 0 {
            tracing::trace!(target: "statlab.scheduler", dropped, "cancelled timers discarded");
        }
    }
}
