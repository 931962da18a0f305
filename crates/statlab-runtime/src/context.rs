#![forbid(unsafe_code)]

//! Per-widget runtime context: timers, lifecycle registry, event queue.
//!
//! # Invariants
//!
//! The host drains events once per frame with
//! [`drain_events`](RuntimeContext::drain_events). The queue never holds
//! more than [`MAX_PENDING_EVENTS`].
//!
//! # Failure Modes
//!
//! - Host never drains: once the cap is reached each new event evicts the
//!   oldest one, logged at debug on `statlab.scheduler`.

use std::collections::VecDeque;

use web_time::Instant;

use crate::events::SessionEvent;
use crate::lifecycle::AnimationLifecycle;
use crate::timer::TimerQueue;

/// Most events kept between two drains.
pub const MAX_PENDING_EVENTS: usize = 4096;

/// Everything a widget's components share on the event loop.
///
/// Components borrow the context for the duration of one operation; none of
/// them keeps a reference to it between calls.
#[derive(Debug, Default)]
pub struct RuntimeContext {
    /// Pending timers.
    pub timers: TimerQueue,
    /// Cancellable activities tied to the widget's lifetime.
    pub lifecycle: AnimationLifecycle,
    events: VecDeque<SessionEvent>,
}

impl RuntimeContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event for the host, evicting the oldest one when full.
    pub fn emit(&mut self, event: SessionEvent) {
        tracing::trace!(target: "statlab.scheduler", event = event.name(), "event queued");
        if self.events.len() >= MAX_PENDING_EVENTS
            && let Some(dropped) = self.events.pop_front()
        {
            tracing::debug!(
                target: "statlab.scheduler",
                dropped = dropped.name(),
                "event queue full; oldest event dropped"
            );
        }
        self.events.push_back(event);
    }

    /// Take every queued event, oldest first.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain(..).collect()
    }

    /// Number of queued events.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// When the host next needs to poll timers.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }
}
