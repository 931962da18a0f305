#![forbid(unsafe_code)]

//! Per-widget registry of cancellable timers and transitions.
//!
//! Every long-lived activity a widget starts (a batch run, an auto run, a
//! reconciliation pass's transition set) registers a cancel thunk here and
//! receives a [`LifecycleHandle`]. Cancelling the handle runs the thunk,
//! which typically flips a [`CancellationSource`](crate::cancellation::CancellationSource)
//! that the timer queue checks before every firing.
//!
//! # Invariants
//!
//! 1. Each thunk runs at most once. `cancel`, `cancel_all`, and `teardown`
//!    remove the entry before invoking it.
//! 2. Cancelling a handle that already completed or was already cancelled
//!    is a no-op returning `false`, never an error.
//! 3. `teardown` cancels everything exactly once and closes the registry;
//!    later `register` calls fail with [`LifecycleError::Closed`] and later
//!    `teardown` calls return 0.
//! 4. `cancel_all` (the reset path) leaves the registry open.
//! 5. Dropping an open registry performs `teardown`.
//!
//! # Failure Modes
//!
//! - Registering after teardown: returns [`LifecycleError::Closed`]. The
//!   caller must not start the activity.

use std::collections::BTreeMap;
use std::fmt;

/// Cancel thunk stored with each handle.
pub type CancelThunk = Box<dyn FnOnce()>;

/// Opaque handle to a registered activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LifecycleHandle(u64);

impl LifecycleHandle {
    /// Raw id, for logging.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LifecycleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle-{}", self.0)
    }
}

/// Lifecycle registry errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleError {
    /// The registry was torn down; nothing new may be registered.
    Closed,
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => {
                f.write_str("animation lifecycle is closed; registration after teardown")
            }
        }
    }
}

impl std::error::Error for LifecycleError {}

/// Registry of outstanding cancellable activities.
pub struct AnimationLifecycle {
    entries: BTreeMap<LifecycleHandle, CancelThunk>,
    next_id: u64,
    closed: bool,
}

impl fmt::Debug for AnimationLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationLifecycle")
            .field("outstanding", &self.entries.len())
            .field("next_id", &self.next_id)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Default for AnimationLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimationLifecycle {
    /// Create an open, empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_id: 0,
            closed: false,
        }
    }

    /// Register a cancel thunk.
    pub fn register(&mut self, thunk: CancelThunk) -> Result<LifecycleHandle, LifecycleError> {
        if self.closed {
            tracing::debug!(target: "statlab.lifecycle", "registration refused after teardown");
            return Err(LifecycleError::Closed);
        }
        let handle = LifecycleHandle(self.next_id);
        self.next_id += 1;
        self.entries.insert(handle, thunk);
        tracing::trace!(
            target: "statlab.lifecycle",
            handle = handle.0,
            outstanding = self.entries.len(),
            "handle registered"
        );
        Ok(handle)
    }

    /// Cancel one handle, running its thunk. Returns `false` if the handle
    /// is unknown, already completed, or already cancelled.
    pub fn cancel(&mut self, handle: LifecycleHandle) -> bool {
        match self.entries.remove(&handle) {
            Some(thunk) => {
                thunk();
                tracing::trace!(target: "statlab.lifecycle", handle = handle.0, "handle cancelled");
                true
            }
            None => false,
        }
    }

    /// Mark a handle as self-completed without running its thunk.
    pub fn release(&mut self, handle: LifecycleHandle) -> bool {
        let released = self.entries.remove(&handle).is_some();
        if released {
            tracing::trace!(target: "statlab.lifecycle", handle = handle.0, "handle released");
        }
        released
    }

    /// Cancel every outstanding handle, oldest first. The registry stays open.
    ///
    /// Returns the number of thunks run.
    pub fn cancel_all(&mut self) -> usize {
        let entries = std::mem::take(&mut self.entries);
        let count = entries.len();
        for (_, thunk) in entries {
            thunk();
        }
        if count > 0 {
            tracing::debug!(
                target: "statlab.lifecycle",
                cancelled = count,
                "all handles cancelled"
            );
        }
        count
    }

    /// Cancel everything and close the registry. Repeated calls return 0.
    pub fn teardown(&mut self) -> usize {
        if self.closed {
            return 0;
        }
        let count = self.cancel_all();
        self.closed = true;
        tracing::debug!(target: "statlab.lifecycle", cancelled = count, "lifecycle torn down");
        count
    }

    /// Number of outstanding handles.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.entries.len()
    }

    /// Whether `handle` is still outstanding.
    #[must_use]
    pub fn contains(&self, handle: LifecycleHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    /// Whether teardown has happened.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for AnimationLifecycle {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counting_thunk(counter: &Rc<Cell<u32>>) -> CancelThunk {
        let counter = Rc::clone(counter);
        Box::new(move || counter.set(counter.get() + 1))
    }

    #[test]
    fn cancel_runs_thunk_once() {
        let hits = Rc::new(Cell::new(0));
        let mut lc = AnimationLifecycle::new();
        let h = lc.register(counting_thunk(&hits)).unwrap();
        assert!(lc.cancel(h));
        assert!(!lc.cancel(h));
        assert_eq!(hits.get(), 1);
        assert_eq!(lc.outstanding(), 0);
    }

    #[test]
    fn release_skips_thunk() {
        let hits = Rc::new(Cell::new(0));
        let mut lc = AnimationLifecycle::new();
        let h = lc.register(counting_thunk(&hits)).unwrap();
        assert!(lc.release(h));
        assert!(!lc.cancel(h));
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn cancel_all_keeps_registry_open() {
        let hits = Rc::new(Cell::new(0));
        let mut lc = AnimationLifecycle::new();
        for _ in 0..3 {
            lc.register(counting_thunk(&hits)).unwrap();
        }
        assert_eq!(lc.cancel_all(), 3);
        assert_eq!(hits.get(), 3);
        assert!(!lc.is_closed());
        assert!(lc.register(counting_thunk(&hits)).is_ok());
    }

    #[test]
    fn cancel_all_tolerates_completed_handles() {
        let hits = Rc::new(Cell::new(0));
        let mut lc = AnimationLifecycle::new();
        let a = lc.register(counting_thunk(&hits)).unwrap();
        let _b = lc.register(counting_thunk(&hits)).unwrap();
        lc.release(a);
        assert_eq!(lc.cancel_all(), 1);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn teardown_closes_exactly_once() {
        let hits = Rc::new(Cell::new(0));
        let mut lc = AnimationLifecycle::new();
        lc.register(counting_thunk(&hits)).unwrap();
        assert_eq!(lc.teardown(), 1);
        assert_eq!(lc.teardown(), 0);
        assert!(lc.is_closed());
        assert_eq!(
            lc.register(counting_thunk(&hits)).unwrap_err(),
            LifecycleError::Closed
        );
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn drop_tears_down() {
        let hits = Rc::new(Cell::new(0));
        {
            let mut lc = AnimationLifecycle::new();
            lc.register(counting_thunk(&hits)).unwrap();
            lc.register(counting_thunk(&hits)).unwrap();
        }
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn drop_after_teardown_does_not_rerun() {
        let hits = Rc::new(Cell::new(0));
        {
            let mut lc = AnimationLifecycle::new();
            lc.register(counting_thunk(&hits)).unwrap();
            lc.teardown();
        }
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn contains_tracks_outstanding() {
        let mut lc = AnimationLifecycle::new();
        let h = lc.register(Box::new(|| {})).unwrap();
        assert!(lc.contains(h));
        lc.cancel(h);
        assert!(!lc.contains(h));
    }
}
