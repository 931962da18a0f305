//! Cooperative cancellation tokens for timers and transitions.
//!
//! A [`CancellationSource`] owns the cancel switch; any number of
//! [`CancellationToken`]s observe it. The timer queue checks a timer's token
//! before every firing, and lifecycle cancel thunks flip the source, so a
//! cancelled run can never fire again.
//!
//! Everything runs on one event loop, so the shared flag is an
//! `Rc<Cell<bool>>` rather than an atomic.
//!
//! # Example
//!
//! ```
//! use statlab_runtime::cancellation::CancellationSource;
//!
//! let source = CancellationSource::new();
//! let token = source.token();
//! assert!(!token.is_cancelled());
//! source.cancel();
//! assert!(token.is_cancelled());
//! ```

#![forbid(unsafe_code)]

use std::cell::Cell;
use std::rc::Rc;

/// A cloneable view of a cancellation flag.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    cancelled: Rc<Cell<bool>>,
}

/// The control handle that triggers cancellation.
///
/// Dropping the source does **not** cancel its tokens. Call
/// [`cancel`](Self::cancel) explicitly.
#[derive(Debug)]
pub struct CancellationSource {
    cancelled: Rc<Cell<bool>>,
}

impl CancellationSource {
    /// Create a source whose tokens start uncancelled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancelled: Rc::new(Cell::new(false)),
        }
    }

    /// Obtain a token that observes this source.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            cancelled: Rc::clone(&self.cancelled),
        }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    /// A token with no source; it is never cancelled.
    #[must_use]
    pub fn never() -> Self {
        Self {
            cancelled: Rc::new(Cell::new(false)),
        }
    }

    /// Returns `true` once the source has been cancelled.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_starts_uncancelled() {
        let source = CancellationSource::new();
        let token = source.token();
        assert!(!token.is_cancelled());
        assert!(!source.is_cancelled());
    }

    #[test]
    fn cancel_propagates_to_all_clones() {
        let source = CancellationSource::new();
        let t1 = source.token();
        let t2 = t1.clone();
        let t3 = source.token();
        source.cancel();
        assert!(t1.is_cancelled());
        assert!(t2.is_cancelled());
        assert!(t3.is_cancelled());
    }

    #[test]
    fn cancel_is_idempotent() {
        let source = CancellationSource::new();
        source.cancel();
        source.cancel();
        assert!(source.is_cancelled());
    }

    #[test]
    fn drop_source_does_not_cancel() {
        let source = CancellationSource::new();
        let token = source.token();
        drop(source);
        assert!(!token.is_cancelled());
    }

    #[test]
    fn never_token_stays_live() {
        assert!(!CancellationToken::never().is_cancelled());
    }
}
