#![forbid(unsafe_code)]

//! Simulation observability: monotonic counters and tracing spans.
//!
//! Counters are process-wide and only ever increase; hosts read them for
//! dashboards or test assertions. Each `record_*` helper bumps its counter
//! and emits a `statlab.run` or `statlab.transition` span with structured
//! fields, plus a debug event on the owning component's target.
//!
//! | Counter                     | Bumped when                                 |
//! |-----------------------------|---------------------------------------------|
//! | `trials_total`              | a trial is recorded                         |
//! | `runs_started_total`        | a batch or auto run is scheduled            |
//! | `runs_cancelled_total`      | a run is stopped before finishing           |
//! | `generator_failures_total`  | a trial generator fails                     |
//! | `transitions_started_total` | a reconciliation pass starts transitions    |

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Monotonic counters
// ---------------------------------------------------------------------------

static TRIALS_TOTAL: AtomicU64 = AtomicU64::new(0);
static RUNS_STARTED_TOTAL: AtomicU64 = AtomicU64::new(0);
static RUNS_CANCELLED_TOTAL: AtomicU64 = AtomicU64::new(0);
static GENERATOR_FAILURES_TOTAL: AtomicU64 = AtomicU64::new(0);
static TRANSITIONS_STARTED_TOTAL: AtomicU64 = AtomicU64::new(0);

/// Total trials recorded.
#[must_use]
pub fn trials_total() -> u64 {
    TRIALS_TOTAL.load(Ordering::Relaxed)
}

/// Total batch and auto runs scheduled.
#[must_use]
pub fn runs_started_total() -> u64 {
    RUNS_STARTED_TOTAL.load(Ordering::Relaxed)
}

/// Total runs stopped before finishing.
#[must_use]
pub fn runs_cancelled_total() -> u64 {
    RUNS_CANCELLED_TOTAL.load(Ordering::Relaxed)
}

/// Total trial generator failures.
#[must_use]
pub fn generator_failures_total() -> u64 {
    GENERATOR_FAILURES_TOTAL.load(Ordering::Relaxed)
}

/// Total element transitions started.
#[must_use]
pub fn transitions_started_total() -> u64 {
    TRANSITIONS_STARTED_TOTAL.load(Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// Run instrumentation
// ---------------------------------------------------------------------------

/// Record one trial.
pub fn record_trial() {
    TRIALS_TOTAL.fetch_add(1, Ordering::Relaxed);
}

/// Record a run being scheduled.
pub fn record_run_started(kind: &str, requested: Option<u64>, interval: Duration) {
    RUNS_STARTED_TOTAL.fetch_add(1, Ordering::Relaxed);
    let interval_ms = interval.as_millis() as u64;

    let _span = tracing::debug_span!(
        "statlab.run",
        kind = %kind,
        interval_ms = interval_ms,
        active = true,
    )
    .entered();

    tracing::debug!(
        target: "statlab.scheduler",
        kind = %kind,
        requested = requested,
        interval_ms = interval_ms,
        "run started"
    );
}

/// Record a run ending. `cancelled` is true when it stopped before finishing.
pub fn record_run_finished(kind: &str, completed: u64, cancelled: bool) {
    if cancelled {
        RUNS_CANCELLED_TOTAL.fetch_add(1, Ordering::Relaxed);
    }

    let _span = tracing::debug_span!(
        "statlab.run",
        kind = %kind,
        completed = completed,
        active = false,
    )
    .entered();

    tracing::debug!(
        target: "statlab.scheduler",
        kind = %kind,
        completed = completed,
        cancelled = cancelled,
        "run finished"
    );
}

/// Record a generator failure.
pub fn record_generator_failure(kind: &str, message: &str) {
    GENERATOR_FAILURES_TOTAL.fetch_add(1, Ordering::Relaxed);
    tracing::warn!(
        target: "statlab.scheduler",
        kind = %kind,
        error = %message,
        "trial generator failed; run aborted"
    );
}

// ---------------------------------------------------------------------------
// Transition instrumentation
// ---------------------------------------------------------------------------

/// Record a reconciliation pass starting transitions.
pub fn record_transitions_started(entered: usize, updated: usize, exited: usize) {
    let total = (entered + updated + exited) as u64;
    TRANSITIONS_STARTED_TOTAL.fetch_add(total, Ordering::Relaxed);

    let _span = tracing::debug_span!(
        "statlab.transition",
        entered = entered as u64,
        updated = updated as u64,
        exited = exited as u64,
    )
    .entered();

    tracing::debug!(
        target: "statlab.scene",
        entered = entered as u64,
        updated = updated as u64,
        exited = exited as u64,
        "reconciliation pass started"
    );
}

// ============================================================================
// Tests
// ============================================================================
