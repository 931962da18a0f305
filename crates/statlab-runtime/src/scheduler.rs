#![forbid(unsafe_code)]

//! Simulation scheduler: single steps, batch runs, and auto runs.
//!
//! The scheduler drives a [`TrialGenerator`] into a [`SimulationSession`].
//! A batch or auto run is one periodic timer in the context's
//! [`TimerQueue`](crate::timer::TimerQueue) plus one handle in its
//! [`AnimationLifecycle`](crate::lifecycle::AnimationLifecycle). The
//! handle's cancel thunk cancels the timer's token.
//!
//! # State Machine
//!
//! ```text
//!            step()                   start_batch / start_auto
//!   Idle ──────────► Single ──► Idle     Idle ──────────► Batch | Auto
//!                                          ▲                  │
//!                                          └──────────────────┘
//!                   completion, target reached, stop, reset, generator failure,
//!                   or external cancellation of the run's lifecycle handle
//! ```
//!
//! # Invariants
//!
//! 1. At most one run is active. Starting a run while one is active returns
//!    the existing handle and schedules nothing.
//! 2. `stop` always leaves the session idle and the run's timer cancelled,
//!    whether or not a run was active.
//! 3. `reset` stops before it clears, so no firing can land in a cleared
//!    buffer.
//! 4. A run's first step fires one interval after it starts.
//! 5. If the run's lifecycle handle is cancelled by someone else (widget
//!    reset or teardown), the run is treated as stopped before its next
//!    step.
//!
//! # Failure Modes
//!
//! - Generator failure, including a trial whose value is NaN or infinite:
//!   the run aborts, the session records the message,
//!   [`SessionEvent::RunFailed`] is emitted, and the error is returned.
//!   Samples recorded before the failure stay. Nothing retries.
//! - Lifecycle closed (after teardown): starting a run returns
//!   [`SimError::Lifecycle`] and schedules nothing.

use std::fmt;
use std::time::Duration;

use statlab_core::{BufferError, Sample, SampleBuffer};
use web_time::Instant;

use crate::cancellation::CancellationSource;
use crate::context::RuntimeContext;
use crate::events::SessionEvent;
use crate::generator::{GeneratorError, TrialGenerator};
use crate::lifecycle::{LifecycleError, LifecycleHandle};
use crate::session::{RunMode, SessionSnapshot, SimulationSession};
use crate::telemetry;
use crate::timer::{MAX_PERIOD, TimerId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Scheduler errors.
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    /// The trial generator failed; the run was aborted.
    Generator(GeneratorError),
    /// The widget's lifecycle registry is closed.
    Lifecycle(LifecycleError),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generator(e) => write!(f, "simulation stopped: {e}"),
            Self::Lifecycle(e) => write!(f, "cannot schedule run: {e}"),
        }
    }
}

impl std::error::Error for SimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Generator(e) => Some(e),
            Self::Lifecycle(e) => Some(e),
        }
    }
}

impl From<GeneratorError> for SimError {
    fn from(e: GeneratorError) -> Self {
        Self::Generator(e)
    }
}

impl From<LifecycleError> for SimError {
    fn from(e: LifecycleError) -> Self {
        Self::Lifecycle(e)
    }
}

// ---------------------------------------------------------------------------
// Active run
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum RunKind {
    Batch { remaining: u64, fired: u64 },
    Auto { target: Option<u64> },
}

impl RunKind {
    fn mode(self) -> RunMode {
        match self {
            Self::Batch { .. } => RunMode::Batch,
            Self::Auto { .. } => RunMode::Auto,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveRun {
    kind: RunKind,
    timer: TimerId,
    handle: LifecycleHandle,
}

/// How an active run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunEnd {
    /// All steps fired or the target was reached.
    Completed,
    /// Stopped early.
    Cancelled,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Drives trial generation for one session.
pub struct SimulationScheduler {
    session: SimulationSession,
    generator: Box<dyn TrialGenerator>,
    run: Option<ActiveRun>,
}

impl fmt::Debug for SimulationScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationScheduler")
            .field("session", &self.session)
            .field("run", &self.run)
            .finish_non_exhaustive()
    }
}

impl SimulationScheduler {
    /// Create an idle scheduler over a buffer of `capacity` samples.
    pub fn new(
        capacity: usize,
        generator: impl TrialGenerator + 'static,
    ) -> Result<Self, BufferError> {
        Ok(Self::with_session(SimulationSession::new(capacity)?, generator))
    }

    /// Create an idle scheduler over an existing session.
    pub fn with_session(
        session: SimulationSession,
        generator: impl TrialGenerator + 'static,
    ) -> Self {
        Self {
            session,
            generator: Box::new(generator),
            run: None,
        }
    }

    #[must_use]
    pub fn session(&self) -> &SimulationSession {
        &self.session
    }

    /// Mutable session access for the drag and bulk-replace paths.
    pub fn session_mut(&mut self) -> &mut SimulationSession {
        &mut self.session
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> RunMode {
        self.session.mode()
    }

    /// Lifecycle handle of the active run.
    #[must_use]
    pub fn active_handle(&self) -> Option<LifecycleHandle> {
        self.run.map(|r| r.handle)
    }

    /// Timer of the active run.
    #[must_use]
    pub fn active_timer(&self) -> Option<TimerId> {
        self.run.map(|r| r.timer)
    }

    /// Swap the trial generator. Takes effect at the next step.
    pub fn set_generator(&mut self, generator: impl TrialGenerator + 'static) {
        self.generator = Box::new(generator);
    }

    /// Draw one trial synchronously and record it.
    ///
    /// When idle this is a single-mode step; during a run it records one
    /// extra trial without disturbing the run. A generator failure aborts
    /// any active run.
    pub fn step(&mut self, ctx: &mut RuntimeContext) -> Result<Sample, SimError> {
        self.sync_cancelled(ctx);
        let single = self.run.is_none();
        if single {
            self.session.set_failure(None);
            self.session.set_mode(RunMode::Single, None);
            self.session.request(1);
        }
        let result = self.fire(ctx, RunMode::Single);
        if single && result.is_ok() {
            self.session.set_mode(RunMode::Idle, None);
        }
        result
    }

    /// Schedule `n` steps spaced `interval` apart.
    ///
    /// Returns the run's lifecycle handle. If a run is already active its
    /// handle is returned and nothing new is scheduled. `n == 0` emits
    /// [`SessionEvent::BatchCompleted`] with count 0 and returns `None`.
    pub fn start_batch(
        &mut self,
        ctx: &mut RuntimeContext,
        n: u64,
        interval: Duration,
        now: Instant,
    ) -> Result<Option<LifecycleHandle>, SimError> {
        self.sync_cancelled(ctx);
        if let Some(run) = self.run {
            tracing::debug!(
                target: "statlab.scheduler",
                handle = run.handle.get(),
                "batch start ignored; run already active"
            );
            return Ok(Some(run.handle));
        }
        if ctx.lifecycle.is_closed() {
            return Err(LifecycleError::Closed.into());
        }
        self.session.set_failure(None);
        if n == 0 {
            ctx.emit(SessionEvent::BatchCompleted { count: 0 });
            return Ok(None);
        }
        let run = self.schedule(
            ctx,
            RunKind::Batch {
                remaining: n,
                fired: 0,
            },
            interval,
            now,
        )?;
        self.session.request(n);
        telemetry::record_run_started("batch", Some(n), interval);
        Ok(Some(run.handle))
    }

    /// Schedule steps every `interval` until stopped or until
    /// `trials_completed` reaches `target`.
    ///
    /// Returns `None` without scheduling when the target is already reached.
    pub fn start_auto(
        &mut self,
        ctx: &mut RuntimeContext,
        interval: Duration,
        target: Option<u64>,
        now: Instant,
    ) -> Result<Option<LifecycleHandle>, SimError> {
        self.sync_cancelled(ctx);
        if let Some(run) = self.run {
            tracing::debug!(
                target: "statlab.scheduler",
                handle = run.handle.get(),
                "auto start ignored; run already active"
            );
            return Ok(Some(run.handle));
        }
        if ctx.lifecycle.is_closed() {
            return Err(LifecycleError::Closed.into());
        }
        self.session.set_failure(None);
        if target.is_some_and(|t| self.session.trials_completed() >= t) {
            tracing::debug!(
                target: "statlab.scheduler",
                "auto start skipped; target already reached"
            );
            return Ok(None);
        }
        let run = self.schedule(ctx, RunKind::Auto { target }, interval, now)?;
        if let Some(t) = target {
            self.session
                .request(t.saturating_sub(self.session.trials_completed()));
        }
        telemetry::record_run_started("auto", target, interval);
        Ok(Some(run.handle))
    }

    /// Stop any active run. Idempotent; always leaves the session idle.
    ///
    /// Returns whether a run was active.
    pub fn stop(&mut self, ctx: &mut RuntimeContext) -> bool {
        let stopped = self.end_run(ctx, RunEnd::Cancelled);
        if stopped {
            ctx.emit(SessionEvent::RunStopped {
                completed: self.session.trials_completed(),
            });
        }
        self.session.set_mode(RunMode::Idle, None);
        stopped
    }

    /// Stop, then clear the buffer and counters, then emit
    /// [`SessionEvent::Reset`].
    pub fn reset(&mut self, ctx: &mut RuntimeContext) {
        self.stop(ctx);
        self.session.clear();
        tracing::debug!(target: "statlab.scheduler", "session reset");
        ctx.emit(SessionEvent::Reset);
    }

    /// Handle a timer firing. Returns `Ok(false)` if the timer is not this
    /// scheduler's active run.
    pub fn on_timer(&mut self, ctx: &mut RuntimeContext, id: TimerId) -> Result<bool, SimError> {
        self.sync_cancelled(ctx);
        let Some(run) = self.run else {
            return Ok(false);
        };
        if run.timer != id {
            return Ok(false);
        }

        match run.kind {
            RunKind::Batch { remaining, fired } => {
                self.fire(ctx, RunMode::Batch)?;
                let fired = fired + 1;
                let remaining = remaining.saturating_sub(1);
                if remaining == 0 {
                    self.end_run(ctx, RunEnd::Completed);
                    self.session.set_mode(RunMode::Idle, None);
                    ctx.emit(SessionEvent::BatchCompleted { count: fired });
                } else if let Some(active) = self.run.as_mut() {
                    active.kind = RunKind::Batch { remaining, fired };
                }
            }
            RunKind::Auto { target } => {
                let reached = |session: &SimulationSession| {
                    target.is_some_and(|t| session.trials_completed() >= t)
                };
                if !reached(&self.session) {
                    self.fire(ctx, RunMode::Auto)?;
                }
                if reached(&self.session) {
                    self.end_run(ctx, RunEnd::Completed);
                    self.session.set_mode(RunMode::Idle, None);
                    ctx.emit(SessionEvent::RunStopped {
                        completed: self.session.trials_completed(),
                    });
                }
            }
        }
        Ok(true)
    }

    /// Snapshot of the session for host persistence.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn schedule(
        &mut self,
        ctx: &mut RuntimeContext,
        kind: RunKind,
        interval: Duration,
        now: Instant,
    ) -> Result<ActiveRun, SimError> {
        let source = CancellationSource::new();
        let token = source.token();
        let handle = ctx.lifecycle.register(Box::new(move || source.cancel()))?;
        let interval = interval.min(MAX_PERIOD);
        // At the end of the clock the first step is due immediately.
        let first_due = now.checked_add(interval).unwrap_or(now);
        let timer = ctx.timers.schedule(first_due, Some(interval), token);
        let run = ActiveRun {
            kind,
            timer,
            handle,
        };
        self.run = Some(run);
        let target = match kind {
            RunKind::Auto { target } => target,
            RunKind::Batch { .. } => None,
        };
        self.session.set_mode(kind.mode(), target);
        Ok(run)
    }

    /// Draw, record, and announce one trial.
    ///
    /// A trial with a non-finite value counts as a generator failure.
    fn fire(&mut self, ctx: &mut RuntimeContext, mode: RunMode) -> Result<Sample, SimError> {
        let drawn = self.generator.generate().and_then(|trial| {
            if SampleBuffer::accepts(trial.value) {
                Ok(trial)
            } else {
                Err(GeneratorError::failed(format!(
                    "non-finite trial value {}",
                    trial.value
                )))
            }
        });
        match drawn {
            Ok(trial) => {
                let sample = self.session.record_trial(trial);
                telemetry::record_trial();
                ctx.emit(SessionEvent::TrialCompleted {
                    sample: sample.clone(),
                });
                Ok(sample)
            }
            Err(err) => {
                let message = err.to_string();
                telemetry::record_generator_failure(mode.as_str(), &message);
                self.end_run(ctx, RunEnd::Cancelled);
                self.session.set_mode(RunMode::Idle, None);
                self.session.set_failure(Some(message.clone()));
                ctx.emit(SessionEvent::RunFailed { message });
                Err(SimError::Generator(err))
            }
        }
    }

    /// Tear down the active run's timer and handle. Returns whether a run
    /// was active.
    fn end_run(&mut self, ctx: &mut RuntimeContext, end: RunEnd) -> bool {
        let Some(run) = self.run.take() else {
            return false;
        };
        ctx.timers.cancel(run.timer);
        match end {
            RunEnd::Completed => {
                ctx.lifecycle.release(run.handle);
            }
            RunEnd::Cancelled => {
                ctx.lifecycle.cancel(run.handle);
            }
        }
        telemetry::record_run_finished(
            run.kind.mode().as_str(),
            self.session.trials_completed(),
            end == RunEnd::Cancelled,
        );
        true
    }

    /// Notice a run whose handle someone else cancelled.
    fn sync_cancelled(&mut self, ctx: &mut RuntimeContext) {
        let Some(run) = self.run else {
            return;
        };
        if ctx.lifecycle.contains(run.handle) {
            return;
        }
        tracing::debug!(
            target: "statlab.scheduler",
            handle = run.handle.get(),
            "run handle cancelled externally; going idle"
        );
        self.end_run(ctx, RunEnd::Cancelled);
        self.session.set_mode(RunMode::Idle, None);
        ctx.emit(SessionEvent::RunStopped {
            completed: self.session.trials_completed(),
        });
    }

    /// Bring the scheduler in line with its lifecycle registry.
    ///
    /// Hosts call this after cancelling handles in bulk.
    pub fn sync(&mut self, ctx: &mut RuntimeContext) {
        self.sync_cancelled(ctx);
    }
}
