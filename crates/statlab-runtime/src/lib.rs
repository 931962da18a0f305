#![forbid(unsafe_code)]

//! Runtime: cooperative timers, cancellation, lifecycle, and the trial scheduler.
//!
//! # Role in statlab
//! `statlab-runtime` owns everything that happens *over time*. A widget
//! keeps one [`RuntimeContext`] (timer queue, lifecycle registry, event
//! queue) and one [`SimulationScheduler`]. The host polls
//! [`TimerQueue::pop_due`] with the current instant and hands each due
//! [`TimerId`] to the scheduler.
//!
//! # How it fits in the system
//! Trials flow from a [`TrialGenerator`] into the session's
//! [`SampleBuffer`](statlab_core::SampleBuffer). Every run registers a
//! cancel thunk with the [`AnimationLifecycle`], so a reset or teardown can
//! stop it before its next firing. The scene layer registers its transition
//! sets with the same registry.
//!
//! Nothing here sleeps or spawns threads; every time-dependent call takes an
//! explicit `now`.

pub mod cancellation;
pub mod context;
pub mod events;
pub mod generator;
pub mod lifecycle;
pub mod scheduler;
pub mod session;
pub mod telemetry;
pub mod timer;

pub use cancellation::{CancellationSource, CancellationToken};
pub use context::{MAX_PENDING_EVENTS, RuntimeContext};
pub use events::SessionEvent;
pub use generator::{
    BernoulliSampler, Coin, Dice, GeneratorError, NormalSampler, TrialGenerator, UniformSampler,
};
pub use lifecycle::{AnimationLifecycle, CancelThunk, LifecycleError, LifecycleHandle};
pub use scheduler::{SimError, SimulationScheduler};
pub use session::{RunMode, SessionSnapshot, SimulationSession};
pub use timer::{MAX_PERIOD, MIN_PERIOD, TimerId, TimerQueue};
