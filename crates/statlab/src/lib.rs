#![forbid(unsafe_code)]

//! statlab public facade crate.
//!
//! Interactive probability-teaching widgets: run random trials on a
//! schedule, keep live statistics over a bounded sample buffer, animate the
//! samples as chart marks, and let learners drag samples directly.
//!
//! This crate re-exports the component crates and adds the
//! [`SimulationWidget`] that wires them together, the [`LessonConfig`]
//! policy, and the unified [`Error`].

pub mod config;
pub mod error;
pub mod widget;

// --- Core re-exports -------------------------------------------------------

pub use statlab_core::{
    Aggregates, Axis, BufferError, EditOutcome, Easing, Interpolate, LinearScale, Point, Sample,
    SampleBuffer, SampleId, ScaleError, StatSnapshot, Trial, Tween, Visual,
};

// --- Runtime re-exports ----------------------------------------------------

pub use statlab_runtime::{
    AnimationLifecycle, BernoulliSampler, Coin, Dice, GeneratorError, LifecycleError,
    LifecycleHandle, NormalSampler, RunMode, RuntimeContext, SessionEvent, SessionSnapshot,
    SimError, SimulationScheduler, SimulationSession, TrialGenerator, UniformSampler,
};

// --- Scene re-exports ------------------------------------------------------

pub use statlab_scene::{
    DragConfig, DragController, DragUpdate, EditTarget, HoverGate, PassStats, ReconcileOutcome,
    SceneBinder, SceneRenderer, TransitionConfig,
};

// --- Facade ----------------------------------------------------------------

pub use config::{ConfigError, LessonConfig};
pub use error::{Disposition, Error, Result};
pub use widget::{Projection, SimulationWidget, dot_strip};

/// Common imports for lesson code.
pub mod prelude {
    pub use crate::{
        Coin, Dice, DragUpdate, Error, LessonConfig, LinearScale, NormalSampler, Point, Result,
        Sample, SampleId, SceneRenderer, SessionEvent, SimulationWidget, StatSnapshot, Trial,
        TrialGenerator, UniformSampler, Visual,
    };
    pub use web_time::Instant;
}
