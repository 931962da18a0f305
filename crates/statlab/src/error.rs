#![forbid(unsafe_code)]

//! statlab error model and run-level dispositions.
//!
//! # Design Principles
//!
//! 1. **Result everywhere**: nothing in a pointer or timer path panics.
//! 2. **Component errors stay typed**: each crate keeps its own error enum
//!    and [`Error`] wraps them, so callers can match on what matters.
//! 3. **Every error has a disposition**: [`Error::disposition`] tells the
//!    host widget whether to give up, show a stopped run, or carry on.
//!
//! Stale sample references and double-started runs never reach this type;
//! the components absorb them where they happen.

use std::fmt;

use statlab_core::{BufferError, ScaleError};
use statlab_runtime::{GeneratorError, LifecycleError, SimError};

use crate::config::ConfigError;

/// Top-level error for statlab widgets.
#[derive(Debug)]
pub enum Error {
    /// Degenerate or non-finite scale.
    Scale(ScaleError),
    /// Invalid buffer construction.
    Buffer(BufferError),
    /// The trial generator failed or was misconfigured.
    Generator(GeneratorError),
    /// The widget was torn down.
    Lifecycle(LifecycleError),
    /// Configuration could not be loaded or is invalid.
    Config(ConfigError),
}

/// Standard result type for statlab APIs.
pub type Result<T> = std::result::Result<T, Error>;

// ── Disposition ─────────────────────────────────────────────────────────

/// What the host widget should do with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Programming or setup error. Fix the caller; do not retry.
    Fatal,
    /// The active run was aborted. Show a stopped state; the user restarts.
    StopRun,
    /// Nothing to show; the request was dropped.
    Absorb,
}

impl Error {
    /// Determine the disposition of this error.
    #[must_use]
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::Scale(_) | Self::Buffer(_) | Self::Config(_) => Disposition::Fatal,
            Self::Generator(GeneratorError::InvalidParameter { .. }) => Disposition::Fatal,
            Self::Generator(GeneratorError::Failed(_)) => Disposition::StopRun,
            Self::Lifecycle(LifecycleError::Closed) => Disposition::Absorb,
        }
    }

    /// Error type label for telemetry.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Scale(_) => "scale",
            Self::Buffer(_) => "buffer",
            Self::Generator(_) => "generator",
            Self::Lifecycle(_) => "lifecycle",
            Self::Config(_) => "config",
        }
    }

    /// Whether the widget can keep running after this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.disposition(), Disposition::Fatal)
    }
}

// ── Display ─────────────────────────────────────────────────────────────

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scale(err) => write!(f, "{err}"),
            Self::Buffer(err) => write!(f, "{err}"),
            Self::Generator(err) => write!(f, "simulation stopped: {err}"),
            Self::Lifecycle(err) => write!(f, "{err}"),
            Self::Config(err) => write!(f, "config: {err}"),
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fatal => write!(f, "fatal"),
            Self::StopRun => write!(f, "stop_run"),
            Self::Absorb => write!(f, "absorb"),
        }
    }
}

// ── std::error::Error ───────────────────────────────────────────────────

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Scale(err) => Some(err),
            Self::Buffer(err) => Some(err),
            Self::Generator(err) => Some(err),
            Self::Lifecycle(err) => Some(err),
            Self::Config(err) => Some(err),
        }
    }
}

// ── From conversions ────────────────────────────────────────────────────

impl From<ScaleError> for Error {
    fn from(err: ScaleError) -> Self {
        Self::Scale(err)
    }
}

impl From<BufferError> for Error {
    fn from(err: BufferError) -> Self {
        Self::Buffer(err)
    }
}

impl From<GeneratorError> for Error {
    fn from(err: GeneratorError) -> Self {
        Self::Generator(err)
    }
}

impl From<LifecycleError> for Error {
    fn from(err: LifecycleError) -> Self {
        Self::Lifecycle(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<SimError> for Error {
    fn from(err: SimError) -> Self {
        match err {
            SimError::Generator(e) => Self::Generator(e),
            SimError::Lifecycle(e) => Self::Lifecycle(e),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::error::Error as StdError;

    use statlab_core::{LinearScale, SampleBuffer};

    use super::*;

    #[test]
    fn degenerate_scale_is_fatal() {
        let err: Error = LinearScale::new((1.0, 1.0), (0.0, 10.0)).unwrap_err().into();
        assert_eq!(err.disposition(), Disposition::Fatal);
        assert!(!err.is_recoverable());
        assert_eq!(err.error_type(), "scale");
        assert!(StdError::source(&err).is_some());
    }

    #[test]
    fn zero_capacity_is_fatal() {
        let err: Error = SampleBuffer::new(0).unwrap_err().into();
        assert_eq!(err.disposition(), Disposition::Fatal);
    }

    #[test]
    fn generator_failure_stops_run() {
        let err: Error = SimError::Generator(GeneratorError::failed("die fell off table")).into();
        assert_eq!(err.disposition(), Disposition::StopRun);
        assert!(err.is_recoverable());
        assert!(err.to_string().starts_with("simulation stopped"));
        assert!(err.to_string().contains("die fell off table"));
    }

    #[test]
    fn closed_lifecycle_is_absorbed() {
        let err: Error = SimError::Lifecycle(LifecycleError::Closed).into();
        assert_eq!(err.disposition(), Disposition::Absorb);
        assert_eq!(err.error_type(), "lifecycle");
    }

    #[test]
    fn config_validation_is_fatal() {
        let err: Error = ConfigError::Validation(vec!["capacity must be > 0".into()]).into();
        assert_eq!(err.disposition(), Disposition::Fatal);
        assert!(err.to_string().contains("capacity"));
    }

    #[test]
    fn disposition_labels() {
        assert_eq!(Disposition::StopRun.to_string(), "stop_run");
        assert_eq!(Disposition::Absorb.to_string(), "absorb");
    }
}
