#![forbid(unsafe_code)]

//! Lesson configuration as data.
//!
//! A [`LessonConfig`] captures every tunable of one simulation widget:
//! buffer capacity, run pacing, transition timing, drag behaviour and the
//! chart scale. Lessons differ mostly in these numbers, so they can live in
//! a TOML or JSON file next to the lesson copy.
//!
//! # Loading
//!
//! ```toml
//! # dice-lesson.toml
//! capacity = 200
//!
//! [batch]
//! count = 20
//! interval_ms = 100
//!
//! [auto]
//! interval_ms = 50
//! target = 1000
//!
//! [drag]
//! axis = "vertical"
//! snap = 0.5
//! ```
//!
//! ```rust,ignore
//! let config = LessonConfig::from_toml_file("dice-lesson.toml")?;
//! let config = LessonConfig::from_json_str(json)?;
//! ```
//!
//! # Defaults
//!
//! Capacity 500, batches of 10 at 100ms, auto runs at 50ms with no target,
//! transitions of 250ms / 300ms / 200ms (enter / update / exit) with
//! ease-out, horizontal drag with revert on cancel.

#[cfg(feature = "config")]
use std::path::Path;
use std::time::Duration;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use statlab_core::{Axis, Easing, LinearScale, ScaleError};
use statlab_scene::{DragConfig, TransitionConfig};

// ---------------------------------------------------------------------------
// Top-level LessonConfig
// ---------------------------------------------------------------------------

/// Everything a [`SimulationWidget`](crate::SimulationWidget) is built from.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct LessonConfig {
    /// Samples kept before FIFO eviction. Default: 500.
    pub capacity: usize,
    /// Batch run pacing.
    pub batch: BatchPolicy,
    /// Auto run pacing.
    pub auto: AutoPolicy,
    /// Scene transition timing.
    pub transitions: TransitionPolicy,
    /// Drag gesture behaviour.
    pub drag: DragPolicy,
    /// Chart scale.
    pub scale: ScalePolicy,
    /// Pointer hit radius in range units. Default: 6.0.
    pub hit_radius: f64,
}

impl Default for LessonConfig {
    fn default() -> Self {
        Self {
            capacity: 500,
            batch: BatchPolicy::default(),
            auto: AutoPolicy::default(),
            transitions: TransitionPolicy::default(),
            drag: DragPolicy::default(),
            scale: ScalePolicy::default(),
            hit_radius: 6.0,
        }
    }
}

impl LessonConfig {
    /// Load from a TOML string.
    #[cfg(feature = "config")]
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(ConfigError::Toml)
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "config")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "config")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(ConfigError::Json)
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "config")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// Check every parameter.
    ///
    /// Returns a list of problems. An empty list means the config is valid.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.capacity == 0 {
            errors.push("capacity must be > 0".into());
        }
        if self.batch.interval_ms == 0 {
            errors.push("batch.interval_ms must be > 0".into());
        }
        if self.auto.interval_ms == 0 {
            errors.push("auto.interval_ms must be > 0".into());
        }
        if self.auto.target == Some(0) {
            errors.push("auto.target must be > 0 when set".into());
        }
        if let Some(step) = self.drag.snap.filter(|s| !(s.is_finite() && *s > 0.0)) {
            errors.push(format!("drag.snap must be a positive number, got {step}"));
        }
        if let Err(err) = self.to_scale() {
            errors.push(format!("scale: {err}"));
        }
        if !(self.hit_radius.is_finite() && self.hit_radius >= 0.0) {
            errors.push(format!("hit_radius must be >= 0, got {}", self.hit_radius));
        }

        errors
    }

    /// `self` if it validates, otherwise every problem at once.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Batch step spacing.
    #[must_use]
    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch.interval_ms)
    }

    /// Auto step spacing.
    #[must_use]
    pub fn auto_interval(&self) -> Duration {
        Duration::from_millis(self.auto.interval_ms)
    }

    /// Build the scene [`TransitionConfig`].
    #[must_use]
    pub fn to_transition_config(&self) -> TransitionConfig {
        TransitionConfig {
            enter: Duration::from_millis(self.transitions.enter_ms),
            update: Duration::from_millis(self.transitions.update_ms),
            exit: Duration::from_millis(self.transitions.exit_ms),
            easing: self.transitions.easing,
        }
    }

    /// Build the [`DragConfig`].
    #[must_use]
    pub fn to_drag_config(&self) -> DragConfig {
        DragConfig {
            axis: self.drag.axis,
            snap: self.drag.snap,
            revert_on_cancel: self.drag.revert_on_cancel,
            relative: self.drag.relative,
        }
    }

    /// Build the chart [`LinearScale`].
    pub fn to_scale(&self) -> Result<LinearScale, ScaleError> {
        Ok(LinearScale::new(self.scale.domain, self.scale.range)?.clamped(self.scale.clamp))
    }

    /// Format as a JSONL line for structured logging.
    #[must_use]
    pub fn to_jsonl(&self) -> String {
        format!(
            r#"{{"schema":"lesson-config-v1","capacity":{},"batch_count":{},"batch_interval_ms":{},"auto_interval_ms":{},"enter_ms":{},"update_ms":{},"exit_ms":{}}}"#,
            self.capacity,
            self.batch.count,
            self.batch.interval_ms,
            self.auto.interval_ms,
            self.transitions.enter_ms,
            self.transitions.update_ms,
            self.transitions.exit_ms,
        )
    }
}

// ---------------------------------------------------------------------------
// Sub-configs (flat, serde-friendly)
// ---------------------------------------------------------------------------

/// Batch run pacing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct BatchPolicy {
    /// Trials per batch. Default: 10.
    pub count: u64,
    /// Milliseconds between steps. Default: 100.
    pub interval_ms: u64,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            count: 10,
            interval_ms: 100,
        }
    }
}

/// Auto run pacing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct AutoPolicy {
    /// Milliseconds between steps. Default: 50.
    pub interval_ms: u64,
    /// Stop once this many trials are completed. Default: none.
    pub target: Option<u64>,
}

impl Default for AutoPolicy {
    fn default() -> Self {
        Self {
            interval_ms: 50,
            target: None,
        }
    }
}

/// Scene transition timing.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct TransitionPolicy {
    /// Default: 250.
    pub enter_ms: u64,
    /// Default: 300.
    pub update_ms: u64,
    /// Default: 200.
    pub exit_ms: u64,
    /// Default: ease_out.
    pub easing: Easing,
}

impl Default for TransitionPolicy {
    fn default() -> Self {
        Self {
            enter_ms: 250,
            update_ms: 300,
            exit_ms: 200,
            easing: Easing::EaseOut,
        }
    }
}

/// Drag gesture behaviour.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct DragPolicy {
    /// Default: horizontal.
    pub axis: Axis,
    /// Value grid step. Default: none.
    pub snap: Option<f64>,
    /// Default: true.
    pub revert_on_cancel: bool,
    /// Default: false.
    pub relative: bool,
}

impl Default for DragPolicy {
    fn default() -> Self {
        Self {
            axis: Axis::Horizontal,
            snap: None,
            revert_on_cancel: true,
            relative: false,
        }
    }
}

/// Chart scale bounds.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ScalePolicy {
    /// Data interval. Default: [0, 10].
    pub domain: (f64, f64),
    /// Coordinate interval. Default: [0, 400].
    pub range: (f64, f64),
    /// Clamp values outside the domain when mapping. Default: false.
    pub clamp: bool,
}

impl Default for ScalePolicy {
    fn default() -> Self {
        Self {
            domain: (0.0, 10.0),
            range: (0.0, 400.0),
            clamp: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can occur when loading a lesson configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    #[cfg(feature = "config")]
    Toml(toml::de::Error),
    /// JSON parse error.
    #[cfg(feature = "config")]
    Json(serde_json::Error),
    /// Validation errors.
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "config")]
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            #[cfg(feature = "config")]
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Validation(errors) => {
                write!(f, "validation errors: {}", errors.join("; "))
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            #[cfg(feature = "config")]
            Self::Toml(e) => Some(e),
            #[cfg(feature = "config")]
            Self::Json(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}
