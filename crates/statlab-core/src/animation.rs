#![forbid(unsafe_code)]

//! Easing curves, interpolation, and time-driven tweens.
//!
//! A [`Tween`] interpolates between two values of any [`Interpolate`] type
//! over a fixed duration. It holds no clock: callers pass `now` to
//! [`Tween::sample`], which keeps tweens deterministic under test.
//!
//! # Invariants
//!
//! 1. Easing functions map `[0, 1]` onto `[0, 1]` with `f(0) == 0` and
//!    `f(1) == 1`. Inputs outside the unit interval are clamped first.
//! 2. `Tween::sample` returns exactly `to` once `now >= start + duration`,
//!    and exactly `from` for any `now <= start`.
//! 3. `progress()` is monotone non-decreasing in `now`.
//!
//! # Failure Modes
//!
//! - Zero duration: clamped to 1ns to avoid division by zero, so the tween
//!   completes on the first sample at or after its start.

use std::time::Duration;

use web_time::Instant;

/// Easing curve signature.
pub type EasingFn = fn(f64) -> f64;

/// Identity curve.
#[inline]
#[must_use]
pub fn linear(t: f64) -> f64 {
    t.clamp(0.0, 1.0)
}

/// Quadratic ease-in: slow start.
#[inline]
#[must_use]
pub fn ease_in(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t
}

/// Quadratic ease-out: slow finish.
#[inline]
#[must_use]
pub fn ease_out(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t) * (1.0 - t)
}

/// Quadratic ease-in-out.
#[inline]
#[must_use]
pub fn ease_in_out(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}

/// Named easing curve, for configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Easing {
    Linear,
    EaseIn,
    #[default]
    EaseOut,
    EaseInOut,
}

impl Easing {
    /// The curve function.
    #[must_use]
    pub fn function(self) -> EasingFn {
        match self {
            Self::Linear => linear,
            Self::EaseIn => ease_in,
            Self::EaseOut => ease_out,
            Self::EaseInOut => ease_in_out,
        }
    }

    /// Apply the curve to `t`.
    #[inline]
    #[must_use]
    pub fn apply(self, t: f64) -> f64 {
        (self.function())(t)
    }
}

/// Types that can be blended between two values.
pub trait Interpolate: Clone {
    /// Blend `self` toward `to` by `t` in `[0, 1]`.
    fn lerp(&self, to: &Self, t: f64) -> Self;
}

impl Interpolate for f64 {
    #[inline]
    fn lerp(&self, to: &Self, t: f64) -> Self {
        self + (to - self) * t
    }
}

impl Interpolate for (f64, f64) {
    #[inline]
    fn lerp(&self, to: &Self, t: f64) -> Self {
        (self.0.lerp(&to.0, t), self.1.lerp(&to.1, t))
    }
}

/// Renderable properties of one mark (bar, dot, token) in a chart.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Visual {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub opacity: f64,
}

impl Visual {
    /// A fully opaque mark.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            opacity: 1.0,
        }
    }

    /// Same geometry, different opacity.
    #[must_use]
    pub const fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }
}

impl Interpolate for Visual {
    fn lerp(&self, to: &Self, t: f64) -> Self {
        Self {
            x: self.x.lerp(&to.x, t),
            y: self.y.lerp(&to.y, t),
            width: self.width.lerp(&to.width, t),
            height: self.height.lerp(&to.height, t),
            opacity: self.opacity.lerp(&to.opacity, t),
        }
    }
}

/// A time-driven interpolation between two values.
#[derive(Debug, Clone)]
pub struct Tween<P> {
    from: P,
    to: P,
    start: Instant,
    duration: Duration,
    easing: EasingFn,
}

impl<P: Interpolate> Tween<P> {
    /// Create a tween starting at `start`. Zero duration is clamped to 1ns.
    #[must_use]
    pub fn new(from: P, to: P, start: Instant, duration: Duration) -> Self {
        Self {
            from,
            to,
            start,
            duration: duration.max(Duration::from_nanos(1)),
            easing: ease_out,
        }
    }

    /// Set the easing curve.
    #[must_use]
    pub fn easing(mut self, easing: EasingFn) -> Self {
        self.easing = easing;
        self
    }

    /// Linear progress through the tween at `now`, in `[0, 1]`.
    #[must_use]
    pub fn progress(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.start);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }

    /// Whether the tween has reached its end value at `now`.
    #[must_use]
    pub fn is_complete(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.start) >= self.duration
    }

    /// The interpolated value at `now`.
    #[must_use]
    pub fn sample(&self, now: Instant) -> P {
        if self.is_complete(now) {
            return self.to.clone();
        }
        let t = (self.easing)(self.progress(now));
        self.from.lerp(&self.to, t)
    }

    /// Start value.
    #[must_use]
    pub fn from(&self) -> &P {
        &self.from
    }

    /// End value.
    #[must_use]
    pub fn target(&self) -> &P {
        &self.to
    }

    /// Instant at which the tween reaches its end value.
    #[must_use]
    pub fn end(&self) -> Instant {
        self.start + self.duration
    }
}
