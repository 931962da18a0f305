#![forbid(unsafe_code)]

//! Linear scale: bidirectional mapping between data values and coordinates.
//!
//! A [`LinearScale`] maps a *domain* interval (data values) onto a *range*
//! interval (pixel or cell coordinates). Every chart, drag gesture, and hit
//! test in a lesson widget goes through one of these instead of hand-rolled
//! interpolation.
//!
//! # Invariants
//!
//! 1. `to_domain(to_range(x)) == x` within floating-point tolerance for every
//!    finite `x` when clamping is off, and for every `x` inside the domain
//!    when clamping is on.
//! 2. Both directions are total over the finite reals: values outside the
//!    domain (or range) extrapolate, or clamp when `clamp` is set.
//! 3. Scales are immutable. A resize produces a new scale via
//!    [`LinearScale::with_range`].
//! 4. Reversed intervals (e.g. a y-axis whose range runs bottom-to-top) are
//!    supported; only zero-width intervals are rejected.
//!
//! # Failure Modes
//!
//! - Zero-width domain or range: construction fails with
//!   [`ScaleError::Degenerate`]. This is a host programming error and is not
//!   recovered from at runtime.
//! - NaN or infinite bounds: construction fails with [`ScaleError::NonFinite`].

use std::fmt;

/// Which interval of a scale an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleAxis {
    /// The data-value interval.
    Domain,
    /// The coordinate interval.
    Range,
}

impl fmt::Display for ScaleAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain => f.write_str("domain"),
            Self::Range => f.write_str("range"),
        }
    }
}

/// Scale construction errors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleError {
    /// The interval has zero width (`min == max`).
    Degenerate { axis: ScaleAxis, value: f64 },
    /// An interval bound is NaN or infinite.
    NonFinite { axis: ScaleAxis },
}

impl fmt::Display for ScaleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Degenerate { axis, value } => {
                write!(f, "degenerate scale: {axis} has zero width at {value}")
            }
            Self::NonFinite { axis } => write!(f, "scale {axis} bound is not finite"),
        }
    }
}

impl std::error::Error for ScaleError {}

/// An immutable linear mapping from a domain interval to a range interval.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LinearScale {
    domain_min: f64,
    domain_max: f64,
    range_min: f64,
    range_max: f64,
    clamp: bool,
}

fn check_interval(axis: ScaleAxis, (lo, hi): (f64, f64)) -> Result<(), ScaleError> {
    if !lo.is_finite() || !hi.is_finite() {
        return Err(ScaleError::NonFinite { axis });
    }
    if lo == hi {
        return Err(ScaleError::Degenerate { axis, value: lo });
    }
    Ok(())
}

impl LinearScale {
    /// Create a non-clamping scale mapping `domain` onto `range`.
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Result<Self, ScaleError> {
        check_interval(ScaleAxis::Domain, domain)?;
        check_interval(ScaleAxis::Range, range)?;
        Ok(Self {
            domain_min: domain.0,
            domain_max: domain.1,
            range_min: range.0,
            range_max: range.1,
            clamp: false,
        })
    }

    /// Set whether out-of-interval inputs clamp instead of extrapolating.
    #[must_use]
    pub fn clamped(mut self, clamp: bool) -> Self {
        self.clamp = clamp;
        self
    }

    /// Same domain and clamping, new range (e.g. after a resize).
    pub fn with_range(&self, range: (f64, f64)) -> Result<Self, ScaleError> {
        Ok(Self::new(self.domain(), range)?.clamped(self.clamp))
    }

    /// Same range and clamping, new domain (e.g. after regenerating data).
    pub fn with_domain(&self, domain: (f64, f64)) -> Result<Self, ScaleError> {
        Ok(Self::new(domain, self.range())?.clamped(self.clamp))
    }

    /// The `(min, max)` domain bounds as constructed.
    #[inline]
    #[must_use]
    pub fn domain(&self) -> (f64, f64) {
        (self.domain_min, self.domain_max)
    }

    /// The `(min, max)` range bounds as constructed.
    #[inline]
    #[must_use]
    pub fn range(&self) -> (f64, f64) {
        (self.range_min, self.range_max)
    }

    /// Whether this scale clamps.
    #[inline]
    #[must_use]
    pub fn is_clamped(&self) -> bool {
        self.clamp
    }

    /// Map a data value to a coordinate.
    #[must_use]
    pub fn to_range(&self, value: f64) -> f64 {
        let t = (value - self.domain_min) / (self.domain_max - self.domain_min);
        let t = if self.clamp { t.clamp(0.0, 1.0) } else { t };
        self.range_min + t * (self.range_max - self.range_min)
    }

    /// Map a coordinate back to a data value.
    #[must_use]
    pub fn to_domain(&self, coord: f64) -> f64 {
        let t = (coord - self.range_min) / (self.range_max - self.range_min);
        let t = if self.clamp { t.clamp(0.0, 1.0) } else { t };
        self.domain_min + t * (self.domain_max - self.domain_min)
    }

    /// Clamp a data value into the domain, regardless of the `clamp` flag.
    ///
    /// Works for reversed domains.
    #[must_use]
    pub fn clamp_to_domain(&self, value: f64) -> f64 {
        let (lo, hi) = ordered(self.domain_min, self.domain_max);
        value.clamp(lo, hi)
    }

    /// Whether `value` lies inside the domain (inclusive).
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        let (lo, hi) = ordered(self.domain_min, self.domain_max);
        (lo..=hi).contains(&value)
    }

    /// Roughly `count` evenly spaced "nice" tick values covering the domain.
    ///
    /// Steps are 1, 2, or 5 times a power of ten. Returns an empty vector
    /// when `count` is zero.
    #[must_use]
    pub fn ticks(&self, count: usize) -> Vec<f64> {
        if count == 0 {
            return Vec::new();
        }
        let (lo, hi) = ordered(self.domain_min, self.domain_max);
        let raw = (hi - lo) / count as f64;
        let magnitude = 10f64.powf(raw.log10().floor());
        let step = [1.0, 2.0, 5.0, 10.0]
            .into_iter()
            .map(|m| m * magnitude)
            .find(|s| *s >= raw)
            .unwrap_or(10.0 * magnitude);

        let first = (lo / step).ceil() as i64;
        let last = (hi / step).floor() as i64;
        (first..=last).map(|i| i as f64 * step).collect()
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b { (a, b) } else { (b, a) }
}
