#![forbid(unsafe_code)]

//! Derived statistics over running aggregates.
//!
//! Everything here is a pure function of [`Aggregates`]; nothing is stored.
//! An empty buffer yields a snapshot whose statistics are all `None` rather
//! than NaN, so a chart never silently plots `NaN`.

use crate::buffer::Aggregates;

/// Point-in-time derived statistics.
///
/// `variance` is the population variance (divide by `n`); `sample_variance`
/// divides by `n - 1` and is undefined below two samples.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatSnapshot {
    /// Number of samples the statistics cover.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: Option<f64>,
    /// Population variance.
    pub variance: Option<f64>,
    /// Population standard deviation.
    pub std_dev: Option<f64>,
    /// Bessel-corrected variance.
    pub sample_variance: Option<f64>,
    /// Fraction of samples whose outcome is a success.
    pub proportion: Option<f64>,
}

impl StatSnapshot {
    /// The all-undefined snapshot of an empty buffer.
    pub const UNDEFINED: Self = Self {
        count: 0,
        mean: None,
        variance: None,
        std_dev: None,
        sample_variance: None,
        proportion: None,
    };

    /// Compute statistics from aggregates.
    #[must_use]
    pub fn from_aggregates(agg: &Aggregates) -> Self {
        if agg.count == 0 {
            return Self::UNDEFINED;
        }
        let n = agg.count as f64;
        let mean = agg.sum / n;
        // Incremental sums can leave a tiny negative residue; variance is
        // never negative.
        let ss = (agg.sum_squares - agg.sum * mean).max(0.0);
        let variance = ss / n;
        let sample_variance = (agg.count > 1).then(|| ss / (n - 1.0));
        Self {
            count: agg.count,
            mean: Some(mean),
            variance: Some(variance),
            std_dev: Some(variance.sqrt()),
            sample_variance,
            proportion: Some(agg.success_count as f64 / n),
        }
    }

    /// Whether any statistic is defined.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        self.count > 0
    }

    /// Standard error of the mean, `s / sqrt(n)`, using the sample variance.
    #[must_use]
    pub fn standard_error(&self) -> Option<f64> {
        self.sample_variance
            .map(|v| (v / self.count as f64).sqrt())
    }
}
