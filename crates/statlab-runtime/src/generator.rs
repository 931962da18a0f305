#![forbid(unsafe_code)]

//! Trial generators.
//!
//! The scheduler draws trials through the [`TrialGenerator`] trait and
//! never inspects what a generator models. Any
//! `FnMut() -> Result<Trial, GeneratorError>` closure is a generator; the
//! built-in ones cover the common lesson experiments and are seeded so
//! scenarios replay exactly.
//!
//! # Failure Modes
//!
//! - Invalid parameters (probability outside `[0, 1]`, zero sides, inverted
//!   bounds, negative deviation): constructors return
//!   [`GeneratorError::InvalidParameter`].
//! - A generator that returns [`GeneratorError::Failed`] aborts the current
//!   run; the scheduler does not retry.

use std::fmt;

use rand::distr::{Bernoulli, Uniform};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use statlab_core::Trial;

/// Generator errors.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorError {
    /// A constructor parameter is out of range.
    InvalidParameter { name: &'static str, reason: String },
    /// The generator could not produce a trial.
    Failed(String),
}

impl GeneratorError {
    /// Convenience constructor for runtime failures.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

impl fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter { name, reason } => {
                write!(f, "invalid generator parameter `{name}`: {reason}")
            }
            Self::Failed(msg) => write!(f, "trial generator failed: {msg}"),
        }
    }
}

impl std::error::Error for GeneratorError {}

/// Source of trial outcomes.
pub trait TrialGenerator {
    /// Draw one trial.
    fn generate(&mut self) -> Result<Trial, GeneratorError>;
}

impl<F> TrialGenerator for F
where
    F: FnMut() -> Result<Trial, GeneratorError>,
{
    fn generate(&mut self) -> Result<Trial, GeneratorError> {
        self()
    }
}

fn bernoulli(name: &'static str, p: f64) -> Result<Bernoulli, GeneratorError> {
    Bernoulli::new(p).map_err(|_| GeneratorError::InvalidParameter {
        name,
        reason: format!("{p} is not a probability in [0, 1]"),
    })
}

// ---------------------------------------------------------------------------
// Coin
// ---------------------------------------------------------------------------

/// Coin flip. Heads is value 1.0, a success, labelled `"H"`.
#[derive(Debug, Clone)]
pub struct Coin {
    heads: Bernoulli,
    rng: SmallRng,
}

impl Coin {
    /// A coin landing heads with probability `p`.
    pub fn new(p: f64, seed: u64) -> Result<Self, GeneratorError> {
        Ok(Self {
            heads: bernoulli("p", p)?,
            rng: SmallRng::seed_from_u64(seed),
        })
    }

}

impl TrialGenerator for Coin {
    fn generate(&mut self) -> Result<Trial, GeneratorError> {
        let heads = self.rng.sample(&self.heads);
        let trial = if heads {
            Trial::new(1.0, true).with_label("H")
        } else {
            Trial::new(0.0, false).with_label("T")
        };
        Ok(trial)
    }
}

// ---------------------------------------------------------------------------
// Dice
// ---------------------------------------------------------------------------

/// Roll `count` dice with `sides` faces and record the sum.
///
/// The outcome is a success when the sum equals the target, if one is set.
#[derive(Debug, Clone)]
pub struct Dice {
    face: Uniform<u32>,
    count: u32,
    target: Option<u64>,
    rng: SmallRng,
}

impl Dice {
    pub fn new(sides: u32, count: u32, seed: u64) -> Result<Self, GeneratorError> {
        if sides == 0 {
            return Err(GeneratorError::InvalidParameter {
                name: "sides",
                reason: "a die needs at least one face".into(),
            });
        }
        if count == 0 {
            return Err(GeneratorError::InvalidParameter {
                name: "count",
                reason: "roll at least one die".into(),
            });
        }
        let face = Uniform::new_inclusive(1, sides).map_err(|e| GeneratorError::InvalidParameter {
            name: "sides",
            reason: e.to_string(),
        })?;
        Ok(Self {
            face,
            count,
            target: None,
            rng: SmallRng::seed_from_u64(seed),
        })
    }

    /// Count rolls whose sum equals `target` as successes.
    #[must_use]
    pub fn with_target(mut self, target: u64) -> Self {
        self.target = Some(target);
        self
    }
}

impl TrialGenerator for Dice {
    fn generate(&mut self) -> Result<Trial, GeneratorError> {
        // u32 faces times u32 dice always fit in u64.
        let sum: u64 = (0..self.count)
            .map(|_| u64::from(self.rng.sample(&self.face)))
            .sum();
        let hit = self.target.is_some_and(|t| t == sum);
        Ok(Trial::new(sum as f64, hit).with_label(sum.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Continuous samplers
// ---------------------------------------------------------------------------

/// Uniform draws on `[low, high)`.
#[derive(Debug, Clone)]
pub struct UniformSampler {
    dist: Uniform<f64>,
    success_above: Option<f64>,
    rng: SmallRng,
}

impl UniformSampler {
    pub fn new(low: f64, high: f64, seed: u64) -> Result<Self, GeneratorError> {
        if !(low.is_finite() && high.is_finite() && low < high) {
            return Err(GeneratorError::InvalidParameter {
                name: "bounds",
                reason: format!("[{low}, {high}) is not a finite non-empty interval"),
            });
        }
        let dist = Uniform::new(low, high).map_err(|e| GeneratorError::InvalidParameter {
            name: "bounds",
            reason: e.to_string(),
        })?;
        Ok(Self {
            dist,
            success_above: None,
            rng: SmallRng::seed_from_u64(seed),
        })
    }

    /// Draws strictly above `threshold` count as successes.
    #[must_use]
    pub fn success_above(mut self, threshold: f64) -> Self {
        self.success_above = Some(threshold);
        self
    }
}

impl TrialGenerator for UniformSampler {
    fn generate(&mut self) -> Result<Trial, GeneratorError> {
        let value = self.rng.sample(&self.dist);
        let hit = self.success_above.is_some_and(|t| value > t);
        Ok(Trial::new(value, hit))
    }
}

/// Normal draws.
#[derive(Debug, Clone)]
pub struct NormalSampler {
    dist: Normal<f64>,
    success_above: Option<f64>,
    rng: SmallRng,
}

impl NormalSampler {
    pub fn new(mean: f64, std_dev: f64, seed: u64) -> Result<Self, GeneratorError> {
        if !mean.is_finite() {
            return Err(GeneratorError::InvalidParameter {
                name: "mean",
                reason: "must be finite".into(),
            });
        }
        if std_dev.is_infinite() {
            return Err(GeneratorError::InvalidParameter {
                name: "std_dev",
                reason: "must be finite".into(),
            });
        }
        let dist = Normal::new(mean, std_dev).map_err(|e| GeneratorError::InvalidParameter {
            name: "std_dev",
            reason: e.to_string(),
        })?;
        Ok(Self {
            dist,
            success_above: None,
            rng: SmallRng::seed_from_u64(seed),
        })
    }

    /// Draws strictly above `threshold` count as successes.
    #[must_use]
    pub fn success_above(mut self, threshold: f64) -> Self {
        self.success_above = Some(threshold);
        self
    }
}

impl TrialGenerator for NormalSampler {
    fn generate(&mut self) -> Result<Trial, GeneratorError> {
        let value = self.rng.sample(&self.dist);
        let hit = self.success_above.is_some_and(|t| value > t);
        Ok(Trial::new(value, hit))
    }
}

/// Bernoulli draws with configurable success and failure values.
#[derive(Debug, Clone)]
pub struct BernoulliSampler {
    dist: Bernoulli,
    success_value: f64,
    failure_value: f64,
    rng: SmallRng,
}

impl BernoulliSampler {
    /// Success with probability `p`, recorded as 1.0 / 0.0.
    pub fn new(p: f64, seed: u64) -> Result<Self, GeneratorError> {
        Ok(Self {
            dist: bernoulli("p", p)?,
            success_value: 1.0,
            failure_value: 0.0,
            rng: SmallRng::seed_from_u64(seed),
        })
    }

    /// Record different values for success and failure (e.g. winnings).
    #[must_use]
    pub fn with_values(mut self, success: f64, failure: f64) -> Self {
        self.success_value = success;
        self.failure_value = failure;
        self
    }
}

impl TrialGenerator for BernoulliSampler {
    fn generate(&mut self) -> Result<Trial, GeneratorError> {
        let hit = self.rng.sample(&self.dist);
        let value = if hit {
            self.success_value
        } else {
            self.failure_value
        };
        Ok(Trial::new(value, hit))
    }
}
