//! Plausibility checks applied to every score before it is submitted.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stats::{Measure, StatisticKind};

/// Per-kind plausibility bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationLimits {
    /// Shortest physically possible match, in seconds.
    pub min_fastest_secs: f64,
    /// Ceiling for single-match damage.
    pub max_single_match_damage: i64,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            min_fastest_secs: 10.0,
            max_single_match_damage: 100_000,
        }
    }
}

/// Reason a score was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ValidationError {
    #[error("negative raw score {value}")]
    NegativeScore { value: i64 },

    #[error("percentage {value} outside [0, 100]")]
    PercentageOutOfRange { value: f64 },

    #[error("duration {value}s below minimum {min}s")]
    DurationTooShort { value: f64, min: f64 },

    #[error("value {value} above ceiling {max}")]
    AboveCeiling { value: i64, max: i64 },
}

/// Stateless score validator.
#[derive(Debug, Clone, Default)]
pub struct ScoreValidator {
    limits: ValidationLimits,
}

impl ScoreValidator {
    pub fn new(limits: ValidationLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    pub fn validate(&self, kind: StatisticKind, raw: i64, decimal: f64) -> Result<(), ValidationError> {
        if raw < 0 {
            return Err(ValidationError::NegativeScore { value: raw });
        }

        match kind.measure() {
            Measure::Percentage => {
                // NaN fails the range check as well.
                if !(0.0..=100.0).contains(&decimal) {
                    return Err(ValidationError::PercentageOutOfRange { value: decimal });
                }
            }
            Measure::Duration => {
                let min = self.limits.min_fastest_secs;
                if decimal.is_nan() || decimal < min {
                    return Err(ValidationError::DurationTooShort { value: decimal, min });
                }
            }
            Measure::Magnitude => {
                let max = self.limits.max_single_match_damage;
                if raw > max {
                    return Err(ValidationError::AboveCeiling { value: raw, max });
                }
            }
            Measure::Count => {}
        }

        Ok(())
    }

    pub fn is_valid(&self, kind: StatisticKind, raw: i64, decimal: f64) -> bool {
        self.validate(kind, raw, decimal).is_ok()
    }
}
