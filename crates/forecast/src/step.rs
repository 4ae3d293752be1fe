//! Forecast Step

use risk_model::{ClassDistribution, RiskLevel};
use serde::{Deserialize, Serialize};

/// One day-ahead prediction in a forecast sequence. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastStep {
    day_offset: u32,
    level: RiskLevel,
    confidence: f64,
    distribution: ClassDistribution,
}

impl ForecastStep {
    /// Derive a step from a class distribution. Confidence is always the
    /// distribution's own maximum, never supplied by the caller.
    pub fn from_distribution(day_offset: u32, distribution: ClassDistribution) -> Self {
        let (level, confidence) = distribution.argmax();
        Self {
            day_offset,
            level,
            confidence,
            distribution,
        }
    }

    /// Days ahead of the window's last observation, starting at 1
    pub fn day_offset(&self) -> u32 {
        self.day_offset
    }

    pub fn level(&self) -> RiskLevel {
        self.level
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn distribution(&self) -> &ClassDistribution {
        &self.distribution
    }
}
