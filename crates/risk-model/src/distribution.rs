//! Class Probability Distributions

use crate::level::{RiskLevel, LEVELS, LEVEL_COUNT};
use serde::{Deserialize, Serialize};

/// A probability distribution over the risk classes.
///
/// Ordered by `LEVELS`. Well-formed distributions sum to 1; the forecast
/// engine enforces that with a floating tolerance before using one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassDistribution {
    probabilities: [f64; LEVEL_COUNT],
}

impl ClassDistribution {
    pub fn new(probabilities: [f64; LEVEL_COUNT]) -> Self {
        Self { probabilities }
    }

    /// Probability assigned to one class
    pub fn get(&self, level: RiskLevel) -> f64 {
        self.probabilities[level.index()]
    }

    /// Sum over all classes
    pub fn sum(&self) -> f64 {
        self.probabilities.iter().sum()
    }

    /// Whether the distribution sums to 1 within `tolerance`
    pub fn is_normalized(&self, tolerance: f64) -> bool {
        (self.sum() - 1.0).abs() <= tolerance
    }

    /// The most probable class and its probability.
    ///
    /// The probability returned here is the only legitimate source of a
    /// forecast step's confidence value.
    pub fn argmax(&self) -> (RiskLevel, f64) {
        let mut best = LEVELS[0];
        let mut best_p = self.probabilities[0];
        for level in LEVELS.iter().skip(1) {
            let p = self.probabilities[level.index()];
            if p > best_p {
                best = *level;
                best_p = p;
            }
        }
        (best, best_p)
    }

    /// Iterate (level, probability) pairs in class order
    pub fn iter(&self) -> impl Iterator<Item = (RiskLevel, f64)> + '_ {
        LEVELS.iter().map(move |l| (*l, self.probabilities[l.index()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_picks_highest_class() {
        let dist = ClassDistribution::new([0.1, 0.2, 0.7]);
        let (level, confidence) = dist.argmax();
        assert_eq!(level, RiskLevel::Red);
        assert!((confidence - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_argmax_tie_prefers_lower_severity() {
        // Strictly-greater comparison keeps the first (least severe) class
        // on an exact tie.
        let dist = ClassDistribution::new([0.4, 0.4, 0.2]);
        assert_eq!(dist.argmax().0, RiskLevel::Yellow);
    }

    #[test]
    fn test_normalization_tolerance() {
        assert!(ClassDistribution::new([0.3, 0.3, 0.4]).is_normalized(1e-6));
        assert!(ClassDistribution::new([0.3, 0.3, 0.4000005]).is_normalized(1e-6));
        assert!(!ClassDistribution::new([0.5, 0.5, 0.5]).is_normalized(1e-6));
    }
}
