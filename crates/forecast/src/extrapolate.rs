//! Window Extrapolation Strategies
//!
//! No ground-truth observations exist for future days, so the engine has
//! to synthesize the next timestep itself. This is a modeling
//! simplification, not a forecast of real future inputs, and it is kept
//! behind a strategy trait so it can be replaced without touching the
//! predictor boundary.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use risk_model::FeatureVector;
use std::sync::Mutex;

/// Synthesizes the next feature vector from the current window
pub trait Extrapolation: Send + Sync {
    fn next_vector(&self, window: &[FeatureVector]) -> FeatureVector;
}

/// Scales the previous timestep by a bounded random multiplicative jitter,
/// applied identically to every feature. Default range 0.9..1.1.
pub struct JitterExtrapolation {
    low: f64,
    high: f64,
    rng: Mutex<StdRng>,
}

impl JitterExtrapolation {
    pub fn new() -> Self {
        Self::with_range(0.9, 1.1)
    }

    pub fn with_range(low: f64, high: f64) -> Self {
        Self {
            low,
            high,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Fixed seed, for reproducible forecasts in tests
    pub fn seeded(seed: u64) -> Self {
        Self {
            low: 0.9,
            high: 1.1,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for JitterExtrapolation {
    fn default() -> Self {
        Self::new()
    }
}

impl Extrapolation for JitterExtrapolation {
    fn next_vector(&self, window: &[FeatureVector]) -> FeatureVector {
        let last = window.last().copied().unwrap_or_default();
        let factor = match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(self.low..self.high),
            // A poisoned RNG lock degrades to carrying the vector forward
            Err(_) => 1.0,
        };
        last.scaled(factor)
    }
}

/// Carries the last timestep forward unchanged. Deterministic; used in
/// tests and as a conservative production alternative.
pub struct FlatExtrapolation;

impl Extrapolation for FlatExtrapolation {
    fn next_vector(&self, window: &[FeatureVector]) -> FeatureVector {
        window.last().copied().unwrap_or_default()
    }
}
