//! Forecast Engine
//!
//! Turns the single-step risk classifier into an N-day outlook by rolling
//! the feature window forward autoregressively.

mod engine;
mod extrapolate;
mod step;
mod window;

pub use engine::{ForecastEngine, DISTRIBUTION_TOLERANCE};
pub use extrapolate::{Extrapolation, FlatExtrapolation, JitterExtrapolation};
pub use step::ForecastStep;
pub use window::{FeatureWindow, WINDOW_SIZE};

use risk_model::PredictError;
use thiserror::Error;

/// Errors from forecast construction and execution
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Fewer timesteps than the window size. The caller must backfill
    /// before asking for a forecast.
    #[error("Insufficient history: need {required} timesteps, got {available}")]
    InsufficientHistory { required: usize, available: usize },

    /// The classifier failed mid-forecast. Partial results are discarded.
    #[error("Predictor failed: {0}")]
    Predictor(#[from] PredictError),

    /// The classifier returned probabilities that do not sum to 1
    #[error("Predictor returned a non-normalized distribution (sum = {sum})")]
    InvalidDistribution { sum: f64 },
}
