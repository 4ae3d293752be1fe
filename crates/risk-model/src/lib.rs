//! Flood Risk Model
//!
//! Defines risk levels, class probability distributions, the feature schema
//! consumed by the classifier, and the predictor boundary trait.

mod distribution;
mod features;
mod level;
mod predictor;

pub use distribution::ClassDistribution;
pub use features::{FeatureVector, Region, FEATURE_DIMENSION};
pub use level::{RiskLevel, LEVELS, LEVEL_COUNT};
pub use predictor::{PredictError, RiskPredictor, ThresholdPredictor};
