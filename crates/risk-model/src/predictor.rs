//! Predictor Boundary

use crate::distribution::ClassDistribution;
use crate::features::FeatureVector;
use crate::level::RiskLevel;
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Errors from the risk classifier
#[derive(Debug, Clone, Error)]
pub enum PredictError {
    /// The classifier backend is unreachable or failed internally
    #[error("Predictor unavailable: {0}")]
    Unavailable(String),
    /// The classifier rejected its input
    #[error("Invalid predictor input: {0}")]
    InvalidInput(String),
}

/// Single-step risk classifier boundary.
///
/// Implementations take the current feature window (oldest to newest) and
/// return a class-probability distribution for the next day. Must be
/// deterministic for identical input within one process run; the forecast
/// engine relies on that when replaying a window.
#[async_trait]
pub trait RiskPredictor: Send + Sync {
    async fn predict(&self, window: &[FeatureVector]) -> Result<ClassDistribution, PredictError>;
}

/// Threshold-rule predictor for development and tests.
///
/// Mirrors the labeling rule the model was trained against: Red when water
/// level or precipitation crosses the severe threshold, Orange in the
/// elevated band, Yellow otherwise. Confidence scales with how far the
/// latest reading sits inside its band.
pub struct ThresholdPredictor {
    severe_water_level_m: f64,
    severe_precipitation_mm: f64,
    elevated_water_level_m: f64,
    elevated_precipitation_mm: f64,
}

impl ThresholdPredictor {
    pub fn new() -> Self {
        Self {
            severe_water_level_m: 7.0,
            severe_precipitation_mm: 200.0,
            elevated_water_level_m: 5.0,
            elevated_precipitation_mm: 150.0,
        }
    }

    fn classify(&self, latest: &FeatureVector) -> (RiskLevel, f64) {
        let wl = latest.water_level_m;
        let pr = latest.precipitation_mm;

        if wl >= self.severe_water_level_m || pr >= self.severe_precipitation_mm {
            let margin = ((wl - self.elevated_water_level_m) / 4.0)
                .max((pr - self.elevated_precipitation_mm) / 100.0);
            (RiskLevel::Red, margin.clamp(0.70, 0.99))
        } else if wl >= self.elevated_water_level_m && pr >= self.elevated_precipitation_mm {
            let margin = (wl - self.elevated_water_level_m) / 2.0;
            (RiskLevel::Orange, (0.60 + margin * 0.3).clamp(0.60, 0.90))
        } else {
            let calm = 1.0 - (wl / self.severe_water_level_m).clamp(0.0, 1.0);
            (RiskLevel::Yellow, (0.50 + calm * 0.45).clamp(0.50, 0.95))
        }
    }
}

impl Default for ThresholdPredictor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RiskPredictor for ThresholdPredictor {
    async fn predict(&self, window: &[FeatureVector]) -> Result<ClassDistribution, PredictError> {
        let latest = window
            .last()
            .ok_or_else(|| PredictError::InvalidInput("empty feature window".to_string()))?;

        let (level, confidence) = self.classify(latest);
        debug!("Threshold predictor: {} at {:.2}", level, confidence);

        // Spread the remaining mass evenly so the distribution sums to 1
        let rest = (1.0 - confidence) / 2.0;
        let mut probabilities = [rest; 3];
        probabilities[level.index()] = confidence;
        Ok(ClassDistribution::new(probabilities))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_with(wl: f64, pr: f64) -> Vec<FeatureVector> {
        vec![FeatureVector {
            water_level_m: wl,
            precipitation_mm: pr,
            ..Default::default()
        }]
    }

    #[tokio::test]
    async fn test_severe_water_level_predicts_red() {
        let predictor = ThresholdPredictor::new();
        let dist = predictor.predict(&window_with(8.0, 50.0)).await.unwrap();
        let (level, confidence) = dist.argmax();
        assert_eq!(level, RiskLevel::Red);
        assert!(confidence >= 0.70);
        assert!(dist.is_normalized(1e-9));
    }

    #[tokio::test]
    async fn test_calm_conditions_predict_yellow() {
        let predictor = ThresholdPredictor::new();
        let dist = predictor.predict(&window_with(2.0, 40.0)).await.unwrap();
        assert_eq!(dist.argmax().0, RiskLevel::Yellow);
    }

    #[tokio::test]
    async fn test_empty_window_is_rejected() {
        let predictor = ThresholdPredictor::new();
        let result = predictor.predict(&[]).await;
        assert!(matches!(result, Err(PredictError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_deterministic_for_identical_input() {
        let predictor = ThresholdPredictor::new();
        let w = window_with(6.1, 180.0);
        let a = predictor.predict(&w).await.unwrap();
        let b = predictor.predict(&w).await.unwrap();
        assert_eq!(a, b);
    }
}
