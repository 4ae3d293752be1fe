//! Autoregressive Forecast Driver

use crate::extrapolate::Extrapolation;
use crate::step::ForecastStep;
use crate::window::FeatureWindow;
use crate::ForecastError;
use risk_model::{FeatureVector, Region, RiskPredictor};
use std::sync::Arc;
use tracing::debug;

/// Floating tolerance for the distribution-sum check
pub const DISTRIBUTION_TOLERANCE: f64 = 1e-6;

/// Drives the single-step classifier forward day by day.
///
/// Each iteration queries the predictor with the current window, records a
/// step, then rotates the window with a synthesized next vector. The call
/// is all-or-nothing: any predictor failure discards the partial sequence.
pub struct ForecastEngine {
    predictor: Arc<dyn RiskPredictor>,
    extrapolation: Box<dyn Extrapolation>,
}

impl ForecastEngine {
    pub fn new(predictor: Arc<dyn RiskPredictor>, extrapolation: Box<dyn Extrapolation>) -> Self {
        Self {
            predictor,
            extrapolation,
        }
    }

    /// Produce a `days_ahead`-step forecast for one region.
    ///
    /// Side-effect free apart from the predictor calls.
    pub async fn forecast(
        &self,
        region: &Region,
        window: &FeatureWindow,
        days_ahead: u32,
    ) -> Result<Vec<ForecastStep>, ForecastError> {
        let mut current: Vec<FeatureVector> = window.as_slice().to_vec();
        let mut steps = Vec::with_capacity(days_ahead as usize);

        for day_offset in 1..=days_ahead {
            let distribution = self.predictor.predict(&current).await?;
            if !distribution.is_normalized(DISTRIBUTION_TOLERANCE) {
                return Err(ForecastError::InvalidDistribution {
                    sum: distribution.sum(),
                });
            }

            let step = ForecastStep::from_distribution(day_offset, distribution);
            debug!(
                region = %region.name,
                day_offset,
                level = %step.level(),
                confidence = step.confidence(),
                "forecast step"
            );
            steps.push(step);

            // Roll the window: drop the oldest day, append the synthesized
            // next one.
            let next = self.extrapolation.next_vector(&current);
            current.remove(0);
            current.push(next);
        }

        Ok(steps)
    }
}
