//! Data Source Boundary

use async_trait::async_trait;
use forecast::{FeatureWindow, WINDOW_SIZE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use risk_model::{FeatureVector, Region};
use std::sync::Mutex;
use thiserror::Error;

/// Errors from the observation feed
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("Data source unavailable: {0}")]
    Unavailable(String),
    #[error("Unknown region: {0}")]
    UnknownRegion(String),
    #[error("Not enough history for {region}: {available} timesteps")]
    ShortHistory { region: String, available: usize },
}

/// Supplies the region roster and, per region, the most recent feature
/// window with all engineering (rolling means, lags, deltas, calendar
/// flags) already applied in classifier order.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn regions(&self) -> Result<Vec<Region>, SourceError>;
    async fn feature_window(&self, region: &Region) -> Result<FeatureWindow, SourceError>;
}

/// Synthetic observation feed for development.
///
/// Draws raw water level and precipitation per day, then derives the
/// engineered features the same way the training pipeline does.
pub struct SimulatedSource {
    regions: Vec<Region>,
    rng: Mutex<StdRng>,
}

impl SimulatedSource {
    pub fn new(regions: Vec<Region>) -> Self {
        Self {
            regions,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(regions: Vec<Region>, seed: u64) -> Self {
        Self {
            regions,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn raw_series(&self, days: usize) -> Vec<(f64, f64)> {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        (0..days)
            .map(|_| (rng.gen_range(2.0..8.0), rng.gen_range(0.0..250.0)))
            .collect()
    }
}

/// Engineer the feature window from a raw (water level, precipitation)
/// series, newest last. Needs two lead-in days for the 3-day moving
/// averages and lags.
fn engineer(raw: &[(f64, f64)], day_of_year_start: u32) -> Vec<FeatureVector> {
    let mut vectors = Vec::new();
    for i in 2..raw.len() {
        let (wl, pr) = raw[i];
        let (wl_prev, pr_prev) = raw[i - 1];
        let day_of_year = (day_of_year_start + i as u32) % 365;
        let month = day_of_year / 30 + 1;
        vectors.push(FeatureVector {
            water_level_m: wl,
            precipitation_mm: pr,
            day_of_year: day_of_year as f64,
            month: month as f64,
            is_monsoon: if (6..=9).contains(&month) { 1.0 } else { 0.0 },
            water_level_ma3: (raw[i - 2].0 + wl_prev + wl) / 3.0,
            precipitation_ma3: (raw[i - 2].1 + pr_prev + pr) / 3.0,
            water_level_lag1: wl_prev,
            precipitation_lag1: pr_prev,
            water_level_change: wl - wl_prev,
            precipitation_change: pr - pr_prev,
        });
    }
    vectors
}

#[async_trait]
impl DataSource for SimulatedSource {
    async fn regions(&self) -> Result<Vec<Region>, SourceError> {
        Ok(self.regions.clone())
    }

    async fn feature_window(&self, region: &Region) -> Result<FeatureWindow, SourceError> {
        if !self.regions.iter().any(|r| r.name == region.name) {
            return Err(SourceError::UnknownRegion(region.name.clone()));
        }

        // Two extra lead-in days feed the moving averages and lags
        let raw = self.raw_series(WINDOW_SIZE + 2);
        let history = engineer(&raw, 150);
        FeatureWindow::from_history(&history).map_err(|_| SourceError::ShortHistory {
            region: region.name.clone(),
            available: history.len(),
        })
    }
}
