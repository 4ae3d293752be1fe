//! Feature Schema and Region Reference Data

use serde::{Deserialize, Serialize};

/// Number of engineered features per timestep
pub const FEATURE_DIMENSION: usize = 11;

/// A monitored geographic region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Region name, unique within a deployment
    pub name: String,
    /// Centroid latitude
    pub latitude: f64,
    /// Centroid longitude
    pub longitude: f64,
}

impl Region {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
        }
    }
}

/// One timestep of engineered, scaled features for a region.
///
/// Field order matches the classifier's training layout. Rolling means,
/// lags, and deltas are computed upstream by the data source; this crate
/// only carries them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub water_level_m: f64,
    pub precipitation_mm: f64,
    pub day_of_year: f64,
    pub month: f64,
    pub is_monsoon: f64,
    pub water_level_ma3: f64,
    pub precipitation_ma3: f64,
    pub water_level_lag1: f64,
    pub precipitation_lag1: f64,
    pub water_level_change: f64,
    pub precipitation_change: f64,
}

impl FeatureVector {
    /// Flatten into the classifier's input layout
    pub fn as_array(&self) -> [f64; FEATURE_DIMENSION] {
        [
            self.water_level_m,
            self.precipitation_mm,
            self.day_of_year,
            self.month,
            self.is_monsoon,
            self.water_level_ma3,
            self.precipitation_ma3,
            self.water_level_lag1,
            self.precipitation_lag1,
            self.water_level_change,
            self.precipitation_change,
        ]
    }

    /// Rebuild from the flat layout
    pub fn from_array(values: [f64; FEATURE_DIMENSION]) -> Self {
        Self {
            water_level_m: values[0],
            precipitation_mm: values[1],
            day_of_year: values[2],
            month: values[3],
            is_monsoon: values[4],
            water_level_ma3: values[5],
            precipitation_ma3: values[6],
            water_level_lag1: values[7],
            precipitation_lag1: values[8],
            water_level_change: values[9],
            precipitation_change: values[10],
        }
    }

    /// Multiply every feature by the same factor. Used by the forecast
    /// extrapolation step.
    pub fn scaled(&self, factor: f64) -> Self {
        let mut values = self.as_array();
        for v in values.iter_mut() {
            *v *= factor;
        }
        Self::from_array(values)
    }
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self::from_array([0.0; FEATURE_DIMENSION])
    }
}
