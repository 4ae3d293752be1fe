//! Feature Window Assembly

use crate::ForecastError;
use risk_model::FeatureVector;
use serde::{Deserialize, Serialize};

/// Sequence window size: days of history the classifier was trained on
pub const WINDOW_SIZE: usize = 7;

/// A fixed-length, ordered window of per-day feature vectors for one
/// region, oldest first. Always exactly `WINDOW_SIZE` timesteps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureWindow {
    timesteps: Vec<FeatureVector>,
}

impl FeatureWindow {
    /// Build a window from the most recent `WINDOW_SIZE` entries of
    /// `history` (ordered oldest to newest). Shorter histories are
    /// rejected rather than padded.
    pub fn from_history(history: &[FeatureVector]) -> Result<Self, ForecastError> {
        if history.len() < WINDOW_SIZE {
            return Err(ForecastError::InsufficientHistory {
                required: WINDOW_SIZE,
                available: history.len(),
            });
        }
        Ok(Self {
            timesteps: history[history.len() - WINDOW_SIZE..].to_vec(),
        })
    }

    pub fn as_slice(&self) -> &[FeatureVector] {
        &self.timesteps
    }

    pub fn latest(&self) -> &FeatureVector {
        // Invariant: timesteps is never empty
        &self.timesteps[WINDOW_SIZE - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(value: f64, count: usize) -> Vec<FeatureVector> {
        vec![
            FeatureVector {
                water_level_m: value,
                ..Default::default()
            };
            count
        ]
    }

    #[test]
    fn test_exact_length_accepted() {
        let window = FeatureWindow::from_history(&flat(3.0, WINDOW_SIZE)).unwrap();
        assert_eq!(window.as_slice().len(), WINDOW_SIZE);
    }

    #[test]
    fn test_short_history_rejected() {
        let err = FeatureWindow::from_history(&flat(3.0, WINDOW_SIZE - 1)).unwrap_err();
        match err {
            ForecastError::InsufficientHistory {
                required,
                available,
            } => {
                assert_eq!(required, WINDOW_SIZE);
                assert_eq!(available, WINDOW_SIZE - 1);
            }
            other => panic!("expected InsufficientHistory, got {other:?}"),
        }
    }

    #[test]
    fn test_longer_history_keeps_most_recent() {
        let mut history = flat(1.0, 3);
        history.extend(flat(9.0, WINDOW_SIZE));
        let window = FeatureWindow::from_history(&history).unwrap();
        assert!(window.as_slice().iter().all(|v| v.water_level_m == 9.0));
        assert_eq!(window.latest().water_level_m, 9.0);
    }
}
