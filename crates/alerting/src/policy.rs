//! Deduplication Policy Implementation

use forecast::ForecastStep;
use risk_model::{Region, RiskLevel};
use serde::{Deserialize, Serialize};
use storage::{AlertStore, NewAlert, StorageError};
use tracing::debug;

/// A forecast step under consideration for issuance. Lives only within
/// one monitoring pass.
#[derive(Debug, Clone)]
pub struct AlertCandidate {
    pub region: Region,
    pub step: ForecastStep,
    /// Pass timestamp. All candidates of one pass share it so window
    /// checks are consistent within the pass.
    pub generated_at_ms: i64,
}

impl AlertCandidate {
    pub fn new(region: Region, step: ForecastStep, generated_at_ms: i64) -> Self {
        Self {
            region,
            step,
            generated_at_ms,
        }
    }

    /// Shape the candidate for persistence
    pub fn to_new_alert(&self) -> NewAlert {
        NewAlert {
            region: self.region.name.clone(),
            latitude: self.region.latitude,
            longitude: self.region.longitude,
            level: self.step.level(),
            confidence: self.step.confidence(),
            day_offset: self.step.day_offset(),
            issued_at_ms: self.generated_at_ms,
        }
    }
}

/// Issuance configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Confidence threshold for Red alerts (default: 0.70)
    pub red_threshold: f64,
    /// Confidence threshold for Orange alerts (default: 0.60)
    pub orange_threshold: f64,
    /// Confidence threshold for Yellow alerts (default: 0.50)
    pub yellow_threshold: f64,
    /// Suppression window for duplicate (region, level) alerts
    pub suppression_window_ms: i64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            red_threshold: 0.70,
            orange_threshold: 0.60,
            yellow_threshold: 0.50,
            suppression_window_ms: 6 * 60 * 60 * 1000, // 6 hours
        }
    }
}

impl DedupConfig {
    pub fn threshold_for(&self, level: RiskLevel) -> f64 {
        match level {
            RiskLevel::Red => self.red_threshold,
            RiskLevel::Orange => self.orange_threshold,
            RiskLevel::Yellow => self.yellow_threshold,
        }
    }
}

/// Decides whether a candidate becomes a new alert.
///
/// Pure over its inputs apart from the store lookup; callers supply one
/// consistent `now_ms` for every candidate they evaluate in a pass.
pub struct DedupPolicy {
    config: DedupConfig,
}

impl DedupPolicy {
    pub fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Threshold check only. Cheap, no store access; ties qualify.
    pub fn meets_threshold(&self, candidate: &AlertCandidate) -> bool {
        let level = candidate.step.level();
        let threshold = self.config.threshold_for(level);
        if candidate.step.confidence() >= threshold {
            true
        } else {
            debug!(
                region = %candidate.region.name,
                level = %level,
                confidence = candidate.step.confidence(),
                threshold,
                "candidate below threshold"
            );
            false
        }
    }

    /// Full issuance decision: threshold first, then the suppression
    /// window against the store. Only a store failure on this read path
    /// is fatal to a pass.
    pub async fn should_issue(
        &self,
        candidate: &AlertCandidate,
        store: &AlertStore,
        now_ms: i64,
    ) -> Result<bool, StorageError> {
        if !self.meets_threshold(candidate) {
            return Ok(false);
        }

        let since_ms = now_ms - self.config.suppression_window_ms;
        let duplicate = store
            .is_active_duplicate(&candidate.region.name, candidate.step.level(), since_ms)
            .await?;
        if duplicate {
            debug!(
                region = %candidate.region.name,
                level = %candidate.step.level(),
                "candidate suppressed: active alert within window"
            );
        }
        Ok(!duplicate)
    }
}
