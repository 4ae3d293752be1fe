//! Risk Level Taxonomy

use serde::{Deserialize, Serialize};

/// Number of risk classes in the model output
pub const LEVEL_COUNT: usize = 3;

/// All risk levels in ascending severity, matching the classifier's
/// output ordering.
pub const LEVELS: [RiskLevel; LEVEL_COUNT] = [RiskLevel::Yellow, RiskLevel::Orange, RiskLevel::Red];

/// Flood risk level for a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    /// Advisory conditions
    Yellow,
    /// Elevated risk, preparation required
    Orange,
    /// Severe risk, immediate action required
    Red,
}

impl RiskLevel {
    /// Get string representation (also the database column value)
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Yellow => "Yellow",
            RiskLevel::Orange => "Orange",
            RiskLevel::Red => "Red",
        }
    }

    /// Index into class-probability arrays
    pub fn index(&self) -> usize {
        match self {
            RiskLevel::Yellow => 0,
            RiskLevel::Orange => 1,
            RiskLevel::Red => 2,
        }
    }

    /// Parse the database/wire representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Yellow" => Some(RiskLevel::Yellow),
            "Orange" => Some(RiskLevel::Orange),
            "Red" => Some(RiskLevel::Red),
            _ => None,
        }
    }

    /// Whether this level warrants every configured notification channel
    pub fn is_high_severity(&self) -> bool {
        matches!(self, RiskLevel::Orange | RiskLevel::Red)
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
