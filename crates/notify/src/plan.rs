//! Response Plan Lookup

use risk_model::RiskLevel;
use serde::Serialize;

/// Recommended actions attached to an outgoing alert, keyed by level.
/// A static lookup; building one never fails and never blocks dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct ResponsePlan {
    pub level: RiskLevel,
    pub recommendations: Vec<&'static str>,
}

impl ResponsePlan {
    pub fn for_level(level: RiskLevel) -> Self {
        let recommendations = match level {
            RiskLevel::Red => vec![
                "Immediate evacuation of low-lying areas",
                "Deploy emergency response teams",
                "Activate flood shelters",
                "Issue public warnings via all channels",
                "Coordinate with local authorities and relief organizations",
                "Ensure medical facilities are prepared",
            ],
            RiskLevel::Orange => vec![
                "Alert emergency response teams",
                "Prepare flood shelters",
                "Issue weather warnings to public",
                "Monitor water levels closely",
                "Prepare evacuation routes",
            ],
            RiskLevel::Yellow => vec![
                "Monitor weather conditions",
                "Issue advisory to residents",
                "Check drainage systems",
                "Prepare emergency equipment",
            ],
        };
        Self {
            level,
            recommendations,
        }
    }
}
