//! Alert Query Routes

use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use storage::AlertRow;

const HOUR_MS: i64 = 60 * 60 * 1000;

/// Window parameters for alert queries
#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    /// Lookback window in hours
    #[serde(default = "default_hours")]
    pub hours: i64,
}

fn default_hours() -> i64 {
    24
}

impl WindowQuery {
    fn since_ms(&self) -> i64 {
        let now_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        now_ms - self.hours.max(0) * HOUR_MS
    }
}

/// Response for the recent-alerts endpoint
#[derive(Debug, Serialize)]
pub struct RecentAlertsResponse {
    pub data: Vec<AlertRow>,
    pub count: usize,
}

/// Response for the per-level counts endpoint
#[derive(Debug, Serialize)]
pub struct LevelCountsResponse {
    pub data: HashMap<String, i64>,
    pub window_hours: i64,
}

/// One region's count
#[derive(Debug, Serialize)]
pub struct RegionCount {
    pub region: String,
    pub count: i64,
}

/// Response for the per-region counts endpoint, busiest first
#[derive(Debug, Serialize)]
pub struct RegionCountsResponse {
    pub data: Vec<RegionCount>,
    pub window_hours: i64,
}

type ApiError = (StatusCode, String);

fn internal(e: impl std::fmt::Display) -> ApiError {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

/// Alerts issued within the window, newest first
pub async fn get_recent(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WindowQuery>,
) -> Result<Json<RecentAlertsResponse>, ApiError> {
    let data = state
        .store
        .recent_alerts(params.since_ms())
        .await
        .map_err(internal)?;
    Ok(Json(RecentAlertsResponse {
        count: data.len(),
        data,
    }))
}

/// Alert counts grouped by risk level
pub async fn get_counts_by_level(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WindowQuery>,
) -> Result<Json<LevelCountsResponse>, ApiError> {
    let counts = state
        .store
        .counts_by_level(params.since_ms())
        .await
        .map_err(internal)?;
    Ok(Json(LevelCountsResponse {
        data: counts
            .into_iter()
            .map(|(level, n)| (level.as_str().to_string(), n))
            .collect(),
        window_hours: params.hours,
    }))
}

/// Alert counts grouped by region
pub async fn get_counts_by_region(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WindowQuery>,
) -> Result<Json<RegionCountsResponse>, ApiError> {
    let counts = state
        .store
        .counts_by_region(params.since_ms())
        .await
        .map_err(internal)?;
    Ok(Json(RegionCountsResponse {
        data: counts
            .into_iter()
            .map(|(region, count)| RegionCount { region, count })
            .collect(),
        window_hours: params.hours,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use risk_model::RiskLevel;
    use storage::{AlertStore, NewAlert};

    async fn state_with_alerts() -> Arc<AppState> {
        let store = Arc::new(AlertStore::in_memory().await.unwrap());
        let now_ms = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        for (region, level, age_hours) in [
            ("R1", RiskLevel::Red, 1),
            ("R1", RiskLevel::Orange, 2),
            ("R2", RiskLevel::Yellow, 48),
        ] {
            store
                .persist(&NewAlert {
                    region: region.to_string(),
                    latitude: 10.0,
                    longitude: 76.0,
                    level,
                    confidence: 0.8,
                    day_offset: 1,
                    issued_at_ms: now_ms - age_hours * HOUR_MS,
                })
                .await
                .unwrap();
        }
        Arc::new(AppState::new(store))
    }

    #[tokio::test]
    async fn test_recent_respects_window() {
        let state = state_with_alerts().await;
        let Json(response) = get_recent(State(state), Query(WindowQuery { hours: 24 }))
            .await
            .unwrap();
        assert_eq!(response.count, 2);
        assert_eq!(response.data[0].region, "R1");
    }

    #[tokio::test]
    async fn test_level_counts_use_string_keys() {
        let state = state_with_alerts().await;
        let Json(response) =
            get_counts_by_level(State(state), Query(WindowQuery { hours: 24 }))
                .await
                .unwrap();
        assert_eq!(response.data.get("Red"), Some(&1));
        assert_eq!(response.data.get("Orange"), Some(&1));
        assert_eq!(response.data.get("Yellow"), None);
    }

    #[tokio::test]
    async fn test_region_counts_ordered_busiest_first() {
        let state = state_with_alerts().await;
        let Json(response) =
            get_counts_by_region(State(state), Query(WindowQuery { hours: 72 }))
                .await
                .unwrap();
        assert_eq!(response.data[0].region, "R1");
        assert_eq!(response.data[0].count, 2);
        assert_eq!(response.data[1].region, "R2");
    }
}
