//! Service Configuration
//!
//! Layered settings: built-in defaults, an optional `floodwatch.toml`,
//! then `FLOODWATCH_*` environment overrides. Everything ends up in
//! explicit config structs handed to the components at construction —
//! no process-wide mutable state.

use alerting::DedupConfig;
use monitor::MonitorConfig;
use notify::NotifyConfig;
use risk_model::Region;
use serde::Deserialize;

/// One monitored region
#[derive(Debug, Clone, Deserialize)]
pub struct RegionSetting {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl RegionSetting {
    pub fn to_region(&self) -> Region {
        Region::new(self.name.clone(), self.latitude, self.longitude)
    }
}

/// Email gateway configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmailSettings {
    pub gateway_url: String,
    pub sender: String,
    pub recipients: Vec<String>,
}

/// Notification channel configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifySettings {
    pub send_timeout_ms: u64,
    pub webhook_url: Option<String>,
    pub email: Option<EmailSettings>,
}

impl Default for NotifySettings {
    fn default() -> Self {
        Self {
            send_timeout_ms: 5_000,
            webhook_url: None,
            email: None,
        }
    }
}

impl NotifySettings {
    pub fn dispatcher_config(&self) -> NotifyConfig {
        NotifyConfig {
            send_timeout_ms: self.send_timeout_ms,
        }
    }
}

/// Top-level service settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database_url: String,
    pub listen_addr: String,
    pub regions: Vec<RegionSetting>,
    pub monitor: MonitorConfig,
    pub dedup: DedupConfig,
    pub notify: NotifySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite:flood_alerts.db".to_string(),
            listen_addr: "0.0.0.0:8080".to_string(),
            regions: default_regions(),
            monitor: MonitorConfig::default(),
            dedup: DedupConfig::default(),
            notify: NotifySettings::default(),
        }
    }
}

fn default_regions() -> Vec<RegionSetting> {
    [
        ("Thiruvananthapuram", 8.5241, 76.9366),
        ("Alappuzha", 9.4981, 76.3388),
        ("Ernakulam", 9.9816, 76.2999),
        ("Idukki", 9.8497, 76.9681),
        ("Kozhikode", 11.2588, 75.7804),
        ("Wayanad", 11.6854, 76.1320),
    ]
    .into_iter()
    .map(|(name, latitude, longitude)| RegionSetting {
        name: name.to_string(),
        latitude,
        longitude,
    })
    .collect()
}

impl Settings {
    /// Load defaults, then `floodwatch.toml` (if present), then
    /// `FLOODWATCH_*` environment overrides.
    pub fn load() -> Result<Self, config::ConfigError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name("floodwatch").required(false))
            .add_source(config::Environment::with_prefix("FLOODWATCH").separator("__"))
            .build()?;
        cfg.try_deserialize()
    }

    pub fn regions(&self) -> Vec<Region> {
        self.regions.iter().map(RegionSetting::to_region).collect()
    }
}
