//! Alert Store Implementation

use crate::StorageError;
use risk_model::RiskLevel;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, info};

/// Notification channels tracked per alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    Email,
    Webhook,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Email => "email",
            ChannelKind::Webhook => "webhook",
        }
    }

    /// Delivery-flag column backing this channel
    fn column(&self) -> &'static str {
        match self {
            ChannelKind::Email => "sent_email",
            ChannelKind::Webhook => "sent_webhook",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An alert about to be persisted. The store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAlert {
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
    pub level: RiskLevel,
    pub confidence: f64,
    pub day_offset: u32,
    pub issued_at_ms: i64,
}

/// A persisted alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRow {
    pub id: i64,
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
    pub level: RiskLevel,
    pub confidence: f64,
    pub day_offset: u32,
    pub issued_at_ms: i64,
    pub sent_email: bool,
    pub sent_webhook: bool,
    pub active: bool,
}

impl AlertRow {
    pub fn delivered(&self, channel: ChannelKind) -> bool {
        match channel {
            ChannelKind::Email => self.sent_email,
            ChannelKind::Webhook => self.sent_webhook,
        }
    }
}

/// Durable alert store backed by SQLite.
///
/// Inserts are atomic with monotonically increasing ids, and every read
/// reflects all prior successful writes on the same store — the dedup
/// policy depends on that.
pub struct AlertStore {
    pool: SqlitePool,
}

impl AlertStore {
    /// Open (or create) a database file and prepare the schema
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        info!("Connected to alert database: {}", url);
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// In-memory store for tests and development. Single connection so the
    /// memory database is shared across all uses of the pool.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                issued_at_ms INTEGER NOT NULL,
                region TEXT NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                level TEXT NOT NULL,
                confidence REAL NOT NULL,
                day_offset INTEGER NOT NULL,
                sent_email INTEGER NOT NULL DEFAULT 0,
                sent_webhook INTEGER NOT NULL DEFAULT 0,
                active INTEGER NOT NULL DEFAULT 1
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_alerts_region_level_time
             ON alerts (region, level, issued_at_ms)",
        )
        .execute(&self.pool)
        .await?;

        // Outcome audit, scored later against observed conditions
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS alert_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                recorded_at_ms INTEGER NOT NULL,
                region TEXT NOT NULL,
                level TEXT NOT NULL,
                confidence REAL NOT NULL,
                actual_outcome TEXT,
                accuracy_score REAL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Append one alert. Returns the assigned id.
    pub async fn persist(&self, alert: &NewAlert) -> Result<i64, StorageError> {
        let result = sqlx::query(
            "INSERT INTO alerts
                (issued_at_ms, region, latitude, longitude, level, confidence, day_offset)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(alert.issued_at_ms)
        .bind(&alert.region)
        .bind(alert.latitude)
        .bind(alert.longitude)
        .bind(alert.level.as_str())
        .bind(alert.confidence)
        .bind(alert.day_offset as i64)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!("Persisted alert {} ({} {})", id, alert.region, alert.level);
        Ok(id)
    }

    /// Whether an active alert for (region, level) was issued after
    /// `since_ms`. This is the dedup policy's core read path.
    pub async fn is_active_duplicate(
        &self,
        region: &str,
        level: RiskLevel,
        since_ms: i64,
    ) -> Result<bool, StorageError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM alerts
             WHERE region = ? AND level = ? AND issued_at_ms > ? AND active = 1",
        )
        .bind(region)
        .bind(level.as_str())
        .bind(since_ms)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Record a channel's delivery outcome. Idempotent per (id, channel):
    /// writing the same flag twice leaves a single delivered record.
    pub async fn mark_delivered(
        &self,
        id: i64,
        channel: ChannelKind,
        success: bool,
    ) -> Result<(), StorageError> {
        let sql = format!("UPDATE alerts SET {} = ? WHERE id = ?", channel.column());
        let result = sqlx::query(&sql)
            .bind(success)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(id));
        }
        Ok(())
    }

    /// Mark an alert inactive. The row stays for audit.
    pub async fn deactivate(&self, id: i64) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE alerts SET active = 0 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(id));
        }
        Ok(())
    }

    /// Fetch one alert by id
    pub async fn get(&self, id: i64) -> Result<Option<AlertRow>, StorageError> {
        let row = sqlx::query("SELECT * FROM alerts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| read_alert(&r)).transpose()
    }

    /// Alerts issued after `since_ms`, newest first
    pub async fn recent_alerts(&self, since_ms: i64) -> Result<Vec<AlertRow>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM alerts WHERE issued_at_ms > ? ORDER BY issued_at_ms DESC",
        )
        .bind(since_ms)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(read_alert).collect()
    }

    /// Per-level alert counts since `since_ms`
    pub async fn counts_by_level(
        &self,
        since_ms: i64,
    ) -> Result<HashMap<RiskLevel, i64>, StorageError> {
        let rows = sqlx::query(
            "SELECT level, COUNT(*) AS n FROM alerts
             WHERE issued_at_ms > ? GROUP BY level",
        )
        .bind(since_ms)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = HashMap::new();
        for row in rows {
            let level_str: String = row.try_get("level")?;
            let level = RiskLevel::parse(&level_str)
                .ok_or_else(|| StorageError::InvalidRow(format!("level '{level_str}'")))?;
            counts.insert(level, row.try_get::<i64, _>("n")?);
        }
        Ok(counts)
    }

    /// Per-region alert counts since `since_ms`, busiest regions first
    pub async fn counts_by_region(
        &self,
        since_ms: i64,
    ) -> Result<Vec<(String, i64)>, StorageError> {
        let rows = sqlx::query(
            "SELECT region, COUNT(*) AS n FROM alerts
             WHERE issued_at_ms > ? GROUP BY region ORDER BY n DESC",
        )
        .bind(since_ms)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Ok((row.try_get("region")?, row.try_get("n")?)))
            .collect()
    }

    /// Total persisted alerts, for health reporting
    pub async fn alert_count(&self) -> Result<i64, StorageError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM alerts")
            .fetch_one(&self.pool)
            .await?)
    }

    /// Append an outcome record to the audit table
    pub async fn record_outcome(
        &self,
        region: &str,
        level: RiskLevel,
        confidence: f64,
        actual_outcome: &str,
        accuracy_score: f64,
        recorded_at_ms: i64,
    ) -> Result<i64, StorageError> {
        let result = sqlx::query(
            "INSERT INTO alert_history
                (recorded_at_ms, region, level, confidence, actual_outcome, accuracy_score)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(recorded_at_ms)
        .bind(region)
        .bind(level.as_str())
        .bind(confidence)
        .bind(actual_outcome)
        .bind(accuracy_score)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }
}

fn read_alert(row: &SqliteRow) -> Result<AlertRow, StorageError> {
    let level_str: String = row.try_get("level")?;
    let level = RiskLevel::parse(&level_str)
        .ok_or_else(|| StorageError::InvalidRow(format!("level '{level_str}'")))?;

    Ok(AlertRow {
        id: row.try_get("id")?,
        region: row.try_get("region")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        level,
        confidence: row.try_get("confidence")?,
        day_offset: row.try_get::<i64, _>("day_offset")? as u32,
        issued_at_ms: row.try_get("issued_at_ms")?,
        sent_email: row.try_get("sent_email")?,
        sent_webhook: row.try_get("sent_webhook")?,
        active: row.try_get("active")?,
    })
}
