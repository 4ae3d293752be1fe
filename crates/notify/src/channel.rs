//! Notification Channels

use crate::ChannelError;
use async_trait::async_trait;
use chrono::DateTime;
use risk_model::RiskLevel;
use serde::{Deserialize, Serialize};
use serde_json::json;
use storage::{AlertRow, ChannelKind};
use tracing::debug;
use uuid::Uuid;

/// Alert-shaped payload every channel accepts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertMessage {
    pub message_id: Uuid,
    pub alert_id: i64,
    pub region: String,
    pub latitude: f64,
    pub longitude: f64,
    pub level: RiskLevel,
    pub confidence: f64,
    pub day_offset: u32,
    pub issued_at_ms: i64,
}

impl AlertMessage {
    pub fn from_row(row: &AlertRow) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            alert_id: row.id,
            region: row.region.clone(),
            latitude: row.latitude,
            longitude: row.longitude,
            level: row.level,
            confidence: row.confidence,
            day_offset: row.day_offset,
            issued_at_ms: row.issued_at_ms,
        }
    }

    /// Issued-at timestamp as RFC 3339, for human-facing transports
    pub fn issued_at_rfc3339(&self) -> String {
        DateTime::from_timestamp_millis(self.issued_at_ms)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| self.issued_at_ms.to_string())
    }
}

/// A notification transport. Implementations are independent of each
/// other; the dispatcher records each outcome separately.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;
    async fn send(&self, message: &AlertMessage) -> Result<(), ChannelError>;
}

/// Slack-compatible webhook channel
pub struct WebhookChannel {
    url: String,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn payload(message: &AlertMessage) -> serde_json::Value {
        let color = match message.level {
            RiskLevel::Red => "danger",
            _ => "warning",
        };
        json!({
            "text": format!("Flood Alert: {}", message.level),
            "attachments": [{
                "color": color,
                "fields": [
                    { "title": "Region", "value": message.region, "short": true },
                    { "title": "Alert Level", "value": message.level.as_str(), "short": true },
                    { "title": "Confidence", "value": format!("{:.1}%", message.confidence * 100.0), "short": true },
                    { "title": "Day Ahead", "value": message.day_offset.to_string(), "short": true },
                    {
                        "title": "Coordinates",
                        "value": format!("{:.4}, {:.4}", message.latitude, message.longitude),
                        "short": false
                    },
                ],
                "footer": "Floodwatch",
                "ts": message.issued_at_ms / 1000,
            }]
        })
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }

    async fn send(&self, message: &AlertMessage) -> Result<(), ChannelError> {
        let response = self
            .client
            .post(&self.url)
            .json(&Self::payload(message))
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::Http(status.as_u16()));
        }
        debug!("Webhook alert sent for {}", message.region);
        Ok(())
    }
}

/// Email channel backed by an HTTP mail gateway. SMTP specifics live
/// behind the gateway; this side only posts the rendered message.
pub struct EmailGatewayChannel {
    endpoint: String,
    sender: String,
    recipients: Vec<String>,
    client: reqwest::Client,
}

impl EmailGatewayChannel {
    pub fn new(
        endpoint: impl Into<String>,
        sender: impl Into<String>,
        recipients: Vec<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            sender: sender.into(),
            recipients,
            client: reqwest::Client::new(),
        }
    }

    fn body(message: &AlertMessage) -> String {
        format!(
            "FLOOD ALERT NOTIFICATION\n\
             ========================\n\n\
             Alert Level: {}\n\
             Region: {}\n\
             Coordinates: {:.4}, {:.4}\n\
             Confidence: {:.1}%\n\
             Predicted for: Day {}\n\
             Timestamp: {}\n\n\
             IMMEDIATE ACTION REQUIRED\n\n\
             Please take necessary precautionary measures and alert local authorities.\n\n\
             This is an automated alert from the Floodwatch monitoring system.",
            message.level,
            message.region,
            message.latitude,
            message.longitude,
            message.confidence * 100.0,
            message.day_offset,
            message.issued_at_rfc3339(),
        )
    }
}

#[async_trait]
impl NotificationChannel for EmailGatewayChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn send(&self, message: &AlertMessage) -> Result<(), ChannelError> {
        if self.recipients.is_empty() {
            return Err(ChannelError::NotConfigured("no email recipients".to_string()));
        }

        let payload = json!({
            "from": self.sender,
            "to": self.recipients,
            "subject": format!("FLOOD ALERT: {} - {}", message.level, message.region),
            "body": Self::body(message),
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChannelError::Http(status.as_u16()));
        }
        debug!("Email alert sent for {}", message.region);
        Ok(())
    }
}
