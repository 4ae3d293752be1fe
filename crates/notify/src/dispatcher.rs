//! Alert Dispatcher

use crate::channel::{AlertMessage, NotificationChannel};
use crate::plan::ResponsePlan;
use crate::ChannelError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use storage::{AlertRow, AlertStore, ChannelKind, StorageError};
use tracing::{info, warn};

/// Dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Per-channel send timeout (milliseconds)
    pub send_timeout_ms: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: 5_000,
        }
    }
}

/// One channel's delivery attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelOutcome {
    pub channel: ChannelKind,
    pub success: bool,
    pub error: Option<String>,
}

/// Result of dispatching one alert
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub alert_id: i64,
    pub outcomes: Vec<ChannelOutcome>,
    pub plan: ResponsePlan,
}

impl DispatchReport {
    pub fn all_delivered(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }
}

/// Fans one alert out across the configured channels.
///
/// Channel selection is by severity: Red and Orange use every channel,
/// Yellow only the lowest-cost one (webhook). Sends are independent and
/// timeout-bounded; each outcome is recorded in the store. No retries
/// here — re-invoking `dispatch` for the same alert is safe and only
/// attempts the still-undelivered channels.
pub struct Dispatcher {
    channels: Vec<Box<dyn NotificationChannel>>,
    store: Arc<AlertStore>,
    config: NotifyConfig,
}

impl Dispatcher {
    pub fn new(
        channels: Vec<Box<dyn NotificationChannel>>,
        store: Arc<AlertStore>,
        config: NotifyConfig,
    ) -> Self {
        info!("Creating dispatcher with {} channels", channels.len());
        Self {
            channels,
            store,
            config,
        }
    }

    fn selected_channels(&self, alert: &AlertRow) -> Vec<&dyn NotificationChannel> {
        self.channels
            .iter()
            .map(|c| c.as_ref())
            .filter(|c| alert.level.is_high_severity() || c.kind() == ChannelKind::Webhook)
            .collect()
    }

    /// Deliver one alert. Fails only on a storage error while recording
    /// an outcome; channel failures are captured in the report.
    pub async fn dispatch(&self, alert: &AlertRow) -> Result<DispatchReport, StorageError> {
        let message = AlertMessage::from_row(alert);
        let timeout = Duration::from_millis(self.config.send_timeout_ms);
        let mut outcomes = Vec::new();

        for channel in self.selected_channels(alert) {
            let kind = channel.kind();
            if alert.delivered(kind) {
                // Already delivered on an earlier dispatch of this alert
                continue;
            }

            let result = match tokio::time::timeout(timeout, channel.send(&message)).await {
                Ok(inner) => inner,
                Err(_) => Err(ChannelError::Timeout(self.config.send_timeout_ms)),
            };

            let (success, error) = match result {
                Ok(()) => (true, None),
                Err(e) => {
                    warn!(
                        alert_id = alert.id,
                        channel = %kind,
                        error = %e,
                        "channel send failed"
                    );
                    (false, Some(e.to_string()))
                }
            };

            self.store.mark_delivered(alert.id, kind, success).await?;
            outcomes.push(ChannelOutcome {
                channel: kind,
                success,
                error,
            });
        }

        Ok(DispatchReport {
            alert_id: alert.id,
            outcomes,
            plan: ResponsePlan::for_level(alert.level),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use risk_model::RiskLevel;
    use std::sync::atomic::{AtomicU32, Ordering};
    use storage::NewAlert;

    /// Deterministic channel for tests
    struct FakeChannel {
        kind: ChannelKind,
        fail: bool,
        calls: Arc<AtomicU32>,
    }

    impl FakeChannel {
        fn boxed(kind: ChannelKind, fail: bool, calls: Arc<AtomicU32>) -> Box<dyn NotificationChannel> {
            Box::new(Self { kind, fail, calls })
        }
    }

    #[async_trait]
    impl NotificationChannel for FakeChannel {
        fn kind(&self) -> ChannelKind {
            self.kind
        }

        async fn send(&self, _message: &AlertMessage) -> Result<(), ChannelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ChannelError::Transport("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    async fn persisted_alert(store: &AlertStore, level: RiskLevel) -> AlertRow {
        let id = store
            .persist(&NewAlert {
                region: "R1".to_string(),
                latitude: 10.85,
                longitude: 76.27,
                level,
                confidence: 0.95,
                day_offset: 1,
                issued_at_ms: 1_000,
            })
            .await
            .unwrap();
        store.get(id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_partial_failure_records_both_outcomes() {
        let store = Arc::new(AlertStore::in_memory().await.unwrap());
        let email_calls = Arc::new(AtomicU32::new(0));
        let webhook_calls = Arc::new(AtomicU32::new(0));
        let dispatcher = Dispatcher::new(
            vec![
                FakeChannel::boxed(ChannelKind::Email, true, email_calls.clone()),
                FakeChannel::boxed(ChannelKind::Webhook, false, webhook_calls.clone()),
            ],
            store.clone(),
            NotifyConfig::default(),
        );

        let alert = persisted_alert(&store, RiskLevel::Red).await;
        let report = dispatcher.dispatch(&alert).await.unwrap();

        assert_eq!(report.outcomes.len(), 2);
        assert!(!report.all_delivered());

        let row = store.get(alert.id).await.unwrap().unwrap();
        assert!(!row.sent_email);
        assert!(row.sent_webhook);
        assert!(row.active, "partial delivery must not deactivate the alert");
    }

    #[tokio::test]
    async fn test_yellow_uses_only_webhook() {
        let store = Arc::new(AlertStore::in_memory().await.unwrap());
        let email_calls = Arc::new(AtomicU32::new(0));
        let webhook_calls = Arc::new(AtomicU32::new(0));
        let dispatcher = Dispatcher::new(
            vec![
                FakeChannel::boxed(ChannelKind::Email, false, email_calls.clone()),
                FakeChannel::boxed(ChannelKind::Webhook, false, webhook_calls.clone()),
            ],
            store.clone(),
            NotifyConfig::default(),
        );

        let alert = persisted_alert(&store, RiskLevel::Yellow).await;
        let report = dispatcher.dispatch(&alert).await.unwrap();

        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].channel, ChannelKind::Webhook);
        assert_eq!(email_calls.load(Ordering::SeqCst), 0);
        assert_eq!(webhook_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_redispatch_skips_delivered_channels() {
        let store = Arc::new(AlertStore::in_memory().await.unwrap());
        let email_calls = Arc::new(AtomicU32::new(0));
        let webhook_calls = Arc::new(AtomicU32::new(0));
        let dispatcher = Dispatcher::new(
            vec![
                FakeChannel::boxed(ChannelKind::Email, true, email_calls.clone()),
                FakeChannel::boxed(ChannelKind::Webhook, false, webhook_calls.clone()),
            ],
            store.clone(),
            NotifyConfig::default(),
        );

        let alert = persisted_alert(&store, RiskLevel::Orange).await;
        dispatcher.dispatch(&alert).await.unwrap();

        // Caller-driven retry: refresh the row and dispatch again
        let refreshed = store.get(alert.id).await.unwrap().unwrap();
        let report = dispatcher.dispatch(&refreshed).await.unwrap();

        // Only the failed email channel is retried
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].channel, ChannelKind::Email);
        assert_eq!(webhook_calls.load(Ordering::SeqCst), 1);
        assert_eq!(email_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_report_carries_response_plan() {
        let store = Arc::new(AlertStore::in_memory().await.unwrap());
        let dispatcher = Dispatcher::new(
            vec![FakeChannel::boxed(
                ChannelKind::Webhook,
                false,
                Arc::new(AtomicU32::new(0)),
            )],
            store.clone(),
            NotifyConfig::default(),
        );

        let alert = persisted_alert(&store, RiskLevel::Red).await;
        let report = dispatcher.dispatch(&alert).await.unwrap();
        assert_eq!(report.plan.level, RiskLevel::Red);
        assert!(!report.plan.recommendations.is_empty());
    }
}
