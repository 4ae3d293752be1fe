//! Monitor Loop Implementation

use crate::source::DataSource;
use crate::MonitorError;
use alerting::{AlertCandidate, DedupPolicy};
use forecast::ForecastEngine;
use notify::Dispatcher;
use risk_model::Region;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storage::{AlertStore, StorageError};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between monitoring passes (default: 1800)
    pub check_interval_secs: u64,
    /// Forecast horizon per region (default: 3 days)
    pub lookahead_days: u32,
    /// Bounded worker pool size for per-region checking
    pub max_concurrent_regions: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 30 * 60,
            lookahead_days: 3,
            max_concurrent_regions: 4,
        }
    }
}

/// Loop phase, for observability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    Idle,
    Checking,
    Dispatching,
}

/// What one pass did. Reported even under partial failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassSummary {
    pub started_at_ms: i64,
    pub regions_checked: usize,
    pub regions_failed: usize,
    pub candidates: usize,
    pub alerts_issued: usize,
}

/// Outcome of checking one region
enum RegionOutcome {
    Candidates(Vec<AlertCandidate>),
    Failed { region: String, reason: String },
    /// Store failure on the dedup read path; fatal to the pass
    StoreFailure(StorageError),
}

/// Orchestrates Idle → Checking → Dispatching passes.
///
/// Checking fans regions out over a bounded worker pool; Dispatching
/// processes qualifying candidates sequentially, re-checking the
/// suppression window immediately before each persist so candidates from
/// the same pass cannot duplicate one another and the nearest day-offset
/// wins.
pub struct MonitorLoop {
    source: Arc<dyn DataSource>,
    engine: Arc<ForecastEngine>,
    policy: Arc<DedupPolicy>,
    store: Arc<AlertStore>,
    dispatcher: Arc<Dispatcher>,
    config: MonitorConfig,
    state: Mutex<LoopState>,
}

impl MonitorLoop {
    pub fn new(
        source: Arc<dyn DataSource>,
        engine: Arc<ForecastEngine>,
        policy: Arc<DedupPolicy>,
        store: Arc<AlertStore>,
        dispatcher: Arc<Dispatcher>,
        config: MonitorConfig,
    ) -> Self {
        info!(
            "Creating monitor loop: every {}s, {} days ahead",
            config.check_interval_secs, config.lookahead_days
        );
        Self {
            source,
            engine,
            policy,
            store,
            dispatcher,
            config,
            state: Mutex::new(LoopState::Idle),
        }
    }

    pub fn state(&self) -> LoopState {
        match self.state.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_state(&self, next: LoopState) {
        match self.state.lock() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Run passes on the configured interval until `shutdown` flips to
    /// true. A pass in flight always completes; only scheduling of the
    /// next one stops.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.check_interval_secs));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Monitor loop started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_pass().await {
                        error!("Monitoring pass failed: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.set_state(LoopState::Idle);
        info!("Monitor loop stopped");
    }

    /// One full Checking + Dispatching pass
    pub async fn run_pass(&self) -> Result<PassSummary, MonitorError> {
        let now_ms = current_ms();
        self.set_state(LoopState::Checking);

        let result = self.checking(now_ms).await;
        let (mut candidates, regions_checked, regions_failed) = match result {
            Ok(v) => v,
            Err(e) => {
                self.set_state(LoopState::Idle);
                return Err(e);
            }
        };

        self.set_state(LoopState::Dispatching);
        let dispatched = self.dispatching(&mut candidates, now_ms).await;
        self.set_state(LoopState::Idle);

        let alerts_issued = match dispatched {
            Ok(n) => n,
            Err(e) => return Err(e),
        };

        let summary = PassSummary {
            started_at_ms: now_ms,
            regions_checked,
            regions_failed,
            candidates: candidates.len(),
            alerts_issued,
        };
        info!(
            regions = summary.regions_checked,
            failed = summary.regions_failed,
            candidates = summary.candidates,
            issued = summary.alerts_issued,
            "pass complete"
        );
        Ok(summary)
    }

    /// Forecast every region under a bounded worker pool and collect the
    /// qualifying candidates.
    async fn checking(
        &self,
        now_ms: i64,
    ) -> Result<(Vec<AlertCandidate>, usize, usize), MonitorError> {
        let regions = self.source.regions().await?;
        let regions_checked = regions.len();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_regions));
        let mut workers = JoinSet::new();

        for region in regions {
            let source = self.source.clone();
            let engine = self.engine.clone();
            let policy = self.policy.clone();
            let store = self.store.clone();
            let semaphore = semaphore.clone();
            let lookahead = self.config.lookahead_days;

            workers.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return RegionOutcome::Failed {
                            region: region.name.clone(),
                            reason: "worker pool closed".to_string(),
                        }
                    }
                };
                check_region(&*source, &engine, &policy, &store, region, lookahead, now_ms).await
            });
        }

        let mut candidates = Vec::new();
        let mut regions_failed = 0;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(RegionOutcome::Candidates(mut found)) => candidates.append(&mut found),
                Ok(RegionOutcome::Failed { region, reason }) => {
                    warn!(region = %region, reason = %reason, "region check failed");
                    regions_failed += 1;
                }
                Ok(RegionOutcome::StoreFailure(e)) => return Err(e.into()),
                Err(join_err) => return Err(MonitorError::Join(join_err.to_string())),
            }
        }

        Ok((candidates, regions_checked, regions_failed))
    }

    /// Persist and dispatch qualifying candidates sequentially. Returns
    /// the number of alerts issued.
    async fn dispatching(
        &self,
        candidates: &mut [AlertCandidate],
        now_ms: i64,
    ) -> Result<usize, MonitorError> {
        // Nearest day-offset first within each (region, level) group
        candidates.sort_by(|a, b| {
            (&a.region.name, a.step.level(), a.step.day_offset())
                .cmp(&(&b.region.name, b.step.level(), b.step.day_offset()))
        });

        let mut issued = 0;
        for candidate in candidates.iter() {
            // Re-check right before persist: a row persisted earlier in
            // this same loop now suppresses its same-pass duplicates.
            if !self.policy.should_issue(candidate, &self.store, now_ms).await? {
                debug!(
                    region = %candidate.region.name,
                    level = %candidate.step.level(),
                    day = candidate.step.day_offset(),
                    "candidate suppressed at dispatch time"
                );
                continue;
            }

            let id = match self.store.persist(&candidate.to_new_alert()).await {
                Ok(id) => id,
                Err(e) => {
                    // Issuance aborted for this candidate only; a silent
                    // drop here would risk a future duplicate
                    error!(
                        region = %candidate.region.name,
                        level = %candidate.step.level(),
                        error = %e,
                        "persist failed, alert not issued"
                    );
                    continue;
                }
            };
            issued += 1;

            match self.store.get(id).await {
                Ok(Some(row)) => {
                    if let Err(e) = self.dispatcher.dispatch(&row).await {
                        warn!(alert_id = id, error = %e, "dispatch bookkeeping failed");
                    }
                }
                Ok(None) => warn!(alert_id = id, "persisted alert vanished before dispatch"),
                Err(e) => warn!(alert_id = id, error = %e, "could not load alert for dispatch"),
            }
        }

        Ok(issued)
    }
}

async fn check_region(
    source: &dyn DataSource,
    engine: &ForecastEngine,
    policy: &DedupPolicy,
    store: &AlertStore,
    region: Region,
    lookahead: u32,
    now_ms: i64,
) -> RegionOutcome {
    let window = match source.feature_window(&region).await {
        Ok(window) => window,
        Err(e) => {
            return RegionOutcome::Failed {
                region: region.name,
                reason: e.to_string(),
            }
        }
    };

    let steps = match engine.forecast(&region, &window, lookahead).await {
        Ok(steps) => steps,
        Err(e) => {
            return RegionOutcome::Failed {
                region: region.name,
                reason: e.to_string(),
            }
        }
    };

    let mut candidates = Vec::new();
    for step in steps {
        let candidate = AlertCandidate::new(region.clone(), step, now_ms);
        match policy.should_issue(&candidate, store, now_ms).await {
            Ok(true) => candidates.push(candidate),
            Ok(false) => {}
            Err(e) => return RegionOutcome::StoreFailure(e),
        }
    }
    RegionOutcome::Candidates(candidates)
}

fn current_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceError;
    use async_trait::async_trait;
    use forecast::{FeatureWindow, FlatExtrapolation, WINDOW_SIZE};
    use notify::{AlertMessage, ChannelError, NotificationChannel, NotifyConfig};
    use risk_model::{
        ClassDistribution, FeatureVector, PredictError, RiskLevel, RiskPredictor,
    };
    use std::sync::atomic::{AtomicU32, Ordering};
    use storage::{ChannelKind, NewAlert};

    const HOUR_MS: i64 = 60 * 60 * 1000;

    struct StubPredictor(ClassDistribution);

    #[async_trait]
    impl RiskPredictor for StubPredictor {
        async fn predict(
            &self,
            _window: &[FeatureVector],
        ) -> Result<ClassDistribution, PredictError> {
            Ok(self.0)
        }
    }

    /// Fixed flat windows; optionally fails for named regions
    struct FixedSource {
        regions: Vec<Region>,
        failing: Vec<String>,
    }

    #[async_trait]
    impl DataSource for FixedSource {
        async fn regions(&self) -> Result<Vec<Region>, SourceError> {
            Ok(self.regions.clone())
        }

        async fn feature_window(&self, region: &Region) -> Result<FeatureWindow, SourceError> {
            if self.failing.contains(&region.name) {
                return Err(SourceError::Unavailable("gauge offline".to_string()));
            }
            let history = vec![
                FeatureVector {
                    water_level_m: 3.0,
                    precipitation_mm: 80.0,
                    ..Default::default()
                };
                WINDOW_SIZE
            ];
            FeatureWindow::from_history(&history).map_err(|_| SourceError::ShortHistory {
                region: region.name.clone(),
                available: 0,
            })
        }
    }

    struct CountingChannel {
        kind: ChannelKind,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl NotificationChannel for CountingChannel {
        fn kind(&self) -> ChannelKind {
            self.kind
        }

        async fn send(&self, _message: &AlertMessage) -> Result<(), ChannelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Fixture {
        monitor: Arc<MonitorLoop>,
        store: Arc<AlertStore>,
        email_calls: Arc<AtomicU32>,
        webhook_calls: Arc<AtomicU32>,
    }

    async fn fixture(
        distribution: ClassDistribution,
        regions: Vec<Region>,
        failing: Vec<String>,
    ) -> Fixture {
        let store = Arc::new(AlertStore::in_memory().await.unwrap());
        let email_calls = Arc::new(AtomicU32::new(0));
        let webhook_calls = Arc::new(AtomicU32::new(0));

        let channels: Vec<Box<dyn NotificationChannel>> = vec![
            Box::new(CountingChannel {
                kind: ChannelKind::Email,
                calls: email_calls.clone(),
            }),
            Box::new(CountingChannel {
                kind: ChannelKind::Webhook,
                calls: webhook_calls.clone(),
            }),
        ];
        let dispatcher = Arc::new(Dispatcher::new(
            channels,
            store.clone(),
            NotifyConfig::default(),
        ));

        let monitor = Arc::new(MonitorLoop::new(
            Arc::new(FixedSource { regions, failing }),
            Arc::new(ForecastEngine::new(
                Arc::new(StubPredictor(distribution)),
                Box::new(FlatExtrapolation),
            )),
            Arc::new(DedupPolicy::new(Default::default())),
            store.clone(),
            dispatcher,
            MonitorConfig {
                check_interval_secs: 1,
                ..Default::default()
            },
        ));

        Fixture {
            monitor,
            store,
            email_calls,
            webhook_calls,
        }
    }

    fn r1() -> Region {
        Region::new("R1", 10.85, 76.27)
    }

    #[tokio::test]
    async fn test_confident_red_issues_single_alert_per_pass() {
        // Three forecast steps all Red@0.95; only the nearest day-offset
        // survives the suppression window.
        let f = fixture(
            ClassDistribution::new([0.02, 0.03, 0.95]),
            vec![r1()],
            vec![],
        )
        .await;

        let summary = f.monitor.run_pass().await.unwrap();
        assert_eq!(summary.regions_checked, 1);
        assert_eq!(summary.regions_failed, 0);
        assert_eq!(summary.candidates, 3);
        assert_eq!(summary.alerts_issued, 1);

        let rows = f.store.recent_alerts(0).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].level, RiskLevel::Red);
        assert_eq!(rows[0].day_offset, 1);
        assert!((rows[0].confidence - 0.95).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_yellow_alert_goes_to_webhook_only() {
        let f = fixture(
            ClassDistribution::new([0.55, 0.25, 0.20]),
            vec![r1()],
            vec![],
        )
        .await;

        let summary = f.monitor.run_pass().await.unwrap();
        assert_eq!(summary.alerts_issued, 1);
        assert_eq!(f.email_calls.load(Ordering::SeqCst), 0);
        assert_eq!(f.webhook_calls.load(Ordering::SeqCst), 1);

        let rows = f.store.recent_alerts(0).await.unwrap();
        assert!(rows[0].sent_webhook);
        assert!(!rows[0].sent_email);
    }

    #[tokio::test]
    async fn test_below_threshold_issues_nothing() {
        // Red needs 0.70; 0.65 stays quiet
        let f = fixture(
            ClassDistribution::new([0.15, 0.20, 0.65]),
            vec![r1()],
            vec![],
        )
        .await;

        let summary = f.monitor.run_pass().await.unwrap();
        assert_eq!(summary.candidates, 0);
        assert_eq!(summary.alerts_issued, 0);
    }

    #[tokio::test]
    async fn test_existing_active_alert_suppresses_pass() {
        let f = fixture(
            ClassDistribution::new([0.02, 0.03, 0.95]),
            vec![r1()],
            vec![],
        )
        .await;

        // Active Red alert for R1 from one hour ago
        f.store
            .persist(&NewAlert {
                region: "R1".to_string(),
                latitude: 10.85,
                longitude: 76.27,
                level: RiskLevel::Red,
                confidence: 0.9,
                day_offset: 1,
                issued_at_ms: current_ms() - HOUR_MS,
            })
            .await
            .unwrap();

        let summary = f.monitor.run_pass().await.unwrap();
        assert_eq!(summary.alerts_issued, 0);
        assert_eq!(f.store.alert_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_region_failure_does_not_abort_pass() {
        let f = fixture(
            ClassDistribution::new([0.02, 0.03, 0.95]),
            vec![r1(), Region::new("R2", 9.93, 76.26)],
            vec!["R2".to_string()],
        )
        .await;

        let summary = f.monitor.run_pass().await.unwrap();
        assert_eq!(summary.regions_checked, 2);
        assert_eq!(summary.regions_failed, 1);
        assert_eq!(summary.alerts_issued, 1);

        let rows = f.store.recent_alerts(0).await.unwrap();
        assert_eq!(rows[0].region, "R1");
    }

    #[tokio::test]
    async fn test_repeat_pass_within_window_is_idempotent() {
        let f = fixture(
            ClassDistribution::new([0.02, 0.03, 0.95]),
            vec![r1()],
            vec![],
        )
        .await;

        let first = f.monitor.run_pass().await.unwrap();
        let second = f.monitor.run_pass().await.unwrap();
        assert_eq!(first.alerts_issued, 1);
        assert_eq!(second.alerts_issued, 0);
        assert_eq!(f.store.alert_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_loop() {
        let f = fixture(
            ClassDistribution::new([0.6, 0.3, 0.1]),
            vec![r1()],
            vec![],
        )
        .await;

        let (tx, rx) = watch::channel(false);
        let monitor = f.monitor.clone();
        let handle = tokio::spawn(async move { monitor.run(rx).await });

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop did not stop after shutdown signal")
            .unwrap();
        assert_eq!(f.monitor.state(), LoopState::Idle);
    }
}
