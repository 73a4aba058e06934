use std::sync::Arc;

use chrono::{DateTime, Utc};
use handlewatch_probe::Classifier;
use handlewatch_schema::{Observation, StatusKind, StatusRecord, SubscriberId, Target};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{
    invert_watchlists, rate_limit_backoff_ms, MonitorConfig, Notifier, StatusBook, Transition,
    WatchRegistry,
};

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    /// Distinct targets in the registry snapshot.
    pub targets: usize,
    pub classified: usize,
    pub confirmed: usize,
    pub delivered: usize,
    pub delivery_failures: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Runs monitoring cycles over the shared registry and status book.
pub struct Monitor {
    registry: Arc<dyn WatchRegistry>,
    classifier: Arc<dyn Classifier>,
    book: Arc<StatusBook>,
    notifier: Arc<dyn Notifier>,
    config: MonitorConfig,
    cycle_lock: Mutex<()>,
    last_report: RwLock<Option<CycleReport>>,
}

impl Monitor {
    pub fn new(
        registry: Arc<dyn WatchRegistry>,
        classifier: Arc<dyn Classifier>,
        book: Arc<StatusBook>,
        notifier: Arc<dyn Notifier>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            registry,
            classifier,
            book,
            notifier,
            config,
            cycle_lock: Mutex::new(()),
            last_report: RwLock::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<dyn WatchRegistry> {
        &self.registry
    }

    pub fn book(&self) -> &Arc<StatusBook> {
        &self.book
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub async fn last_report(&self) -> Option<CycleReport> {
        self.last_report.read().await.clone()
    }

    /// One-off classification. Debounce state is left untouched.
    pub async fn check(&self, target: &Target) -> Observation {
        self.classifier.classify(target).await
    }

    pub async fn status(&self, target: &Target) -> Option<StatusRecord> {
        self.book.get(target).await
    }

    /// Fires the first cycle after the configured delay, then one per
    /// interval. A late tick delays the schedule instead of bursting.
    pub async fn run(&self) {
        info!(
            first_run_in_secs = self.config.first_run_delay_secs,
            interval_minutes = self.config.interval_minutes,
            "monitor started"
        );
        tokio::time::sleep(self.config.first_run_delay()).await;

        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.run_cycle().await;
        }
    }

    pub async fn run_cycle(&self) -> CycleReport {
        let _running = self.cycle_lock.lock().await;
        let cycle_id = Uuid::new_v4();
        let report = self
            .cycle(cycle_id)
            .instrument(info_span!("cycle", %cycle_id))
            .await;
        *self.last_report.write().await = Some(report.clone());
        report
    }

    async fn cycle(&self, cycle_id: Uuid) -> CycleReport {
        let started_at = Utc::now();
        let watchlists = self.registry.get_all().await;
        let work = invert_watchlists(&watchlists);

        let mut report = CycleReport {
            cycle_id,
            targets: work.len(),
            classified: 0,
            confirmed: 0,
            delivered: 0,
            delivery_failures: 0,
            started_at,
            finished_at: started_at,
        };
        info!(targets = report.targets, "cycle started");

        let mut pause = Duration::ZERO;
        let mut consecutive_limits = 0u32;
        for (index, (target, subscribers)) in work.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(pause).await;
            }

            let observation = self.classifier.classify(target).await;
            report.classified += 1;
            debug!(target = %target, status = ?observation.kind, "classified");

            pause = self.config.pacing();
            if observation.kind == StatusKind::RateLimited {
                consecutive_limits += 1;
                if self.config.rate_limit_backoff {
                    let extra = rate_limit_backoff_ms(consecutive_limits);
                    warn!(target = %target, backoff_ms = extra, "rate limited, backing off");
                    pause += Duration::from_millis(extra);
                }
            } else {
                consecutive_limits = 0;
            }

            let transition = self.book.observe(target, observation.kind).await;
            if let Transition::Confirmed { previous, .. } = transition {
                report.confirmed += 1;
                info!(
                    target = %target,
                    from = ?previous,
                    to = ?observation.kind,
                    subscribers = subscribers.len(),
                    "status change confirmed"
                );
                let text = format_alert(target, previous, &observation);
                let (delivered, failed) = self.deliver(subscribers, &text).await;
                report.delivered += delivered;
                report.delivery_failures += failed;
            }
        }

        self.book.prune_locks().await;
        report.finished_at = Utc::now();
        info!(
            classified = report.classified,
            confirmed = report.confirmed,
            delivered = report.delivered,
            delivery_failures = report.delivery_failures,
            "cycle finished"
        );
        report
    }

    async fn deliver(&self, subscribers: &[SubscriberId], text: &str) -> (usize, usize) {
        let mut delivered = 0;
        let mut failed = 0;
        for subscriber in subscribers {
            let send = self.notifier.send(subscriber, text);
            match tokio::time::timeout(self.config.delivery_timeout(), send).await {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(err)) => {
                    failed += 1;
                    warn!(subscriber = %subscriber, "alert delivery failed: {err:#}");
                }
                Err(_) => {
                    failed += 1;
                    warn!(subscriber = %subscriber, "alert delivery timed out");
                }
            }
        }
        (delivered, failed)
    }
}

pub fn format_alert(target: &Target, previous: StatusKind, observation: &Observation) -> String {
    let mut text = format!(
        "⚠ ALERT: {target} → {} (was {})",
        observation.kind.label(),
        previous.label()
    );
    if let Some(detail) = &observation.detail {
        text.push('\n');
        text.push_str(detail);
    }
    text
}
