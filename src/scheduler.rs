use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::SchedulerConfig;
use crate::models::WatchTarget;
use crate::plugins::traits::{NotificationEvent, Notifier, Recipient};
use crate::scraper::ExtractionBackend;
use crate::watch::{deliver, PollOutcome, Watch};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub rounds: u64,
    pub polls: u64,
    pub triggered: u64,
    pub normalized: u64,
    pub deferred: u64,
    pub retired: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SchedulerStats {
    fn new() -> Self {
        Self {
            rounds: 0,
            polls: 0,
            triggered: 0,
            normalized: 0,
            deferred: 0,
            retired: 0,
            notifications_sent: 0,
            notifications_failed: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn record(&mut self, outcome: PollOutcome) {
        self.polls += 1;
        match outcome {
            PollOutcome::Triggered => self.triggered += 1,
            PollOutcome::Normalized => self.normalized += 1,
            PollOutcome::Deferred => self.deferred += 1,
            PollOutcome::Inactive
            | PollOutcome::StillTriggered
            | PollOutcome::StillNormal
            | PollOutcome::Disabled => {}
        }
    }
}

/// Polls every active watch once per round until none are left.
///
/// The scheduler owns the extraction session for its whole life and closes
/// it when [`SiteScheduler::run`] returns.
pub struct SiteScheduler {
    backend: Box<dyn ExtractionBackend>,
    notifier: Arc<dyn Notifier>,
    active: Vec<Watch>,
    round_delay: Option<Duration>,
}

impl SiteScheduler {
    pub fn new(
        backend: Box<dyn ExtractionBackend>,
        notifier: Arc<dyn Notifier>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            backend,
            notifier,
            active: Vec::new(),
            round_delay: config.round_delay_secs.map(Duration::from_secs),
        }
    }

    /// Adds a site to the active set. Returns `false` if it was rejected.
    pub async fn add_target(&mut self, target: WatchTarget) -> bool {
        if self.active.iter().any(|watch| watch.name() == target.name) {
            tracing::warn!(site = %target.name, "Duplicate site name, keeping the first one");
            return false;
        }

        match Watch::build(target, self.notifier.as_ref()).await {
            Some(watch) => {
                tracing::info!(site = %watch.name(), url = %watch.url(), "Watching site");
                self.active.push(watch);
                true
            }
            None => false,
        }
    }

    pub fn active_names(&self) -> Vec<&str> {
        self.active.iter().map(Watch::name).collect()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Configured delay, else the shortest site poll interval, else zero.
    pub fn round_delay(&self) -> Duration {
        self.round_delay
            .or_else(|| self.active.iter().map(Watch::poll_interval).min())
            .unwrap_or(Duration::ZERO)
    }

    /// Polls each active watch once, then drops the disabled ones.
    /// Returns how many watches were retired.
    pub async fn run_round(&mut self, stats: &mut SchedulerStats) -> usize {
        stats.rounds += 1;
        tracing::debug!(round = stats.rounds, watches = self.active.len(), "Starting round");

        for watch in self.active.iter_mut() {
            let outcome = watch.poll(self.backend.as_ref(), self.notifier.as_ref()).await;
            stats.record(outcome);
        }

        let before = self.active.len();
        let mut kept = Vec::with_capacity(before);
        for watch in self.active.drain(..) {
            if watch.is_disabled() {
                tracing::info!(site = %watch.name(), "Site disabled, removing from schedule");
                stats.notifications_sent += watch.delivered();
                stats.notifications_failed += watch.failed_deliveries();
            } else {
                kept.push(watch);
            }
        }
        self.active = kept;

        let retired = before - self.active.len();
        stats.retired += retired;
        retired
    }

    /// Runs rounds until every watch has disabled itself, then closes the session.
    pub async fn run(mut self) -> crate::Result<SchedulerStats> {
        let delay = self.round_delay();
        if delay.is_zero() {
            tracing::warn!("Round delay is zero, sites will be polled back to back");
        }
        tracing::info!(
            watches = self.active.len(),
            delay_secs = delay.as_secs(),
            "Scheduler started"
        );

        let mut stats = SchedulerStats::new();
        while !self.active.is_empty() {
            self.run_round(&mut stats).await;

            if !self.active.is_empty() && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        tracing::info!(rounds = stats.rounds, "No active sites left, shutting down");
        self.backend.close().await?;

        stats.finished_at = Some(Utc::now());
        Ok(stats)
    }
}

/// Makes one attempt to tell the operator that the process is going down.
pub async fn report_critical(
    notifier: &dyn Notifier,
    operator: Option<&Recipient>,
    error: &dyn std::fmt::Display,
) -> bool {
    let Some(operator) = operator else {
        tracing::warn!("No operator configured, critical error was not emailed");
        return false;
    };

    let event = NotificationEvent::critical(format!("{}", error));
    let report = deliver(notifier, std::slice::from_ref(operator), &event).await;
    report.delivered == 1
}
