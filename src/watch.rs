//! One configured site and its condition state machine.
//!
//! A [`Watch`] remembers whether its condition held on the previous poll and
//! only notifies when that changes. Extraction failures either stop the watch
//! for good or, for navigation problems, leave it running untouched.

use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::models::WatchTarget;
use crate::plugins::traits::{NotificationEvent, Notifier, Recipient};
use crate::scraper::{ExtractError, ExtractionBackend};

/// `testType` for [`Condition::NotContains`].
pub const NOT_CONTAINS: &str = "element_does_not_contain_text";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Met when the element's content does not contain the value.
    NotContains(String),
}

impl Condition {
    pub fn from_kind(kind: &str, compare_value: &str) -> Result<Self, WatchError> {
        match kind {
            NOT_CONTAINS => Ok(Condition::NotContains(compare_value.to_string())),
            other => Err(WatchError::UnsupportedCondition {
                kind: other.to_string(),
            }),
        }
    }

    pub fn is_met(&self, content: &str) -> bool {
        match self {
            Condition::NotContains(value) => !content.contains(value.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchError {
    #[error("unsupported test type '{kind}'")]
    UnsupportedCondition { kind: String },
}

/// What a single [`Watch::poll`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The watch was already disabled; nothing happened.
    Inactive,
    /// Condition became true; recipients were notified.
    Triggered,
    /// Condition is still true.
    StillTriggered,
    /// Condition became false again; recipients were notified.
    Normalized,
    /// Condition is still false.
    StillNormal,
    /// The page could not be loaded. State is unchanged.
    Deferred,
    /// The watch hit a fatal error, notified recipients and stopped.
    Disabled,
}

#[derive(Debug)]
pub struct Watch {
    name: String,
    url: String,
    locator: String,
    condition: Condition,
    recipients: Vec<Recipient>,
    notify_url: String,
    poll_interval: Duration,
    element_wait: Duration,
    condition_met: bool,
    disabled: bool,
    delivered: usize,
    failed_deliveries: usize,
}

impl Watch {
    pub fn new(target: WatchTarget) -> Result<Self, WatchError> {
        let condition = Condition::from_kind(&target.condition_kind, &target.compare_value)?;
        let notify_url = target.notify_url.unwrap_or_else(|| target.url.clone());

        Ok(Self {
            name: target.name,
            url: target.url,
            locator: target.locator,
            condition,
            recipients: target.recipients,
            notify_url,
            poll_interval: target.poll_interval,
            element_wait: target.element_wait,
            condition_met: false,
            disabled: false,
            delivered: 0,
            failed_deliveries: 0,
        })
    }

    /// Builds a watch, or tells the target's recipients why it will not run.
    pub async fn build(target: WatchTarget, notifier: &dyn Notifier) -> Option<Self> {
        let name = target.name.clone();
        let recipients = target.recipients.clone();

        match Self::new(target) {
            Ok(watch) => Some(watch),
            Err(e) => {
                let message = format!(
                    "Site '{}' could not be started: {}. Check the documentation for a list of valid test types.",
                    name, e
                );
                error!(site = %name, error = %e, "Site will not be tested");
                let event = NotificationEvent::failure(&name, message);
                deliver(notifier, &recipients, &event).await;
                None
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn notify_url(&self) -> &str {
        &self.notify_url
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn condition_met(&self) -> bool {
        self.condition_met
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Notifications accepted by the notifier so far.
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    pub fn failed_deliveries(&self) -> usize {
        self.failed_deliveries
    }

    /// Runs one test of the site.
    pub async fn poll(
        &mut self,
        backend: &dyn ExtractionBackend,
        notifier: &dyn Notifier,
    ) -> PollOutcome {
        if self.disabled {
            return PollOutcome::Inactive;
        }

        let content = match backend
            .extract(&self.url, &self.locator, self.element_wait)
            .await
        {
            Ok(content) => content,
            Err(ExtractError::NavigationFailed(detail)) => {
                warn!(
                    site = %self.name,
                    error = %detail,
                    "Failed to get the page, check network settings. Testing will continue"
                );
                return PollOutcome::Deferred;
            }
            Err(ExtractError::NotFound { .. }) => {
                let message = format!(
                    "Test failed for '{}'. The element could not be found on the page. \
                     This could be because the time the page takes to load exceeds the page wait time, \
                     or that your XPath is invalid. Check your configuration.",
                    self.name
                );
                self.fail(notifier, message).await;
                return PollOutcome::Disabled;
            }
            Err(ExtractError::Other(detail)) => {
                let message = format!(
                    "Test failed for '{}'. An unexpected error occurred. Error output message: {}",
                    self.name, detail
                );
                self.fail(notifier, message).await;
                return PollOutcome::Disabled;
            }
        };

        let met = self.condition.is_met(&content);
        match (met, self.condition_met) {
            (true, false) => {
                let event = NotificationEvent::triggered(&self.name, &self.notify_url);
                self.notify(notifier, &event).await;
                self.condition_met = true;
                info!(site = %self.name, "Site triggered! Emails have been sent");
                PollOutcome::Triggered
            }
            (true, true) => {
                info!(site = %self.name, "Site triggered again. Testing will continue");
                PollOutcome::StillTriggered
            }
            (false, true) => {
                let event = NotificationEvent::normalized(&self.name, &self.notify_url);
                self.notify(notifier, &event).await;
                self.condition_met = false;
                info!(
                    site = %self.name,
                    "Site has returned to normal. Normality emails have been sent"
                );
                PollOutcome::Normalized
            }
            (false, false) => {
                debug!(site = %self.name, "Site tested negative and will continue running");
                PollOutcome::StillNormal
            }
        }
    }

    async fn fail(&mut self, notifier: &dyn Notifier, message: String) {
        error!(site = %self.name, "{}", message);
        let event = NotificationEvent::failure(&self.name, message);
        self.notify(notifier, &event).await;
        self.disabled = true;
    }

    async fn notify(&mut self, notifier: &dyn Notifier, event: &NotificationEvent) {
        let report = deliver(notifier, &self.recipients, event).await;
        self.delivered += report.delivered;
        self.failed_deliveries += report.failed;
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Sends `event` to every recipient in order. A failed send is logged and
/// does not stop the remaining recipients.
pub async fn deliver(
    notifier: &dyn Notifier,
    recipients: &[Recipient],
    event: &NotificationEvent,
) -> DeliveryReport {
    let subject = event.subject();
    let body = event.body();
    let mut report = DeliveryReport::default();

    for recipient in recipients {
        match notifier.send(recipient, &subject, &body).await {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                warn!(
                    site = %event.site_name,
                    recipient = %recipient.email_address,
                    error = %e,
                    "Failed to deliver notification"
                );
                report.failed += 1;
            }
        }
    }

    report
}
