// Shared fixtures for the integration tests: a scripted page backend and a
// notifier that records everything it is asked to send.

pub mod scheduler_tests;
pub mod site_loading_tests;

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sitewatch::models::WatchTarget;
use sitewatch::plugins::traits::{DeliveryError, Notifier, Recipient};
use sitewatch::scraper::{ExtractError, ExtractionBackend};
use sitewatch::watch::NOT_CONTAINS;

/// Serves queued responses per URL. Once a URL's queue is empty every
/// further request for it fails with `NotFound`, so scheduler runs end.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    pages: Arc<Mutex<HashMap<String, VecDeque<Result<String, ExtractError>>>>>,
    calls: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, url: &str, responses: Vec<Result<String, ExtractError>>) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), responses.into_iter().collect());
    }

    /// URLs requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionBackend for ScriptedBackend {
    async fn extract(
        &self,
        url: &str,
        locator: &str,
        _wait_budget: Duration,
    ) -> Result<String, ExtractError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.pages
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(ExtractError::NotFound {
                    locator: locator.to_string(),
                })
            })
    }

    async fn close(&self) -> sitewatch::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<SentEmail>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send to `address` fail.
    pub fn fail_for(&self, address: &str) {
        self.failing.lock().unwrap().insert(address.to_string());
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(
        &self,
        recipient: &Recipient,
        subject: &str,
        body: &str,
    ) -> Result<(), DeliveryError> {
        if self.failing.lock().unwrap().contains(&recipient.email_address) {
            return Err(DeliveryError::Transport("550 mailbox unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(SentEmail {
            to: recipient.email_address.clone(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

pub fn page(content: &str) -> Result<String, ExtractError> {
    Ok(content.to_string())
}

pub fn not_found() -> Result<String, ExtractError> {
    Err(ExtractError::NotFound {
        locator: "//div[@id='stock']".to_string(),
    })
}

pub fn offline() -> Result<String, ExtractError> {
    Err(ExtractError::NavigationFailed("net::ERR_INTERNET_DISCONNECTED".to_string()))
}

pub fn url_for(name: &str) -> String {
    format!("https://shop.example.com/{}", name)
}

/// An "Out of Stock" watch on `url_for(name)` with two recipients.
pub fn stock_target(name: &str) -> WatchTarget {
    WatchTarget {
        name: name.to_string(),
        url: url_for(name),
        locator: "//div[@id='stock']".to_string(),
        condition_kind: NOT_CONTAINS.to_string(),
        compare_value: "Out of Stock".to_string(),
        recipients: vec![
            Recipient::new("alice@example.com", Some("Alice".to_string())),
            Recipient::new("bob@example.com", None),
        ],
        notify_url: None,
        poll_interval: Duration::from_secs(60),
        element_wait: Duration::from_secs(10),
    }
}
