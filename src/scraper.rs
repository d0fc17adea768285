use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::BrowserConfig;
use crate::utils::error::AppError;

/// Why an element could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("Element not found: {locator}")]
    NotFound { locator: String },

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Extraction failed: {0}")]
    Other(String),
}

/// Navigates to a page and reads one element's inner HTML.
///
/// Implementations hold a single browsing session. Callers must not issue
/// two `extract` calls against the same backend concurrently.
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    async fn extract(
        &self,
        url: &str,
        locator: &str,
        wait_budget: Duration,
    ) -> Result<String, ExtractError>;

    /// Releases the underlying session.
    async fn close(&self) -> crate::Result<()>;
}

/// One headless Chrome process with one tab, reused for every site.
pub struct ChromeBackend {
    // Dropping the browser kills the Chrome process.
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeBackend {
    pub fn launch(config: &BrowserConfig) -> crate::Result<Self> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .sandbox(config.sandbox)
            .window_size(Some((config.window_width, config.window_height)))
            .args(vec![
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-extensions"),
                OsStr::new("--disable-background-timer-throttling"),
                OsStr::new("--disable-renderer-backgrounding"),
            ])
            .build()
            .map_err(|e| AppError::Browser(format!("Failed to create launch options: {}", e)))?;

        if let Some(chrome_path) = &config.chrome_path {
            launch_options.path = Some(PathBuf::from(chrome_path));
        }

        let browser = Browser::new(launch_options)
            .map_err(|e| AppError::Browser(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| AppError::Browser(format!("Failed to create tab: {}", e)))?;

        if let Some(user_agent) = &config.user_agent {
            tab.set_user_agent(user_agent, None, None)
                .map_err(|e| AppError::Browser(format!("Failed to set user agent: {}", e)))?;
        }

        tracing::info!(headless = config.headless, "Browser session started");

        Ok(Self {
            _browser: browser,
            tab,
        })
    }
}

#[async_trait]
impl ExtractionBackend for ChromeBackend {
    async fn extract(
        &self,
        url: &str,
        locator: &str,
        wait_budget: Duration,
    ) -> Result<String, ExtractError> {
        let tab = Arc::clone(&self.tab);
        let url = url.to_string();
        let locator = locator.to_string();

        // DevTools calls block, keep them off the runtime threads.
        tokio::task::spawn_blocking(move || read_inner_html(&tab, &url, &locator, wait_budget))
            .await
            .map_err(|e| ExtractError::Other(format!("Extraction task failed: {}", e)))?
    }

    async fn close(&self) -> crate::Result<()> {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || tab.close(true))
            .await
            .map_err(|e| AppError::Internal(format!("Close task failed: {}", e)))?
            .map_err(|e| AppError::Browser(format!("Failed to close tab: {}", e)))?;

        tracing::info!("Browser session closed");
        Ok(())
    }
}

fn read_inner_html(
    tab: &Tab,
    url: &str,
    xpath: &str,
    wait_budget: Duration,
) -> Result<String, ExtractError> {
    tab.navigate_to(url)
        .map_err(|e| ExtractError::NavigationFailed(e.to_string()))?;
    tab.wait_until_navigated()
        .map_err(|e| ExtractError::NavigationFailed(e.to_string()))?;

    // A malformed XPath fails here too; both mean the locator needs fixing.
    let element = tab
        .wait_for_xpath_with_custom_timeout(xpath, wait_budget)
        .map_err(|_| ExtractError::NotFound {
            locator: xpath.to_string(),
        })?;

    let remote = element
        .call_js_fn("function() { return this.innerHTML; }", vec![], false)
        .map_err(|e| ExtractError::Other(format!("Failed to read innerHTML: {}", e)))?;

    Ok(inner_html_from(remote.value))
}

fn inner_html_from(value: Option<serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(html)) => html,
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
