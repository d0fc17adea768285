use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use validator::Validate;

use crate::plugins::traits::Recipient;
use crate::utils::error::{AppError, Result};

/// On-disk shape of one `sites/*.json` file.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SiteFile {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,

    #[validate(url(message = "url must be an absolute URL"))]
    pub url: String,

    #[serde(rename = "elementXPath")]
    #[validate(length(min = 1, message = "elementXPath must not be empty"))]
    pub element_xpath: String,

    #[validate(length(min = 1, message = "testType must not be empty"))]
    pub test_type: String,

    #[validate(length(min = 1, message = "compareValue must not be empty"))]
    pub compare_value: String,

    #[validate(nested)]
    pub send_to: Vec<SendTo>,

    /// Blank counts as unset.
    #[serde(rename = "sendURL", default, deserialize_with = "blank_as_none")]
    #[validate(url(message = "sendURL must be an absolute URL"))]
    pub send_url: Option<String>,

    /// Seconds between polls of this site.
    #[validate(range(min = 1, message = "reloadTime must be at least 1 second"))]
    pub reload_time: u64,

    /// Seconds to wait for the element to appear.
    #[validate(range(min = 1, message = "waitTime must be at least 1 second"))]
    pub wait_time: u64,
}

fn blank_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendTo {
    #[validate(email(message = "emailAddress must be a valid email address"))]
    pub email_address: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// A validated target, ready to become a watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    pub name: String,
    pub url: String,
    pub locator: String,
    pub condition_kind: String,
    pub compare_value: String,
    pub recipients: Vec<Recipient>,
    pub notify_url: Option<String>,
    pub poll_interval: Duration,
    pub element_wait: Duration,
}

impl From<SiteFile> for WatchTarget {
    fn from(site: SiteFile) -> Self {
        Self {
            recipients: site
                .send_to
                .into_iter()
                .map(|to| Recipient::new(to.email_address, to.display_name))
                .collect(),
            name: site.name,
            url: site.url,
            locator: site.element_xpath,
            condition_kind: site.test_type,
            compare_value: site.compare_value,
            notify_url: site.send_url,
            poll_interval: Duration::from_secs(site.reload_time),
            element_wait: Duration::from_secs(site.wait_time),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSite {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of scanning the sites directory.
#[derive(Debug, Default)]
pub struct LoadedSites {
    pub targets: Vec<WatchTarget>,
    pub skipped: Vec<SkippedSite>,
}

/// Parses and validates a single site file.
pub fn parse_site(path: &Path) -> Result<WatchTarget> {
    let file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let contents = std::fs::read_to_string(path)?;
    let site: SiteFile = serde_json::from_str(&contents).map_err(|e| AppError::Site {
        file: file.clone(),
        message: e.to_string(),
    })?;
    site.validate().map_err(|e| AppError::Site {
        file: file.clone(),
        message: e.to_string(),
    })?;

    if site.send_to.is_empty() {
        tracing::warn!(file = %file, "Site configuration has no sendTo values. No notification will be sent!");
    }

    Ok(site.into())
}

/// Loads every `*.json` file in `dir`, in file-name order.
///
/// A missing directory is an error. A bad site file is logged and skipped so
/// the remaining sites still load.
pub fn load_sites(dir: &Path) -> Result<LoadedSites> {
    if !dir.is_dir() {
        return Err(AppError::Validation(format!(
            "sites directory '{}' does not exist",
            dir.display()
        )));
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut loaded = LoadedSites::default();
    for path in paths {
        match parse_site(&path) {
            Ok(target) => {
                tracing::debug!(site = %target.name, path = %path.display(), "Loaded site");
                loaded.targets.push(target);
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Skipping site configuration");
                loaded.skipped.push(SkippedSite {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(loaded)
}
