use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::ValidateEmail;

use crate::plugins::traits::Recipient;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub smtp: SmtpConfig,
    pub sender: SenderConfig,
    #[serde(default)]
    pub operator: Option<OperatorConfig>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub tls: TlsMode,
}

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    /// Plain connection upgraded with STARTTLS, usually port 587.
    #[default]
    Starttls,
    /// TLS from the first byte (SMTPS), usually port 465.
    Wrapper,
    /// No encryption. Only for local relays.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderConfig {
    pub email_address: String,
    pub display_name: String,
}

/// Receives the critical-error email when the process goes down.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorConfig {
    pub email_address: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl OperatorConfig {
    pub fn recipient(&self) -> Recipient {
        Recipient::new(self.email_address.clone(), self.display_name.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Pause between polling rounds. Falls back to the shortest site `reloadTime` when unset.
    #[serde(default)]
    pub round_delay_secs: Option<u64>,
    #[serde(default = "default_sites_dir")]
    pub sites_dir: PathBuf,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            round_delay_secs: None,
            sites_dir: default_sites_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default)]
    pub chrome_path: Option<String>,
    #[serde(default = "default_true")]
    pub headless: bool,
    #[serde(default)]
    pub sandbox: bool,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            sandbox: false,
            window_width: default_window_width(),
            window_height: default_window_height(),
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Daily-rolling log files are written here when set.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_prefix: default_file_prefix(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_sites_dir() -> PathBuf {
    PathBuf::from("sites")
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    1024
}

fn default_file_prefix() -> String {
    "sitewatch.log".to_string()
}

impl AppConfig {
    /// Loads `config/default` (or `path`), then `config/local`, then `SITEWATCH__*` variables.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let base = match path {
            Some(path) => File::from(path),
            None => File::with_name("config/default"),
        };

        let s = Config::builder()
            .add_source(base)
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables, e.g. SITEWATCH__SMTP__PASSWORD
            .add_source(Environment::with_prefix("SITEWATCH").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        if config.browser.chrome_path.is_none() {
            config.browser.chrome_path = std::env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.smtp.host.trim().is_empty() {
            return Err(ConfigError::Message("smtp.host must not be empty".into()));
        }

        if self.smtp.port == 0 {
            return Err(ConfigError::Message("SMTP port must be greater than 0".into()));
        }

        if self.smtp.username.is_empty() || self.smtp.password.is_empty() {
            return Err(ConfigError::Message(
                "smtp.username and smtp.password are required".into(),
            ));
        }

        if !self.sender.email_address.validate_email() {
            return Err(ConfigError::Message(format!(
                "sender.email_address '{}' is not a valid email address",
                self.sender.email_address
            )));
        }

        if self.sender.display_name.trim().is_empty() {
            return Err(ConfigError::Message("sender.display_name must not be empty".into()));
        }

        if let Some(operator) = &self.operator {
            if !operator.email_address.validate_email() {
                return Err(ConfigError::Message(format!(
                    "operator.email_address '{}' is not a valid email address",
                    operator.email_address
                )));
            }
        }

        if self.scheduler.sites_dir.as_os_str().is_empty() {
            return Err(ConfigError::Message("scheduler.sites_dir must not be empty".into()));
        }

        if self.browser.window_width == 0 || self.browser.window_height == 0 {
            return Err(ConfigError::Message("Browser window size must be greater than 0".into()));
        }

        Ok(())
    }
}
