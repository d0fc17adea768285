use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A single notification target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub email_address: String,
    pub display_name: String,
}

impl Recipient {
    /// Builds a recipient, falling back to the address when no display name is given.
    pub fn new(email_address: impl Into<String>, display_name: Option<String>) -> Self {
        let email_address = email_address.into();
        let display_name = display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| email_address.clone());
        Self {
            email_address,
            display_name,
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.display_name, self.email_address)
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid address '{address}': {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Message(String),

    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    /// The watched condition became true.
    Triggered,
    /// The watched condition went back to false.
    Normalized,
    /// Testing for the site has stopped.
    Failure { message: String },
    /// The whole process is going down.
    Critical { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub site_name: String,
    pub link: Option<String>,
    pub kind: NotificationKind,
    pub occurred_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn triggered(site_name: &str, link: &str) -> Self {
        Self::new(site_name, Some(link), NotificationKind::Triggered)
    }

    pub fn normalized(site_name: &str, link: &str) -> Self {
        Self::new(site_name, Some(link), NotificationKind::Normalized)
    }

    pub fn failure(site_name: &str, message: impl Into<String>) -> Self {
        Self::new(
            site_name,
            None,
            NotificationKind::Failure {
                message: message.into(),
            },
        )
    }

    pub fn critical(message: impl Into<String>) -> Self {
        Self::new(
            "Sitewatch",
            None,
            NotificationKind::Critical {
                message: message.into(),
            },
        )
    }

    fn new(site_name: &str, link: Option<&str>, kind: NotificationKind) -> Self {
        Self {
            site_name: site_name.to_string(),
            link: link.map(str::to_string),
            kind,
            occurred_at: Utc::now(),
        }
    }

    pub fn subject(&self) -> String {
        match &self.kind {
            NotificationKind::Triggered | NotificationKind::Normalized => {
                format!("Site Notification for \"{}\"", self.site_name)
            }
            NotificationKind::Failure { .. } => {
                format!("Error Notification for \"{}\"", self.site_name)
            }
            NotificationKind::Critical { .. } => "Sitewatch CRITICAL ERROR".to_string(),
        }
    }

    pub fn body(&self) -> String {
        let link = self.link.as_deref().unwrap_or_default();
        match &self.kind {
            NotificationKind::Triggered => {
                format!("{} was triggered! View the link: {}", self.site_name, link)
            }
            NotificationKind::Normalized => {
                format!("{} has returned to normal. View the link: {}", self.site_name, link)
            }
            NotificationKind::Failure { message } => {
                let mut text = String::new();
                text.push_str(&format!(
                    "This is an error notification for the site \"{}\". ",
                    self.site_name
                ));
                text.push_str(
                    "An error was encountered while testing, and testing for this site has been stopped.\n\n",
                );
                text.push_str(&format!("Error Message: {}\n", message));
                text.push_str(&format!("Occurred At: {}\n", self.occurred_at.to_rfc3339()));
                text
            }
            NotificationKind::Critical { message } => {
                let mut text = String::new();
                text.push_str("Sitewatch has encountered a critical error! Check the server ASAP!\n\n");
                text.push_str(&format!("Error Message: {}\n", message));
                text.push_str(&format!("Occurred At: {}\n", self.occurred_at.to_rfc3339()));
                text
            }
        }
    }
}

/// Delivers a rendered message to one recipient.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        recipient: &Recipient,
        subject: &str,
        body: &str,
    ) -> Result<(), DeliveryError>;
}
