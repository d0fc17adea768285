use async_trait::async_trait;

use crate::plugins::traits::{DeliveryError, Notifier, Recipient};

/// Logs notifications instead of sending them. Used for dry runs.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send(
        &self,
        recipient: &Recipient,
        subject: &str,
        body: &str,
    ) -> Result<(), DeliveryError> {
        tracing::info!(to = %recipient, subject, body, "NOTIFY (dry run)");
        Ok(())
    }
}
