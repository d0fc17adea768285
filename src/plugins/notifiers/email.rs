use crate::config::{SenderConfig, SmtpConfig, TlsMode};
use crate::plugins::traits::{DeliveryError, Notifier, Recipient};
use async_trait::async_trait;
use lettre::message::{header, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::AsyncSmtpTransportBuilder;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailNotifier {
    /// Builds the SMTP transport. No connection is made until the first send.
    pub fn new(smtp: &SmtpConfig, sender: &SenderConfig) -> Result<Self, DeliveryError> {
        let from = mailbox(&sender.email_address, &sender.display_name)?;
        let credentials = Credentials::new(smtp.username.clone(), smtp.password.clone());

        let mailer = transport_builder(smtp)?
            .port(smtp.port)
            .credentials(credentials)
            .build();

        Ok(Self { mailer, from })
    }

    fn build_message(
        &self,
        recipient: &Recipient,
        subject: &str,
        body: &str,
    ) -> Result<Message, DeliveryError> {
        let to = mailbox(&recipient.email_address, &recipient.display_name)?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| DeliveryError::Message(e.to_string()))
    }

    /// Connects and authenticates without sending anything.
    pub async fn test_connection(&self) -> Result<bool, DeliveryError> {
        self.mailer
            .test_connection()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))
    }
}

fn transport_builder(smtp: &SmtpConfig) -> Result<AsyncSmtpTransportBuilder, DeliveryError> {
    let builder = match smtp.tls {
        TlsMode::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host),
        TlsMode::Wrapper => AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host),
        TlsMode::None => return Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host)),
    };
    builder.map_err(|e| DeliveryError::Transport(e.to_string()))
}

fn mailbox(address: &str, display_name: &str) -> Result<Mailbox, DeliveryError> {
    let parsed: Address = address.parse().map_err(|e: lettre::address::AddressError| {
        DeliveryError::Address {
            address: address.to_string(),
            reason: e.to_string(),
        }
    })?;
    Ok(Mailbox::new(Some(display_name.to_string()), parsed))
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(
        &self,
        recipient: &Recipient,
        subject: &str,
        body: &str,
    ) -> Result<(), DeliveryError> {
        let email = self.build_message(recipient, subject, body)?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        tracing::debug!(recipient = %recipient.email_address, subject, "Email sent");
        Ok(())
    }
}
