//! SMTP alert delivery
//!
//! Thin wrapper over lettre's async transport. Connection setup follows
//! the configured security flag; authentication uses the configured
//! account, which is also the From address.

use lettre::{
    message::Mailbox,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use super::ReportingError;
use crate::config::EmailConfig;

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self, ReportingError> {
        let builder = if config.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        let from = config.username.parse()?;
        Ok(Self { transport, from })
    }

    /// Send one plain-text message to all recipients.
    pub async fn send(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<(), ReportingError> {
        let mut builder = Message::builder().from(self.from.clone()).subject(subject);
        for recipient in recipients {
            builder = builder.to(recipient.parse()?);
        }
        let message = builder.body(body.to_string())?;
        self.transport.send(message).await?;
        Ok(())
    }
}
