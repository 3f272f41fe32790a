use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::error::AppError;

/// Outbound mail. Delivery failures are reported but never undo the operation that
/// triggered the mail.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError>;
}

/// Delivers plain-text mail through an SMTP relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Builds the pooled transport; no connection is made until the first send.
    pub fn new(config: &SmtpConfig) -> Result<Self, AppError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid SMTP_FROM: {}", e)))?;

        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| AppError::Config(format!("Invalid SMTP_HOST: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        let mut builder = builder.port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(SmtpMailer {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError> {
        let recipient: Mailbox = to
            .parse()
            .map_err(|e| AppError::ExternalService(format!("Invalid recipient {}: {}", to, e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AppError::ExternalService(format!("Failed to build mail: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::ExternalService(format!("SMTP delivery failed: {}", e)))?;

        tracing::info!(to, subject, "📧 mail delivered");
        Ok(())
    }
}

/// Writes mail to the log instead of delivering it, for local runs without a relay.
/// Bodies carry one-time links, so they only appear at trace level.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError> {
        tracing::info!(to, subject, "📧 outgoing mail (not delivered, no SMTP relay configured)");
        tracing::trace!(to, body, "mail body");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relay(from: &str) -> SmtpConfig {
        SmtpConfig {
            host: "localhost".to_string(),
            port: 2525,
            username: String::new(),
            password: String::new(),
            from: from.to_string(),
            starttls: false,
        }
    }

    #[tokio::test]
    async fn test_smtp_mailer_rejects_bad_sender() {
        assert!(matches!(
            SmtpMailer::new(&relay("not an address")),
            Err(AppError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_smtp_mailer_rejects_bad_recipient_before_connecting() {
        let mailer = SmtpMailer::new(&relay("Campus Portal <noreply@uni.edu.tr>")).unwrap();
        let err = mailer.send("nobody", "Verify", "body").await.unwrap_err();
        assert_eq!(err.code(), "SRV_003");
    }
}
