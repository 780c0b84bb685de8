//! Outgoing mail for reminders

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use crate::config::MailConfig;

/// A plain-text message to one recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, mail: Mail) -> Result<()>;

    /// Short name shown by health and job output
    fn kind(&self) -> &'static str;
}

/// Delivers mail over SMTP
pub struct SmtpNotifier {
    config: MailConfig,
}

impl SmtpNotifier {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(self.config.smtp_port);
        if !self.config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ));
        }
        Ok(builder.build())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, mail: Mail) -> Result<()> {
        let from = format!("{} <{}>", self.config.from_name, self.config.from);
        let message = Message::builder()
            .from(from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
            .to(mail.to.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(mail.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body)
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        self.transport()?
            .send(message)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "smtp"
    }
}

/// Writes mail to the log instead of sending it
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, mail: Mail) -> Result<()> {
        tracing::info!(to = %mail.to, subject = %mail.subject, "Mail delivery disabled, message logged");
        tracing::debug!("{}", mail.body);
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "log"
    }
}

pub fn from_config(config: &MailConfig) -> Arc<dyn Notifier> {
    if config.enabled && !config.smtp_host.is_empty() {
        tracing::info!("SMTP notifications via {}:{}", config.smtp_host, config.smtp_port);
        Arc::new(SmtpNotifier::new(config.clone()))
    } else {
        tracing::info!("Mail disabled, notifications go to the log");
        Arc::new(LogNotifier)
    }
}

pub fn maintenance_reminder(
    to: &str,
    title: &str,
    equipment: &str,
    scheduled_start: &str,
    site_name: &str,
) -> Mail {
    Mail {
        to: to.to_string(),
        subject: format!("[{}] Maintenance reminder: {}", site_name, title),
        body: format!(
            "Hello,\n\nThe maintenance activity \"{}\" on {} is scheduled to start at {}.\n\n{}",
            title, equipment, scheduled_start, site_name
        ),
    }
}

pub fn event_reminder(to: &str, title: &str, equipment: &str, date: &str, site_name: &str) -> Mail {
    Mail {
        to: to.to_string(),
        subject: format!("[{}] Event reminder: {}", site_name, title),
        body: format!(
            "Hello,\n\nThe calendar event \"{}\" for {} takes place on {}.\n\n{}",
            title, equipment, date, site_name
        ),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every message in memory
    #[derive(Default)]
    pub(crate) struct MemoryNotifier {
        pub sent: Mutex<Vec<Mail>>,
    }

    #[async_trait]
    impl Notifier for MemoryNotifier {
        async fn send(&self, mail: Mail) -> Result<()> {
            self.sent.lock().map_err(|_| anyhow!("poisoned"))?.push(mail);
            Ok(())
        }

        fn kind(&self) -> &'static str {
            "memory"
        }
    }

    #[test]
    fn test_disabled_mail_logs() {
        let config = MailConfig {
            enabled: false,
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
            username: String::new(),
            password: String::new(),
            from: "noreply@example.com".to_string(),
            from_name: "Maintenance".to_string(),
        };
        assert_eq!(from_config(&config).kind(), "log");
        let enabled = MailConfig { enabled: true, ..config };
        assert_eq!(from_config(&enabled).kind(), "smtp");
    }

    #[tokio::test]
    async fn test_log_notifier_accepts_mail() {
        let mail = maintenance_reminder("tech@example.com", "Oil Test - TX-01", "TX-01", "2030-01-05 09:00", "Dashboard");
        assert!(mail.subject.contains("Oil Test - TX-01"));
        LogNotifier.send(mail).await.unwrap();
    }
}
