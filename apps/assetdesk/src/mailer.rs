//! # Mailer
//!
//! Best-effort delivery of the registry outbox.
//!
//! A notification is sent once per recipient. Failures are logged and
//! dropped; nothing is retried. Without an SMTP host the mailer only logs
//! what it would have sent.

use crate::config::MailConfig;
use assetdesk_core::{DeskError, Notification};
use lettre::{
    Message, SmtpTransport, Transport,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};

/// Outcome of one delivery run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
    /// Logged instead of sent because SMTP is not configured.
    pub logged: usize,
}

/// SMTP sender. The default value only logs.
#[derive(Clone, Default)]
pub struct Mailer {
    smtp: Option<Smtp>,
}

#[derive(Clone)]
struct Smtp {
    transport: SmtpTransport,
    from: Mailbox,
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer")
            .field("from", &self.smtp.as_ref().map(|s| s.from.to_string()))
            .finish()
    }
}

impl Mailer {
    pub fn new(config: &MailConfig) -> Result<Self, DeskError> {
        let from: Mailbox = config.from.parse().map_err(|e| {
            DeskError::Validation(format!("Invalid sender address '{}': {}", config.from, e))
        })?;

        let Some(host) = config.smtp_host.as_deref() else {
            tracing::info!("No SMTP host configured, notifications will only be logged");
            return Ok(Self::default());
        };

        let builder = if config.starttls {
            SmtpTransport::starttls_relay(host)
                .map_err(|e| DeskError::IoError(format!("SMTP transport for '{}': {}", host, e)))?
        } else {
            SmtpTransport::builder_dangerous(host)
        }
        .port(config.smtp_port);

        let builder = match (&config.username, &config.password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };
        tracing::info!(host, port = config.smtp_port, "SMTP delivery enabled");

        Ok(Self {
            smtp: Some(Smtp {
                transport: builder.build(),
                from,
            }),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.smtp.is_some()
    }

    pub async fn deliver(&self, notifications: Vec<Notification>) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for notification in notifications {
            for recipient in &notification.recipients {
                let Some(smtp) = &self.smtp else {
                    tracing::info!(
                        topic = ?notification.topic,
                        to = %recipient,
                        subject = %notification.subject,
                        "Notification (not sent, SMTP not configured)"
                    );
                    report.logged += 1;
                    continue;
                };

                let message = match build(&smtp.from, recipient, &notification) {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::warn!(to = %recipient, error = %e, "Skipping notification");
                        report.failed += 1;
                        continue;
                    }
                };

                let transport = smtp.transport.clone();
                let sent = tokio::task::spawn_blocking(move || transport.send(&message)).await;
                match sent {
                    Ok(Ok(_)) => {
                        tracing::debug!(to = %recipient, subject = %notification.subject, "Notification sent");
                        report.sent += 1;
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(to = %recipient, error = %e, "Notification delivery failed");
                        report.failed += 1;
                    }
                    Err(e) => {
                        tracing::warn!(to = %recipient, error = %e, "Notification task failed");
                        report.failed += 1;
                    }
                }
            }
        }
        report
    }
}

fn build(from: &Mailbox, recipient: &str, notification: &Notification) -> Result<Message, String> {
    let to: Mailbox = recipient
        .parse()
        .map_err(|e| format!("invalid address: {}", e))?;
    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(notification.subject.clone())
        .header(ContentType::TEXT_PLAIN)
        .body(notification.body.clone())
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assetdesk_core::NotificationTopic;
    use chrono::{TimeZone, Utc};

    fn notification(recipients: &[&str]) -> Notification {
        Notification {
            topic: NotificationTopic::ApprovalRequired,
            recipients: recipients.iter().map(|r| (*r).to_string()).collect(),
            subject: "Approval required: ITA/00001".to_string(),
            body: "Waiting for approval.".to_string(),
            queued_at: Utc
                .with_ymd_and_hms(2026, 3, 2, 9, 0, 0)
                .single()
                .expect("timestamp"),
        }
    }

    #[test]
    fn default_config_is_log_only() {
        let mailer = Mailer::new(&MailConfig::default()).expect("mailer");
        assert!(!mailer.is_configured());
    }

    #[test]
    fn invalid_sender_is_rejected() {
        let config = MailConfig {
            from: "not an address".to_string(),
            ..MailConfig::default()
        };
        assert!(matches!(
            Mailer::new(&config),
            Err(DeskError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn log_only_counts_every_recipient() {
        let mailer = Mailer::new(&MailConfig::default()).expect("mailer");
        let report = mailer
            .deliver(vec![
                notification(&["a@example.com", "b@example.com"]),
                notification(&["c@example.com"]),
            ])
            .await;
        assert_eq!(
            report,
            DeliveryReport {
                sent: 0,
                failed: 0,
                logged: 3,
            }
        );
    }
}
