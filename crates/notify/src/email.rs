//! SMTP email notifier via `lettre` with TLS support.
//!
//! Delivers notifications as multipart (plain text + HTML) emails.
//! Port 465 uses implicit TLS; other ports use STARTTLS unless TLS is disabled.

use bellwether_core::config::{resolve_env_ref, EmailSettings};
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::templating::TemplateRenderer;
use crate::traits::{Channel, Notification, Notifier, NotifyError, Urgency};

const HTML_TEMPLATE: &str = r#"<html>
  <body style="font-family: Arial, sans-serif;">
    <h2 style="color: #2c3e50;">{{ subject | escape }}</h2>
    <div style="white-space: pre-wrap; line-height: 1.6;">{{ body | escape }}</div>
    <hr>
    <p style="color: #7f8c8d; font-size: 0.9em;">Automated notification from Bellwether.</p>
  </body>
</html>"#;

/// Sends notifications as emails via SMTP.
#[derive(Debug)]
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
    renderer: TemplateRenderer,
}

impl EmailNotifier {
    /// Build an `EmailNotifier` from SMTP settings.
    ///
    /// Username and password may be literals or `${ENV_VAR}` references. When
    /// both are present they are passed to the transport; otherwise the
    /// connection is unauthenticated.
    pub fn from_config(settings: &EmailSettings) -> Result<Self, NotifyError> {
        let from: Mailbox = settings
            .from
            .parse()
            .map_err(|e: lettre::address::AddressError| NotifyError::Config(format!("from: {e}")))?;

        let to: Vec<Mailbox> = settings
            .to
            .iter()
            .map(|addr| {
                addr.parse()
                    .map_err(|e: lettre::address::AddressError| NotifyError::Config(format!("to: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if to.is_empty() {
            return Err(NotifyError::Config(
                "at least one recipient is required".to_string(),
            ));
        }

        let host = settings.smtp_host.as_str();
        let port = settings.smtp_port;
        let mut builder = if port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| NotifyError::Config(e.to_string()))?
                .port(port)
        } else if settings.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| NotifyError::Config(e.to_string()))?
                .port(port)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(port)
        };

        if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
            let user = resolve_env_ref(user).map_err(|e| NotifyError::Config(e.to_string()))?;
            let pass = resolve_env_ref(pass).map_err(|e| NotifyError::Config(e.to_string()))?;
            builder = builder.credentials(Credentials::new(user, pass));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
            renderer: TemplateRenderer::new(),
        })
    }

    fn subject_line(notification: &Notification) -> String {
        let prefix = match notification.urgency {
            Urgency::Low | Urgency::Normal => "",
            Urgency::High => "[IMPORTANT] ",
            Urgency::Critical => "[URGENT] ",
        };
        format!("{prefix}{}", notification.subject)
    }

    fn build_message(&self, notification: &Notification) -> Result<Message, NotifyError> {
        let html = self.renderer.render(HTML_TEMPLATE, notification)?;

        let mut message_builder = Message::builder()
            .from(self.from.clone())
            .subject(Self::subject_line(notification));
        for recipient in &self.to {
            message_builder = message_builder.to(recipient.clone());
        }

        message_builder
            .multipart(MultiPart::alternative_plain_html(
                notification.body.clone(),
                html,
            ))
            .map_err(|e| NotifyError::Smtp(e.to_string()))
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let email = self.build_message(notification)?;

        self.transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Smtp(e.to_string()))?;

        tracing::debug!(
            channel = "email",
            subject = %notification.subject,
            recipients = self.to.len(),
            "email accepted by relay"
        );
        Ok(())
    }

    fn channel(&self) -> Channel {
        Channel::Email
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> EmailSettings {
        EmailSettings {
            enabled: true,
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
            use_tls: true,
            username: None,
            password: None,
            from: "Bellwether <alerts@example.com>".to_string(),
            to: vec!["me@example.com".to_string()],
        }
    }

    #[test]
    fn from_config_valid() {
        assert!(EmailNotifier::from_config(&settings()).is_ok());
    }

    #[test]
    fn from_config_invalid_from_address() {
        let s = EmailSettings {
            from: "bad-address".to_string(),
            ..settings()
        };
        let err = EmailNotifier::from_config(&s).unwrap_err().to_string();
        assert!(err.contains("Configuration error"), "got: {err}");
    }

    #[test]
    fn from_config_invalid_to_address() {
        let s = EmailSettings {
            to: vec!["not-valid".to_string()],
            ..settings()
        };
        assert!(EmailNotifier::from_config(&s).is_err());
    }

    #[test]
    fn from_config_empty_recipients() {
        let s = EmailSettings {
            to: Vec::new(),
            ..settings()
        };
        let err = EmailNotifier::from_config(&s).unwrap_err().to_string();
        assert!(err.contains("at least one recipient"), "got: {err}");
    }

    #[test]
    fn from_config_implicit_tls_and_plain() {
        let implicit = EmailSettings {
            smtp_port: 465,
            ..settings()
        };
        assert!(EmailNotifier::from_config(&implicit).is_ok());

        let plain = EmailSettings {
            smtp_port: 25,
            use_tls: false,
            ..settings()
        };
        assert!(EmailNotifier::from_config(&plain).is_ok());
    }

    #[test]
    fn missing_credential_env_is_config_error() {
        let s = EmailSettings {
            username: Some("me".to_string()),
            password: Some("${BELLWETHER_TEST_SMTP_PASS_UNSET}".to_string()),
            ..settings()
        };
        let err = EmailNotifier::from_config(&s).unwrap_err().to_string();
        assert!(err.contains("BELLWETHER_TEST_SMTP_PASS_UNSET"), "got: {err}");
    }

    #[test]
    fn urgency_prefixes_subject() {
        let n = Notification::new("Reminder", "x").with_urgency(Urgency::High);
        assert_eq!(EmailNotifier::subject_line(&n), "[IMPORTANT] Reminder");
        let n = n.with_urgency(Urgency::Critical);
        assert_eq!(EmailNotifier::subject_line(&n), "[URGENT] Reminder");
        let n = n.with_urgency(Urgency::Normal);
        assert_eq!(EmailNotifier::subject_line(&n), "Reminder");
    }

    #[test]
    fn message_escapes_html_body() {
        let notifier = EmailNotifier::from_config(&settings()).unwrap();
        let n = Notification::new("Tasks", "<script>alert(1)</script>");
        let message = notifier.build_message(&n).unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).to_string();
        assert!(raw.contains("&lt;script&gt;"), "got: {raw}");
    }

    #[test]
    fn channel_name_is_email() {
        let notifier = EmailNotifier::from_config(&settings()).unwrap();
        assert_eq!(notifier.channel_name(), "email");
    }
}
