//! Desktop notifier backed by `notify-send`.

use std::time::Duration;

use tokio::process::Command;

use bellwether_core::config::DesktopSettings;

use crate::traits::{Channel, Notification, Notifier, NotifyError, Urgency};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Raises a desktop notification by running `notify-send` (or a compatible command).
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    command: String,
    app_name: String,
    timeout: Duration,
}

impl DesktopNotifier {
    pub fn from_config(settings: &DesktopSettings) -> Self {
        Self {
            command: settings.command.clone(),
            app_name: settings.app_name.clone(),
            timeout: COMMAND_TIMEOUT,
        }
    }

    /// `notify-send` only knows low, normal and critical.
    fn urgency_arg(urgency: Urgency) -> &'static str {
        match urgency {
            Urgency::Low => "low",
            Urgency::Normal | Urgency::High => "normal",
            Urgency::Critical => "critical",
        }
    }

    fn args(&self, notification: &Notification) -> Vec<String> {
        vec![
            "--app-name".to_string(),
            self.app_name.clone(),
            "--urgency".to_string(),
            Self::urgency_arg(notification.urgency).to_string(),
            "--icon".to_string(),
            "dialog-information".to_string(),
            notification.subject.clone(),
            notification.body.clone(),
        ]
    }
}

#[async_trait::async_trait]
impl Notifier for DesktopNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut cmd = Command::new(&self.command);
        cmd.args(self.args(notification)).kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| NotifyError::Timeout(self.timeout))?
            .map_err(|e| NotifyError::Command(format!("{}: {e}", self.command)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(NotifyError::Command(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        tracing::debug!(channel = "desktop", subject = %notification.subject, "desktop notification shown");
        Ok(())
    }

    fn channel(&self) -> Channel {
        Channel::Desktop
    }
}
