//! Notifier trait definition and shared error types.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SMTP delivery failed: {0}")]
    Smtp(String),

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// How loudly a message should be presented. Only affects formatting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery channel kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Desktop,
    Email,
    Telegram,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Desktop, Channel::Email, Channel::Telegram];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Desktop => "desktop",
            Channel::Email => "email",
            Channel::Telegram => "telegram",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = NotifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "desktop" => Ok(Channel::Desktop),
            "email" => Ok(Channel::Email),
            "telegram" => Ok(Channel::Telegram),
            other => Err(NotifyError::Config(format!("unknown channel '{other}'"))),
        }
    }
}

/// Which configured channels a message goes to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ChannelSelection {
    /// Every configured channel.
    #[default]
    All,
    Only(Vec<Channel>),
}

impl ChannelSelection {
    pub fn only(channel: Channel) -> Self {
        ChannelSelection::Only(vec![channel])
    }

    pub fn includes(&self, channel: Channel) -> bool {
        match self {
            ChannelSelection::All => true,
            ChannelSelection::Only(list) => list.contains(&channel),
        }
    }
}

/// A rendered notification ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub urgency: Urgency,
}

impl Notification {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            urgency: Urgency::Normal,
        }
    }

    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = urgency;
        self
    }

    /// Fixed message used to check that channels are wired up.
    pub fn test_message() -> Self {
        Self::new(
            "Bellwether test notification",
            "This is a test notification from Bellwether. If you can read this, the channel works.",
        )
    }
}

/// Trait for notification channel implementations.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification through this channel.
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Test connectivity with a sample notification.
    async fn test(&self) -> Result<(), NotifyError> {
        self.send(&Notification::test_message()).await
    }

    fn channel(&self) -> Channel;

    /// Human-readable name for this channel (e.g., "desktop", "email").
    fn channel_name(&self) -> &str {
        self.channel().as_str()
    }
}

/// Final state of one channel's delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum DeliveryStatus {
    Delivered,
    Failed(String),
}

/// Result of dispatching a notification to a single channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub channel: String,
    pub status: DeliveryStatus,
    pub attempts: u32,
    pub duration_ms: u64,
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        self.status == DeliveryStatus::Delivered
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            DeliveryStatus::Delivered => None,
            DeliveryStatus::Failed(reason) => Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_parses_case_insensitively() {
        assert_eq!("Telegram".parse::<Channel>().unwrap(), Channel::Telegram);
        assert!("pager".parse::<Channel>().is_err());
    }

    #[test]
    fn selection_all_includes_everything() {
        for c in Channel::ALL {
            assert!(ChannelSelection::All.includes(c));
        }
        let only = ChannelSelection::only(Channel::Desktop);
        assert!(only.includes(Channel::Desktop));
        assert!(!only.includes(Channel::Email));
    }

    #[test]
    fn urgency_orders_by_severity() {
        assert!(Urgency::Critical > Urgency::High);
        assert!(Urgency::Low < Urgency::Normal);
    }
}
