//! Routes notifications to configured channels.
//!
//! The dispatcher delivers a notification to every selected channel in turn.
//! Each channel gets a bounded number of attempts, each bounded in time; a
//! channel that still fails is reported in its outcome and never blocks the
//! channels after it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bellwether_core::config::NotificationSettings;

use crate::desktop::DesktopNotifier;
use crate::email::EmailNotifier;
use crate::telegram::TelegramNotifier;
use crate::traits::{
    Channel, ChannelSelection, DeliveryStatus, DispatchOutcome, Notification, Notifier, NotifyError,
};

/// Upper bound on how long a rate-limited channel is waited for.
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// Default upper bound on one `Notifier::send` call.
const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Attempts, backoff and per-attempt timeout applied to every channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }
}

/// Fans notifications out to a fixed set of channels.
#[derive(Clone)]
pub struct Dispatcher {
    channels: Vec<Arc<dyn Notifier>>,
    retry: RetryPolicy,
}

impl Dispatcher {
    pub fn new(channels: Vec<Arc<dyn Notifier>>) -> Self {
        Self {
            channels,
            retry: RetryPolicy::default(),
        }
    }

    /// Create a dispatcher with no channels.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Build every enabled channel from settings.
    ///
    /// A misconfigured channel is logged and left out; the others still load.
    pub fn from_settings(settings: &NotificationSettings) -> Self {
        let mut channels: Vec<Arc<dyn Notifier>> = Vec::new();

        if settings.desktop.enabled {
            channels.push(Arc::new(DesktopNotifier::from_config(&settings.desktop)));
        }
        if settings.email.enabled {
            match EmailNotifier::from_config(&settings.email) {
                Ok(n) => channels.push(Arc::new(n)),
                Err(e) => tracing::warn!(channel = "email", error = %e, "channel disabled"),
            }
        }
        if settings.telegram.enabled {
            match TelegramNotifier::from_config(&settings.telegram) {
                Ok(n) => channels.push(Arc::new(n)),
                Err(e) => tracing::warn!(channel = "telegram", error = %e, "channel disabled"),
            }
        }

        let retry = RetryPolicy {
            max_attempts: settings.max_attempts.max(1),
            backoff: Duration::from_millis(settings.retry_backoff_ms),
            attempt_timeout: Duration::from_secs(settings.send_timeout_secs.max(1)),
        };
        let dispatcher = Self::new(channels).with_retry(retry);
        tracing::info!(channels = ?dispatcher.channel_names(), "notification channels ready");
        dispatcher
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.channel_name()).collect()
    }

    pub fn has_channel(&self, channel: Channel) -> bool {
        self.channels.iter().any(|c| c.channel() == channel)
    }

    /// Deliver `notification` to each selected channel.
    ///
    /// Never fails: every channel's result is returned as an outcome. With no
    /// matching channels the call is a logged no-op.
    pub async fn send(
        &self,
        notification: &Notification,
        selection: &ChannelSelection,
    ) -> Vec<DispatchOutcome> {
        let targets: Vec<&Arc<dyn Notifier>> = self
            .channels
            .iter()
            .filter(|c| selection.includes(c.channel()))
            .collect();

        if targets.is_empty() {
            tracing::debug!(subject = %notification.subject, "No notification channels configured");
            return Vec::new();
        }

        let mut outcomes = Vec::with_capacity(targets.len());
        for channel in targets {
            outcomes.push(self.deliver(channel.as_ref(), notification).await);
        }
        outcomes
    }

    /// Send the fixed test message through every channel.
    pub async fn send_test(&self) -> Vec<DispatchOutcome> {
        self.send(&Notification::test_message(), &ChannelSelection::All)
            .await
    }

    async fn deliver(&self, channel: &dyn Notifier, notification: &Notification) -> DispatchOutcome {
        let start = Instant::now();
        let max_attempts = self.retry.max_attempts.max(1);
        let limit = self.retry.attempt_timeout;
        let mut attempts = 0;
        let mut last_error: Option<NotifyError> = None;

        while attempts < max_attempts {
            attempts += 1;
            let result = tokio::time::timeout(limit, channel.send(notification))
                .await
                .unwrap_or(Err(NotifyError::Timeout(limit)));
            match result {
                Ok(()) => {
                    last_error = None;
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        channel = channel.channel_name(),
                        attempt = attempts,
                        max_attempts,
                        error = %e,
                        "Notification attempt failed"
                    );
                    let wait = match &e {
                        NotifyError::RateLimited { retry_after_secs } => {
                            Duration::from_secs(*retry_after_secs).min(MAX_RATE_LIMIT_WAIT)
                        }
                        _ => self.retry.backoff,
                    };
                    last_error = Some(e);
                    if attempts < max_attempts && !wait.is_zero() {
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let status = match last_error {
            None => {
                tracing::info!(
                    channel = channel.channel_name(),
                    subject = %notification.subject,
                    attempts,
                    duration_ms,
                    "Notification delivered"
                );
                DeliveryStatus::Delivered
            }
            Some(e) => {
                tracing::error!(
                    channel = channel.channel_name(),
                    subject = %notification.subject,
                    attempts,
                    error = %e,
                    duration_ms,
                    "Notification delivery failed"
                );
                DeliveryStatus::Failed(e.to_string())
            }
        };

        DispatchOutcome {
            channel: channel.channel_name().to_string(),
            status,
            attempts,
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockNotifier {
        channel: Channel,
        send_count: Arc<AtomicUsize>,
        /// Number of initial calls that fail before succeeding.
        fail_first: usize,
    }

    impl MockNotifier {
        fn new(channel: Channel, fail_first: usize) -> (Arc<dyn Notifier>, Arc<AtomicUsize>) {
            let count = Arc::new(AtomicUsize::new(0));
            let n = Arc::new(MockNotifier {
                channel,
                send_count: count.clone(),
                fail_first,
            });
            (n, count)
        }
    }

    #[async_trait::async_trait]
    impl Notifier for MockNotifier {
        async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
            let n = self.send_count.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                Err(NotifyError::Config("mock failure".to_string()))
            } else {
                Ok(())
            }
        }

        fn channel(&self) -> Channel {
            self.channel
        }
    }

    fn quick(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Duration::ZERO,
            attempt_timeout: Duration::from_secs(5),
        }
    }

    /// Accepts the call and never completes it.
    struct StalledNotifier;

    #[async_trait::async_trait]
    impl Notifier for StalledNotifier {
        async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
            std::future::pending().await
        }

        fn channel(&self) -> Channel {
            Channel::Email
        }
    }

    #[tokio::test]
    async fn dispatch_to_all_channels() {
        let (a, count_a) = MockNotifier::new(Channel::Desktop, 0);
        let (b, count_b) = MockNotifier::new(Channel::Email, 0);
        let dispatcher = Dispatcher::new(vec![a, b]).with_retry(quick(3));

        let outcomes = dispatcher
            .send(&Notification::new("test", "body"), &ChannelSelection::All)
            .await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.is_delivered()));
        assert_eq!(count_a.load(Ordering::SeqCst), 1);
        assert_eq!(count_b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn partial_failure_doesnt_block() {
        let (fail, fail_count) = MockNotifier::new(Channel::Email, usize::MAX);
        let (ok, ok_count) = MockNotifier::new(Channel::Telegram, 0);
        let dispatcher = Dispatcher::new(vec![fail, ok]).with_retry(quick(3));

        let outcomes = dispatcher
            .send(&Notification::new("test", "body"), &ChannelSelection::All)
            .await;
        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[0].is_delivered());
        assert_eq!(outcomes[0].attempts, 3);
        assert!(outcomes[0].error().unwrap().contains("mock failure"));
        assert!(outcomes[1].is_delivered());
        assert_eq!(fail_count.load(Ordering::SeqCst), 3);
        assert_eq!(ok_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let (flaky, count) = MockNotifier::new(Channel::Telegram, 2);
        let dispatcher = Dispatcher::new(vec![flaky]).with_retry(quick(3));

        let outcomes = dispatcher
            .send(&Notification::new("test", "body"), &ChannelSelection::All)
            .await;
        assert!(outcomes[0].is_delivered());
        assert_eq!(outcomes[0].attempts, 3);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn selection_limits_channels() {
        let (desktop, desktop_count) = MockNotifier::new(Channel::Desktop, 0);
        let (email, email_count) = MockNotifier::new(Channel::Email, 0);
        let dispatcher = Dispatcher::new(vec![desktop, email]).with_retry(quick(1));

        let outcomes = dispatcher
            .send(
                &Notification::new("live", "update"),
                &ChannelSelection::only(Channel::Desktop),
            )
            .await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].channel, "desktop");
        assert_eq!(desktop_count.load(Ordering::SeqCst), 1);
        assert_eq!(email_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stalled_channel_times_out_and_others_still_deliver() {
        let (ok, ok_count) = MockNotifier::new(Channel::Desktop, 0);
        let retry = quick(2).with_attempt_timeout(Duration::from_millis(50));
        let dispatcher = Dispatcher::new(vec![Arc::new(StalledNotifier), ok]).with_retry(retry);

        let outcomes = tokio::time::timeout(
            Duration::from_secs(5),
            dispatcher.send(&Notification::new("test", "body"), &ChannelSelection::All),
        )
        .await
        .expect("dispatch must not hang on a stalled channel");

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].channel, "email");
        assert_eq!(outcomes[0].attempts, 2);
        assert!(outcomes[0].error().unwrap().contains("Timed out"));
        assert!(outcomes[1].is_delivered());
        assert_eq!(ok_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn attempt_timeout_comes_from_settings() {
        let mut settings = NotificationSettings::default();
        settings.desktop.enabled = false;
        settings.send_timeout_secs = 7;
        let dispatcher = Dispatcher::from_settings(&settings);
        assert_eq!(dispatcher.retry.attempt_timeout, Duration::from_secs(7));
    }

    #[tokio::test]
    async fn no_channels_returns_empty() {
        let dispatcher = Dispatcher::empty();
        let outcomes = dispatcher
            .send(&Notification::new("test", "body"), &ChannelSelection::All)
            .await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn disabled_channels_are_not_built() {
        let mut settings = NotificationSettings::default();
        settings.desktop.enabled = false;
        let dispatcher = Dispatcher::from_settings(&settings);
        assert!(dispatcher.channel_names().is_empty());
    }

    #[tokio::test]
    async fn misconfigured_channel_is_skipped() {
        let mut settings = NotificationSettings::default();
        settings.telegram.enabled = true; // no token
        let dispatcher = Dispatcher::from_settings(&settings);
        assert!(dispatcher.has_channel(Channel::Desktop));
        assert!(!dispatcher.has_channel(Channel::Telegram));
    }
}
