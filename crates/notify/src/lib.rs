//! Notification fan-out for Bellwether.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable notification channels
//! - Desktop (`notify-send`), email and Telegram notifier implementations
//! - Minijinja template rendering for notification messages
//! - Dispatcher that delivers to the selected channels with bounded retries

pub mod desktop;
pub mod dispatcher;
pub mod email;
pub mod telegram;
pub mod templating;
pub mod traits;

pub use dispatcher::{Dispatcher, RetryPolicy};
pub use templating::TemplateRenderer;
pub use traits::{
    Channel, ChannelSelection, DeliveryStatus, DispatchOutcome, Notification, Notifier,
    NotifyError, Urgency,
};
