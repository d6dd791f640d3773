//! Telegram Bot API notifier.
//!
//! Posts to `sendMessage` with an urgency marker in front of the title.
//! Plain, HTML and MarkdownV2 parse modes are supported; a 429 reply is
//! surfaced as [`NotifyError::RateLimited`].

use std::time::Duration;

use bellwether_core::config::{resolve_env_ref, TelegramSettings};

use crate::traits::{Channel, Notification, Notifier, NotifyError, Urgency};

const API_BASE: &str = "https://api.telegram.org";

const MARKDOWN_V2_RESERVED: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Backslash-escape every character MarkdownV2 reserves. Index names like
/// `NIFTY 50 (+1.2%)` contain several of them.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    for ch in text.chars() {
        if MARKDOWN_V2_RESERVED.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Escapes `&`, `<` and `>` for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            c => result.push(c),
        }
    }
    result
}

fn urgency_marker(urgency: Urgency) -> &'static str {
    match urgency {
        Urgency::Low => "ℹ️",
        Urgency::Normal => "📢",
        Urgency::High => "⚠️",
        Urgency::Critical => "🚨",
    }
}

#[derive(Debug)]
pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    parse_mode: Option<String>,
    client: reqwest::Client,
    api_base: String,
}

impl TelegramNotifier {
    /// Creates a new `TelegramNotifier` from settings.
    ///
    /// `${VAR}` token and chat id references are resolved from the environment. Returns
    /// [`NotifyError::Config`] if the token or chat id is empty or the env var
    /// is missing. Every request is bounded by `timeout_secs`.
    pub fn from_config(settings: &TelegramSettings) -> Result<Self, NotifyError> {
        let bot_token =
            resolve_env_ref(&settings.bot_token).map_err(|e| NotifyError::Config(e.to_string()))?;
        let chat_id =
            resolve_env_ref(&settings.chat_id).map_err(|e| NotifyError::Config(e.to_string()))?;

        if bot_token.is_empty() {
            return Err(NotifyError::Config(
                "Telegram bot token must not be empty".to_string(),
            ));
        }
        if chat_id.is_empty() {
            return Err(NotifyError::Config(
                "Telegram chat id must not be empty".to_string(),
            ));
        }

        let timeout = Duration::from_secs(settings.timeout_secs.max(1));
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            bot_token,
            chat_id,
            parse_mode: settings.parse_mode.clone(),
            client,
            api_base: API_BASE.to_string(),
        })
    }

    /// Point the notifier at a different API host.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Message text for the configured parse mode: marker, bold title, body.
    fn format_text(&self, notification: &Notification) -> String {
        let marker = urgency_marker(notification.urgency);
        match self.parse_mode.as_deref() {
            Some("HTML") => format!(
                "{marker} <b>{}</b>\n\n{}",
                escape_html(&notification.subject),
                escape_html(&notification.body)
            ),
            Some("MarkdownV2") => format!(
                "{marker} *{}*\n\n{}",
                escape_markdown_v2(&notification.subject),
                escape_markdown_v2(&notification.body)
            ),
            _ => format!("{marker} {}\n\n{}", notification.subject, notification.body),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);

        let mut body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": self.format_text(notification),
        });

        if let Some(ref mode) = self.parse_mode {
            body["parse_mode"] = serde_json::Value::String(mode.clone());
        }

        tracing::debug!(chat_id = %self.chat_id, subject = %notification.subject, "telegram send");

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        let reply: serde_json::Value = response.json().await?;
        if reply["ok"].as_bool() == Some(true) {
            return Ok(());
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(NotifyError::RateLimited {
                retry_after_secs: reply["parameters"]["retry_after"].as_u64().unwrap_or(30),
            });
        }

        let description = reply["description"].as_str().unwrap_or("no description");

        Err(NotifyError::Config(format!(
            "Telegram API error ({status}): {description}"
        )))
    }

    fn channel(&self) -> Channel {
        Channel::Telegram
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(token: &str, parse_mode: Option<&str>) -> TelegramSettings {
        TelegramSettings {
            enabled: true,
            bot_token: token.to_string(),
            chat_id: "12345".to_string(),
            parse_mode: parse_mode.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn markdown_escapes_index_lines() {
        assert_eq!(
            escape_markdown_v2("NIFTY_50 *up* (+1.2%) [demo] #1 a=b|c {x} ~y~ `z` > ok!"),
            r"NIFTY\_50 \*up\* \(\+1\.2%\) \[demo\] \#1 a\=b\|c \{x\} \~y\~ \`z\` \> ok\!"
        );
        assert_eq!(escape_markdown_v2("Pay rent"), "Pay rent");
    }

    #[test]
    fn html_escapes_angle_brackets_and_ampersand() {
        assert_eq!(escape_html("P&L <up>"), "P&amp;L &lt;up&gt;");
    }

    #[test]
    fn token_and_chat_id_resolve_from_env() {
        std::env::set_var("BELLWETHER_TEST_TG_BOT_TOKEN", "123:ABC");
        std::env::set_var("BELLWETHER_TEST_TG_CHAT", "-100777");
        let mut s = settings("${BELLWETHER_TEST_TG_BOT_TOKEN}", None);
        s.chat_id = "${BELLWETHER_TEST_TG_CHAT}".to_string();
        let notifier = TelegramNotifier::from_config(&s).unwrap();
        assert_eq!(notifier.bot_token, "123:ABC");
        assert_eq!(notifier.chat_id, "-100777");
        std::env::remove_var("BELLWETHER_TEST_TG_BOT_TOKEN");
        std::env::remove_var("BELLWETHER_TEST_TG_CHAT");
    }

    #[test]
    fn unset_token_variable_is_config_error() {
        let err = TelegramNotifier::from_config(&settings("${BELLWETHER_TEST_TG_UNSET}", None))
            .unwrap_err();
        assert!(matches!(err, NotifyError::Config(_)));
        assert!(err.to_string().contains("BELLWETHER_TEST_TG_UNSET"));
    }

    #[test]
    fn blank_token_rejected() {
        assert!(TelegramNotifier::from_config(&settings("", None)).is_err());
    }

    #[test]
    fn blank_chat_id_rejected() {
        let mut s = settings("123:ABC", None);
        s.chat_id.clear();
        assert!(TelegramNotifier::from_config(&s).is_err());
    }

    #[test]
    fn html_format_bolds_escaped_title() {
        let notifier = TelegramNotifier::from_config(&settings("t", Some("HTML"))).unwrap();
        let n = Notification::new("S&P <alert>", "body").with_urgency(Urgency::Critical);
        assert_eq!(
            notifier.format_text(&n),
            "🚨 <b>S&amp;P &lt;alert&gt;</b>\n\nbody"
        );
    }

    #[test]
    fn plain_format_has_no_markup() {
        let notifier = TelegramNotifier::from_config(&settings("t", None)).unwrap();
        let n = Notification::new("Reminder", "call the bank");
        assert_eq!(notifier.format_text(&n), "📢 Reminder\n\ncall the bank");
        assert_eq!(notifier.channel_name(), "telegram");
    }

    #[tokio::test]
    async fn unreachable_api_is_http_error() {
        let notifier = TelegramNotifier::from_config(&settings("t", None))
            .unwrap()
            .with_api_base("http://127.0.0.1:9");
        let err = notifier.send(&Notification::test_message()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Http(_)));
    }
}
