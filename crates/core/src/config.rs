use std::env;
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::model::{IndexCategory, Priority};
use crate::time::{parse_clock, parse_offset};

/// Default settings file, relative to the working directory.
pub const DEFAULT_SETTINGS_PATH: &str = "config/bellwether.yaml";

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Resolve a `${VAR}` reference to the variable's value; other strings pass through.
pub fn resolve_env_ref(value: &str) -> Result<String, SettingsError> {
    let Some(inner) = value.strip_prefix("${") else {
        return Ok(value.to_string());
    };
    let var_name = inner
        .strip_suffix('}')
        .ok_or_else(|| SettingsError::invalid("env", format!("malformed env var reference: {value}")))?;
    env::var(var_name).map_err(|_| SettingsError::MissingEnv(var_name.to_string()))
}

// ── Top-level settings ────────────────────────────────────────

/// Full settings document, usually read from `config/bellwether.yaml`.
///
/// Every field has a default, so an empty document is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: AppSettings,
    pub market: MarketSettings,
    pub notifications: NotificationSettings,
    pub reminders: ReminderSettings,
    pub tasks: TaskSettings,
    pub scheduler: SchedulerSettings,
    /// File the settings were read from; `None` means built-in defaults.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Settings {
    /// Parse settings from a YAML string, then apply env overrides and validate.
    pub fn from_yaml(yaml: &str) -> Result<Self, SettingsError> {
        let mut settings: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from `path`, or from the default search path when `None`.
    ///
    /// An explicit path must exist. When searching, a missing file falls back
    /// to the built-in defaults. The chosen file is kept in `source` so it can
    /// be logged once a subscriber is installed.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let resolved = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::discover(),
        };

        match resolved {
            Some(p) => {
                let content = std::fs::read_to_string(&p).map_err(|source| SettingsError::Io {
                    path: p.clone(),
                    source,
                })?;
                let mut settings = Self::from_yaml(&content)?;
                settings.source = Some(p);
                Ok(settings)
            }
            None => Self::from_yaml(""),
        }
    }

    /// Log where the settings came from.
    pub fn log_source(&self) {
        match &self.source {
            Some(p) => tracing::info!(path = %p.display(), "settings loaded"),
            None => tracing::info!("no settings file found, using defaults"),
        }
    }

    /// Search order: `BELLWETHER_CONFIG`, `config/bellwether.yaml`, then the user config dir.
    fn discover() -> Option<PathBuf> {
        if let Some(p) = env_opt("BELLWETHER_CONFIG") {
            return Some(PathBuf::from(p));
        }
        let local = PathBuf::from(DEFAULT_SETTINGS_PATH);
        if local.exists() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|d| d.join("bellwether").join("config.yaml"))
            .filter(|p| p.exists())
    }

    /// Secrets and deployment-specific values may come from the environment.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_opt("BELLWETHER_DATABASE_URL") {
            self.app.database_url = v;
        }
        if let Some(v) = env_opt("BELLWETHER_LOG_LEVEL") {
            self.app.log_level = v;
        }
        if let Some(v) = env_opt("TELEGRAM_BOT_TOKEN") {
            self.notifications.telegram.bot_token = v;
        }
        if let Some(v) = env_opt("TELEGRAM_CHAT_ID") {
            self.notifications.telegram.chat_id = v;
        }
        if let Some(v) = env_opt("SMTP_USERNAME") {
            self.notifications.email.username = Some(v);
        }
        if let Some(v) = env_opt("SMTP_PASSWORD") {
            self.notifications.email.password = Some(v);
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.local_offset()?;
        self.market.summary_clock()?;
        let open = self.market.open_clock()?;
        let close = self.market.close_clock()?;
        if open >= close {
            return Err(SettingsError::invalid(
                "market.market_open",
                format!("market opens at {open} but closes at {close}"),
            ));
        }
        if self.market.monitor_interval_minutes == 0 {
            return Err(SettingsError::invalid(
                "market.monitor_interval_minutes",
                "must be greater than zero",
            ));
        }
        if self.market.trading_days.is_empty() {
            return Err(SettingsError::invalid("market.trading_days", "at least one day is required"));
        }
        let alerts = &self.market.alerts;
        for (key, value) in [
            ("market.alerts.significant_change_percent", alerts.significant_change_percent),
            ("market.alerts.large_move_percent", alerts.large_move_percent),
            ("market.alerts.neutral_band_percent", alerts.neutral_band_percent),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SettingsError::invalid(key, "must be a non-negative number"));
            }
        }
        if self.reminders.check_interval_seconds == 0 {
            return Err(SettingsError::invalid(
                "reminders.check_interval_seconds",
                "must be greater than zero",
            ));
        }
        if self.notifications.max_attempts == 0 {
            return Err(SettingsError::invalid(
                "notifications.max_attempts",
                "must be at least 1",
            ));
        }
        if self.notifications.send_timeout_secs == 0 {
            return Err(SettingsError::invalid(
                "notifications.send_timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.notifications.telegram.timeout_secs == 0 {
            return Err(SettingsError::invalid(
                "notifications.telegram.timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.scheduler.tick_millis == 0 || self.scheduler.tick_millis > 60_000 {
            return Err(SettingsError::invalid(
                "scheduler.tick_millis",
                "must be between 1 and 60000",
            ));
        }
        self.scheduler.archive_clock()?;
        Ok(())
    }

    pub fn local_offset(&self) -> Result<FixedOffset, SettingsError> {
        parse_offset("app.utc_offset", &self.app.utc_offset)
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        let n = &self.notifications;
        tracing::info!("Settings loaded ({}):", self.app.name);
        tracing::info!("  app:        utc_offset={}, db={}", self.app.utc_offset, self.app.database_url);
        tracing::info!(
            "  market:     {} indices, {} sectors, source={:?}, window={}-{} every {}m",
            self.market.indices.len(),
            self.market.sectors.len(),
            self.market.source,
            self.market.market_open,
            self.market.market_close,
            self.market.monitor_interval_minutes,
        );
        tracing::info!(
            "  channels:   desktop={}, email={}, telegram={}",
            n.desktop.enabled,
            n.email.enabled,
            n.telegram.enabled,
        );
        tracing::info!(
            "  reminders:  every {}s, advance={}m",
            self.reminders.check_interval_seconds,
            self.reminders.advance_notification_minutes,
        );
        tracing::info!(
            "  tasks:      archive after {}d at {}",
            self.tasks.auto_archive_completed_days,
            self.scheduler.archive_time,
        );
    }
}

// ── App ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub name: String,
    /// Local UTC offset used for day boundaries and clock-time triggers.
    pub utc_offset: String,
    pub log_level: String,
    pub database_url: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "Bellwether".to_string(),
            utc_offset: "+05:30".to_string(),
            log_level: "info".to_string(),
            database_url: "sqlite://data/bellwether.db".to_string(),
        }
    }
}

// ── Market ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketSourceKind {
    /// Yahoo Finance chart API.
    Yahoo,
    /// Built-in static quotes, for offline runs.
    Demo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSettings {
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub category: IndexCategory,
}

impl IndexSettings {
    pub fn new(symbol: &str, name: &str, category: IndexCategory) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            category,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    /// Absolute percent change that triggers a market monitor alert.
    pub significant_change_percent: f64,
    /// Absolute percent change listed as a notable move in summaries.
    pub large_move_percent: f64,
    /// Changes within ±band count as flat for sentiment.
    pub neutral_band_percent: f64,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            significant_change_percent: 2.0,
            large_move_percent: 1.5,
            neutral_band_percent: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSettings {
    pub source: MarketSourceKind,
    pub summary_time: String,
    pub market_open: String,
    pub market_close: String,
    pub monitor_interval_minutes: u32,
    pub trading_days: Vec<Weekday>,
    pub indices: Vec<IndexSettings>,
    pub sectors: Vec<IndexSettings>,
    pub alerts: AlertSettings,
    pub top_movers: usize,
    pub fetch_timeout_secs: u64,
    pub cache_ttl_secs: u64,
    /// Send a low-urgency desktop update on every monitor run.
    pub live_updates: bool,
}

impl Default for MarketSettings {
    fn default() -> Self {
        use IndexCategory::*;
        Self {
            source: MarketSourceKind::Yahoo,
            summary_time: "07:00".to_string(),
            market_open: "09:15".to_string(),
            market_close: "15:30".to_string(),
            monitor_interval_minutes: 30,
            trading_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            indices: vec![
                IndexSettings::new("^NSEI", "NIFTY 50", LargeCap),
                IndexSettings::new("^BSESN", "BSE SENSEX", LargeCap),
                IndexSettings::new("^NSEMDCP50", "NIFTY MIDCAP 50", MidCap),
                IndexSettings::new("^CNXSMALLCAP", "NIFTY SMALLCAP 100", SmallCap),
            ],
            sectors: vec![
                IndexSettings::new("^NSEBANK", "NIFTY BANK", Sector),
                IndexSettings::new("^CNXIT", "NIFTY IT", Sector),
                IndexSettings::new("^CNXAUTO", "NIFTY AUTO", Sector),
                IndexSettings::new("^CNXPHARMA", "NIFTY PHARMA", Sector),
                IndexSettings::new("^CNXFMCG", "NIFTY FMCG", Sector),
            ],
            alerts: AlertSettings::default(),
            top_movers: 3,
            fetch_timeout_secs: 10,
            cache_ttl_secs: 300,
            live_updates: false,
        }
    }
}

impl MarketSettings {
    pub fn summary_clock(&self) -> Result<NaiveTime, SettingsError> {
        parse_clock("market.summary_time", &self.summary_time)
    }

    pub fn open_clock(&self) -> Result<NaiveTime, SettingsError> {
        parse_clock("market.market_open", &self.market_open)
    }

    pub fn close_clock(&self) -> Result<NaiveTime, SettingsError> {
        parse_clock("market.market_close", &self.market_close)
    }

    /// Display name for a configured index or sector symbol.
    pub fn display_name(&self, symbol: &str) -> Option<&str> {
        self.indices
            .iter()
            .chain(self.sectors.iter())
            .find(|i| i.symbol == symbol)
            .map(|i| i.name.as_str())
    }
}

// ── Notifications ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// Delivery attempts per channel before recording a failure.
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    /// Upper bound on a single delivery attempt, whatever the channel.
    pub send_timeout_secs: u64,
    pub desktop: DesktopSettings,
    pub email: EmailSettings,
    pub telegram: TelegramSettings,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff_ms: 2_000,
            send_timeout_secs: 30,
            desktop: DesktopSettings::default(),
            email: EmailSettings::default(),
            telegram: TelegramSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DesktopSettings {
    pub enabled: bool,
    pub app_name: String,
    /// Executable used to raise the notification.
    pub command: String,
}

impl Default for DesktopSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            app_name: "Bellwether".to_string(),
            command: "notify-send".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub use_tls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub to: Vec<String>,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            use_tls: true,
            username: None,
            password: None,
            from: String::new(),
            to: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    pub enabled: bool,
    /// Literal token or `${ENV_VAR}` reference.
    pub bot_token: String,
    pub chat_id: String,
    pub parse_mode: Option<String>,
    /// HTTP request timeout for the Bot API.
    pub timeout_secs: u64,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            chat_id: String::new(),
            parse_mode: None,
            timeout_secs: 10,
        }
    }
}

// ── Reminders / tasks ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderSettings {
    pub check_interval_seconds: u64,
    /// Fire reminders this many minutes before their trigger time.
    pub advance_notification_minutes: u32,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            check_interval_seconds: 60,
            advance_notification_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    pub auto_archive_completed_days: u32,
    pub default_priority: Priority,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            auto_archive_completed_days: 30,
            default_priority: Priority::Medium,
        }
    }
}

// ── Scheduler ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Trigger-check loop period.
    pub tick_millis: u64,
    /// Trigger lateness beyond this is logged as a warning.
    pub drift_tolerance_secs: u64,
    pub archive_time: String,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_millis: 1_000,
            drift_tolerance_secs: 60,
            archive_time: "00:00".to_string(),
        }
    }
}

impl SchedulerSettings {
    pub fn archive_clock(&self) -> Result<NaiveTime, SettingsError> {
        parse_clock("scheduler.archive_time", &self.archive_time)
    }
}
