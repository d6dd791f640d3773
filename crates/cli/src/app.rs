use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::FixedOffset;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bellwether_core::Settings;
use bellwether_market::MarketProvider;
use bellwether_notify::Dispatcher;
use bellwether_scheduler::{standing_jobs, JobContext, Scheduler, SchedulerConfig};
use bellwether_store::{SqliteStore, TaskStore};

use crate::cli::CliArgs;

/// `RUST_LOG` wins; otherwise the level from settings applies.
pub fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

/// Settings plus the lazily-built services a command needs.
pub struct App {
    pub settings: Settings,
    pub offset: FixedOffset,
    demo: bool,
}

impl App {
    pub fn load(args: &CliArgs) -> Result<Self> {
        let settings =
            Settings::load(args.config.as_deref()).context("failed to load settings")?;
        let offset = settings.local_offset()?;
        Ok(Self {
            settings,
            offset,
            demo: args.demo,
        })
    }

    pub async fn store(&self) -> Result<Arc<dyn TaskStore>> {
        let url = &self.settings.app.database_url;
        let store = SqliteStore::connect(url)
            .await
            .with_context(|| format!("failed to open database {url}"))?;
        Ok(Arc::new(store))
    }

    pub fn market(&self) -> Result<Arc<MarketProvider>> {
        let provider = MarketProvider::from_settings(&self.settings.market, self.demo)
            .context("failed to set up market data source")?;
        info!(source = provider.source_name(), "market data source ready");
        Ok(Arc::new(provider))
    }

    pub async fn context(&self) -> Result<Arc<JobContext>> {
        let ctx = JobContext::new(
            self.settings.clone(),
            self.market()?,
            Dispatcher::from_settings(&self.settings.notifications),
            self.store().await?,
        )?;
        Ok(Arc::new(ctx))
    }

    /// A scheduler with the standing jobs registered but not started.
    pub fn scheduler(&self, ctx: Arc<JobContext>) -> Result<Scheduler> {
        let scheduler = Scheduler::new(SchedulerConfig::from_settings(&self.settings)?);
        for job in standing_jobs(ctx)? {
            scheduler.register(job)?;
        }
        Ok(scheduler)
    }
}
