mod app;
mod cli;
mod commands;
mod output;
mod when;

use anyhow::Result;
use clap::Parser;

use bellwether_core::config::load_dotenv;

use crate::app::{init_tracing, App};
use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let args = CliArgs::parse();

    let app = App::load(&args)?;
    init_tracing(&app.settings.app.log_level);
    app.settings.log_source();

    match args.command {
        Command::Daemon { test } => commands::daemon(&app, test).await,
        Command::Status => commands::status(&app).await,
        Command::RunJob { name } => commands::run_job(&app, &name).await,
        Command::MarketSummary => commands::market_summary(&app).await,
        Command::TaskSummary => commands::task_summary(&app).await,
        Command::TestNotify => commands::test_notify(&app).await,
        Command::Task(cmd) => commands::task(&app, cmd).await,
        Command::Reminder(cmd) => commands::reminder(&app, cmd).await,
    }
}
