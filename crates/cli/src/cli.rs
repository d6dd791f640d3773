use std::path::PathBuf;

use clap::{Parser, Subcommand};

use bellwether_core::{Priority, ReminderId, TaskId};

/// Market monitor, reminders and daily summaries.
///
/// `daemon` runs the scheduler until interrupted; the other commands do one
/// thing against the same settings and database, then exit.
#[derive(Parser, Debug)]
#[command(name = "bellwether", version, about = "Market monitor, reminders and daily summaries")]
pub struct CliArgs {
    /// Path to the settings file (default: config/bellwether.yaml)
    #[arg(long, global = true, env = "BELLWETHER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Use built-in static market data instead of the live source
    #[arg(long, global = true)]
    pub demo: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the scheduler until Ctrl+C or SIGTERM
    Daemon {
        /// Send a test notification through every channel after start-up
        #[arg(long)]
        test: bool,
    },

    /// Show every standing job with its trigger and next run
    Status,

    /// Run one job immediately and print its outcome
    RunJob {
        /// Job name, e.g. daily_summary or reminder_sweep
        name: String,
    },

    /// Fetch the configured indices and print a market overview
    MarketSummary,

    /// Print today's tasks, overdue tasks and counters
    TaskSummary,

    /// Send a test notification through every enabled channel
    TestNotify,

    /// Manage tasks
    #[command(subcommand)]
    Task(TaskCommand),

    /// Manage reminders
    #[command(subcommand)]
    Reminder(ReminderCommand),
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Create a task
    Add {
        title: String,

        /// Due time: "YYYY-MM-DD HH:MM", "YYYY-MM-DD", "HH:MM" or "+2h"
        #[arg(long)]
        due: Option<String>,

        /// low, medium or high (default from settings)
        #[arg(long, short)]
        priority: Option<Priority>,

        #[arg(long, short)]
        description: Option<String>,
    },

    /// List open tasks
    List {
        /// Include completed tasks
        #[arg(long)]
        all: bool,

        /// Include archived tasks
        #[arg(long)]
        archived: bool,

        #[arg(long, short)]
        priority: Option<Priority>,
    },

    /// Mark a task completed
    Done { id: TaskId },

    /// Reopen a completed or archived task
    Undo { id: TaskId },

    /// Delete a task
    Rm { id: TaskId },
}

#[derive(Subcommand, Debug)]
pub enum ReminderCommand {
    /// Create a reminder
    Add {
        title: String,

        /// Trigger time: "YYYY-MM-DD HH:MM", "YYYY-MM-DD", "HH:MM" or "+30m"
        #[arg(long)]
        at: String,

        /// daily, weekly or monthly; omit for a one-shot reminder
        #[arg(long)]
        repeat: Option<String>,

        #[arg(long, short)]
        description: Option<String>,
    },

    /// List reminders
    List {
        /// Include reminders that have already fired for good
        #[arg(long)]
        all: bool,
    },

    /// Delete a reminder
    Rm { id: ReminderId },
}
