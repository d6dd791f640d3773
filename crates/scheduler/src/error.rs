use bellwether_core::SettingsError;
use bellwether_notify::NotifyError;
use bellwether_store::StoreError;

/// Errors returned by scheduler operations. They fail the call only.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("job '{0}' is already registered")]
    DuplicateJob(String),

    #[error("no job named '{0}'")]
    UnknownJob(String),

    #[error("invalid trigger: {0}")]
    InvalidTrigger(String),
}

/// Why a job run failed.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("{0}")]
    Failed(String),

    #[error("handler panicked: {0}")]
    Panicked(String),
}
