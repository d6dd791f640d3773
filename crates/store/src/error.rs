use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn task_not_found(id: i64) -> Self {
        Self::NotFound { kind: "task", id }
    }

    pub fn reminder_not_found(id: i64) -> Self {
        Self::NotFound {
            kind: "reminder",
            id,
        }
    }
}
