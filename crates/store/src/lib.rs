//! Task and reminder persistence.
//!
//! `TaskStore` is the contract the scheduler and CLI program against.
//! `MemoryStore` keeps everything in process; `SqliteStore` persists to a
//! SQLite database and applies the workspace migrations on open.

pub mod error;
pub mod memory;
pub mod sqlite;
pub mod traits;

#[cfg(test)]
mod contract;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{TaskFilter, TaskStore};
