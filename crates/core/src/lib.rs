pub mod config;
pub mod error;
pub mod model;
pub mod recurrence;
pub mod time;

pub use config::Settings;
pub use error::*;
pub use model::*;
