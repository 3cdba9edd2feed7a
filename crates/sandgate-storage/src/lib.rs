//! Sandgate Storage Layer
//!
//! SQLite-backed persistence for profile preferences, plus the in-memory
//! `PrefService` that fronts it. Preference writes are committed to the
//! database as soon as they land in memory.

mod database;
mod error;
mod migrations;
mod prefs;
mod time;

pub use database::Database;
pub use error::StorageError;
pub use prefs::{PrefChangeRegistrar, PrefKind, PrefObserverId, PrefService};
pub use time::{max_time, null_time, time_to_value, value_to_time};

pub type Result<T> = std::result::Result<T, StorageError>;
