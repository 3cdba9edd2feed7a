//! Storage error types

use thiserror::Error;

use crate::prefs::PrefKind;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Preference not registered: {0}")]
    UnregisteredPref(String),

    #[error("Preference {name} expects a {expected} value")]
    TypeMismatch { name: String, expected: PrefKind },

    #[error("Preference {0} registered twice")]
    DuplicateRegistration(String),
}
