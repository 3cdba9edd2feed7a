//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] sandgate_storage::StorageError),

    #[error("Content settings error: {0}")]
    ContentSettings(#[from] sandgate_content_settings::ContentSettingsError),

    #[error("Privacy Sandbox error: {0}")]
    PrivacySandbox(#[from] sandgate_privacy_sandbox::SettingsError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
