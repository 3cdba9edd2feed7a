use thiserror::Error;

use crate::setting::{ContentSetting, ContentSettingsType};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("Empty pattern")]
    Empty,

    #[error("Invalid scheme in pattern: {0}")]
    InvalidScheme(String),

    #[error("Invalid host in pattern: {0}")]
    InvalidHost(String),

    #[error("Invalid port in pattern: {0}")]
    InvalidPort(String),

    #[error("Subdomain wildcard cannot be applied to an IP address: {0}")]
    WildcardOnIpAddress(String),
}

#[derive(Error, Debug)]
pub enum ContentSettingsError {
    #[error("Pattern error: {0}")]
    Pattern(#[from] PatternError),

    #[error("Setting {setting} is not valid for {content_type}")]
    InvalidSetting {
        content_type: ContentSettingsType,
        setting: ContentSetting,
    },

    #[error("Public suffix list line {line}: {reason}")]
    SuffixList { line: usize, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] sandgate_storage::StorageError),
}
