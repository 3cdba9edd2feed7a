//! Sandgate Core
//!
//! Wires a browser profile together: preferences, content settings, cookie
//! settings and the Privacy Sandbox permission gate built on top of them.

mod config;
mod error;
mod profile;
mod status;

pub use config::Config;
pub use error::CoreError;
pub use profile::{Profile, ProfileDelegate};
pub use status::PrivacySandboxStatus;

// Re-export core components
pub use sandgate_content_settings::{
    ContentSetting, ContentSettingsPattern, ContentSettingsType, CookieControlsMode,
    CookieSettings, HostContentSettingsMap,
};
pub use sandgate_privacy_sandbox::{
    CanonicalTopic, Feature, FeatureList, PrivacySandboxObserver, PrivacySandboxSettings,
    SettingsError,
};
pub use sandgate_storage::{Database, PrefService, StorageError};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
