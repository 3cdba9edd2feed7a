//! Sandgate Content Settings
//!
//! Per-site rules for cookies and other content types, and the cookie policy
//! built on top of them:
//! - Content setting values and types
//! - Site patterns (`[*.]example.com`, `https://example.com:8443`, ...)
//! - A host content settings map with user and policy rules
//! - Cookie settings, including third-party cookie blocking
//! - Registrable domain (eTLD+1) lookup over a public suffix list

mod cookie_settings;
mod error;
mod map;
mod pattern;
mod registry;
mod setting;
mod site_for_cookies;

pub use cookie_settings::{
    register_cookie_prefs, CookieAccessPolicy, CookieControlsMode, CookieSettings,
    COOKIE_CONTROLS_MODE_PREF,
};
pub use error::{ContentSettingsError, PatternError};
pub use map::{
    ContentSettingRule, ContentSettingsProvider, HostContentSettingsMap, SettingInfo,
    SettingSource,
};
pub use pattern::ContentSettingsPattern;
pub use registry::{get_domain_and_registry, PublicSuffixList, RegistryFilter};
pub use setting::{ContentSetting, ContentSettingsType};
pub use site_for_cookies::SiteForCookies;

pub type Result<T> = std::result::Result<T, ContentSettingsError>;
