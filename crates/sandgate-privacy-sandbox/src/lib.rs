//! Sandgate Privacy Sandbox
//!
//! The permission gate for Privacy Sandbox APIs. Each check combines the
//! profile's Privacy Sandbox preferences, cookie settings and the embedder's
//! view of the profile (incognito, restricted) into an allow/deny answer.
//!
//! Gated capabilities:
//! - Topics
//! - Protected Audience (Fledge) joining and auctions
//! - Attribution Reporting
//! - Shared Storage
//! - Private Aggregation
//! - Trust Tokens

mod clock;
mod delegate;
mod error;
mod features;
mod observer;
pub mod prefs;
mod settings;
mod topic;

pub use clock::{Clock, ManualClock, SystemClock};
pub use delegate::PrivacySandboxDelegate;
pub use error::SettingsError;
pub use features::{Feature, FeatureList};
pub use observer::PrivacySandboxObserver;
pub use settings::PrivacySandboxSettings;
pub use topic::CanonicalTopic;

pub type Result<T> = std::result::Result<T, SettingsError>;
