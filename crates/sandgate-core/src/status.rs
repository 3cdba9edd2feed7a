//! Snapshot of a profile's Privacy Sandbox state

use sandgate_privacy_sandbox::{prefs, Feature, PrivacySandboxSettings};
use sandgate_storage::PrefService;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrivacySandboxStatus {
    pub enabled: bool,
    pub managed: bool,
    pub restricted: bool,
    pub topics_allowed: bool,
    pub trust_tokens_allowed: bool,
    pub first_party_sets_enabled: bool,
    pub blocked_topics: usize,
    pub fledge_join_blocked_sites: Vec<String>,
    pub topics_data_accessible_since: String,
    pub enabled_features: Vec<Feature>,
}

impl PrivacySandboxStatus {
    pub fn capture(
        settings: &PrivacySandboxSettings,
        prefs: &PrefService,
        enabled_features: Vec<Feature>,
    ) -> Self {
        Self {
            enabled: settings.is_privacy_sandbox_enabled(),
            managed: settings.is_privacy_sandbox_managed(),
            restricted: settings.is_privacy_sandbox_restricted(),
            topics_allowed: settings.is_topics_allowed(),
            trust_tokens_allowed: settings.is_trust_tokens_allowed(),
            first_party_sets_enabled: settings.are_first_party_sets_enabled(),
            blocked_topics: prefs.get_list(prefs::BLOCKED_TOPICS).len(),
            fledge_join_blocked_sites: prefs
                .get_dict(prefs::FLEDGE_JOIN_BLOCKED)
                .keys()
                .cloned()
                .collect(),
            topics_data_accessible_since: settings.topics_data_accessible_since().to_rfc3339(),
            enabled_features,
        }
    }
}
