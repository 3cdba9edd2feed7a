//! Preference names and registration

use sandgate_storage::{null_time, PrefService};

pub const APIS_ENABLED_V2: &str = "privacy_sandbox.apis_enabled_v2";
pub const BLOCKED_TOPICS: &str = "privacy_sandbox.blocked_topics";
pub const FLEDGE_JOIN_BLOCKED: &str = "privacy_sandbox.fledge_join_blocked";
pub const TOPICS_DATA_ACCESSIBLE_SINCE: &str = "privacy_sandbox.topics_data_accessible_since";
pub const M1_TOPICS_ENABLED: &str = "privacy_sandbox.m1.topics_enabled";
pub const M1_FLEDGE_ENABLED: &str = "privacy_sandbox.m1.fledge_enabled";
pub const M1_AD_MEASUREMENT_ENABLED: &str = "privacy_sandbox.m1.ad_measurement_enabled";
pub const FIRST_PARTY_SETS_ENABLED: &str = "privacy_sandbox.first_party_sets_enabled";

/// Keys of a blocked-topics list entry.
pub(crate) const BLOCKED_TOPICS_TOPIC_KEY: &str = "topic";
pub(crate) const BLOCKED_TOPICS_BLOCKED_ON_KEY: &str = "blockedOn";

pub fn register_profile_prefs(prefs: &PrefService) -> sandgate_storage::Result<()> {
    prefs.register_boolean_pref(APIS_ENABLED_V2, true)?;
    prefs.register_list_pref(BLOCKED_TOPICS)?;
    prefs.register_dictionary_pref(FLEDGE_JOIN_BLOCKED)?;
    prefs.register_time_pref(TOPICS_DATA_ACCESSIBLE_SINCE, null_time())?;
    prefs.register_boolean_pref(M1_TOPICS_ENABLED, false)?;
    prefs.register_boolean_pref(M1_FLEDGE_ENABLED, false)?;
    prefs.register_boolean_pref(M1_AD_MEASUREMENT_ENABLED, false)?;
    prefs.register_boolean_pref(FIRST_PARTY_SETS_ENABLED, true)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registers_defaults() {
        let prefs = PrefService::new();
        register_profile_prefs(&prefs).unwrap();

        assert!(prefs.get_boolean(APIS_ENABLED_V2));
        assert!(prefs.get_boolean(FIRST_PARTY_SETS_ENABLED));
        assert!(!prefs.get_boolean(M1_TOPICS_ENABLED));
        assert!(prefs.get_list(BLOCKED_TOPICS).is_empty());
        assert!(prefs.get_dict(FLEDGE_JOIN_BLOCKED).is_empty());
        assert_eq!(prefs.get_time(TOPICS_DATA_ACCESSIBLE_SINCE), null_time());
    }
}
