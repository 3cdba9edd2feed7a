//! Browser profile
//!
//! Owns the preference store and the settings services of one profile and
//! builds the Privacy Sandbox gate over them.

use sandgate_content_settings::{
    register_cookie_prefs, ContentSetting, ContentSettingsType, CookieSettings,
    HostContentSettingsMap,
};
use sandgate_privacy_sandbox::{
    prefs::register_profile_prefs, FeatureList, PrivacySandboxDelegate, PrivacySandboxSettings,
};
use sandgate_storage::{Database, PrefService};
use std::sync::Arc;

use crate::config::Config;
use crate::status::PrivacySandboxStatus;
use crate::Result;

/// Answers the gate's questions about the profile from its configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileDelegate {
    incognito: bool,
    restricted: bool,
}

impl ProfileDelegate {
    pub fn new(incognito: bool, restricted: bool) -> Self {
        Self {
            incognito,
            restricted,
        }
    }
}

impl PrivacySandboxDelegate for ProfileDelegate {
    fn is_privacy_sandbox_restricted(&self) -> bool {
        self.restricted
    }

    fn is_incognito_profile(&self) -> bool {
        self.incognito
    }
}

pub struct Profile {
    config: Config,
    db: Option<Database>,
    prefs: PrefService,
    content_settings: Arc<HostContentSettingsMap>,
    cookie_settings: Arc<CookieSettings>,
    features: Arc<FeatureList>,
    privacy_sandbox_settings: Arc<PrivacySandboxSettings>,
}

impl Profile {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let db = match (&config.database_path, config.incognito) {
            (Some(path), false) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                Some(Database::open(path)?)
            }
            _ => None,
        };

        let prefs = match &db {
            Some(db) => PrefService::with_database(db.clone()),
            None => PrefService::new(),
        };
        register_profile_prefs(&prefs)?;
        register_cookie_prefs(&prefs)?;

        let content_settings = Arc::new(HostContentSettingsMap::new());
        if config.cookies_clear_on_exit {
            content_settings
                .set_default_content_setting(ContentSettingsType::Cookies, ContentSetting::SessionOnly)?;
        }

        let cookie_settings = Arc::new(CookieSettings::new(
            Arc::clone(&content_settings),
            prefs.clone(),
            config.incognito,
        ));
        let features = Arc::new(config.feature_list());

        let privacy_sandbox_settings = PrivacySandboxSettings::new(
            Box::new(ProfileDelegate::new(
                config.incognito,
                config.privacy_sandbox_restricted,
            )),
            content_settings.clone(),
            cookie_settings.clone(),
            prefs.clone(),
            Arc::clone(&features),
        )?;

        tracing::info!(
            incognito = config.incognito,
            persistent = db.is_some(),
            features = ?features.enabled_features(),
            "Profile initialized"
        );

        Ok(Self {
            config,
            db,
            prefs,
            content_settings,
            cookie_settings,
            features,
            privacy_sandbox_settings,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_incognito(&self) -> bool {
        self.config.incognito
    }

    pub fn database(&self) -> Option<&Database> {
        self.db.as_ref()
    }

    pub fn prefs(&self) -> &PrefService {
        &self.prefs
    }

    pub fn content_settings(&self) -> &Arc<HostContentSettingsMap> {
        &self.content_settings
    }

    pub fn cookie_settings(&self) -> &Arc<CookieSettings> {
        &self.cookie_settings
    }

    pub fn features(&self) -> &Arc<FeatureList> {
        &self.features
    }

    pub fn privacy_sandbox_settings(&self) -> &Arc<PrivacySandboxSettings> {
        &self.privacy_sandbox_settings
    }

    pub fn privacy_sandbox_status(&self) -> PrivacySandboxStatus {
        PrivacySandboxStatus::capture(
            &self.privacy_sandbox_settings,
            &self.prefs,
            self.features.enabled_features(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandgate_privacy_sandbox::{prefs, CanonicalTopic, Feature};
    use url::Url;

    fn origin(s: &str) -> url::Origin {
        Url::parse(s).unwrap().origin()
    }

    #[test]
    fn test_in_memory_profile() {
        let profile = Profile::new(Config::in_memory()).unwrap();
        assert!(profile.database().is_none());

        let status = profile.privacy_sandbox_status();
        assert!(status.enabled && status.topics_allowed && !status.managed);
        assert!(status.fledge_join_blocked_sites.is_empty());

        let settings = profile.privacy_sandbox_settings();
        assert!(settings.is_privacy_sandbox_enabled());
        assert!(settings.is_topics_allowed());
        assert!(settings.is_attribution_reporting_allowed(
            &origin("https://publisher.test"),
            &origin("https://reporter.test")
        ));
    }

    #[test]
    fn test_settings_persist_across_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path().join("profile"));

        {
            let profile = Profile::new(config.clone()).unwrap();
            let settings = profile.privacy_sandbox_settings();
            settings.set_privacy_sandbox_enabled(false).unwrap();
            settings
                .set_topic_allowed(&CanonicalTopic::new(12, 1), false)
                .unwrap();
        }

        let profile = Profile::new(config).unwrap();
        assert!(profile.database().is_some());
        let settings = profile.privacy_sandbox_settings();
        assert!(!settings.is_privacy_sandbox_enabled());
        assert!(!settings.is_topic_allowed(&CanonicalTopic::new(12, 1)));

        let status = profile.privacy_sandbox_status();
        assert!(!status.enabled);
        assert_eq!(status.blocked_topics, 1);
    }

    #[test]
    fn test_incognito_profile_is_ephemeral_and_gated() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            incognito: true,
            ..Config::new(dir.path().to_path_buf())
        };

        let profile = Profile::new(config).unwrap();
        assert!(profile.is_incognito());
        assert!(profile.database().is_none());
        assert!(!profile.privacy_sandbox_settings().is_privacy_sandbox_enabled());
    }

    #[test]
    fn test_restricted_profile() {
        let config = Config {
            privacy_sandbox_restricted: true,
            ..Config::in_memory()
        };
        let profile = Profile::new(config).unwrap();
        assert!(profile.privacy_sandbox_settings().is_privacy_sandbox_restricted());
        assert!(!profile.privacy_sandbox_settings().is_trust_tokens_allowed());
    }

    #[test]
    fn test_clear_on_exit_resets_topics_window() {
        let config = Config {
            cookies_clear_on_exit: true,
            ..Config::in_memory()
        };
        let profile = Profile::new(config).unwrap();
        assert_ne!(
            profile.prefs().get_time(prefs::TOPICS_DATA_ACCESSIBLE_SINCE),
            sandgate_storage::null_time()
        );
    }

    #[test]
    fn test_features_from_config() {
        let config = Config {
            enabled_features: vec![Feature::PrivacySandboxSettings4],
            ..Config::in_memory()
        };
        let profile = Profile::new(config).unwrap();
        let settings = profile.privacy_sandbox_settings();
        assert!(!settings.is_topics_allowed());

        settings.set_all_privacy_sandbox_allowed_for_testing().unwrap();
        assert!(settings.is_topics_allowed());
        assert!(profile.features().is_enabled(Feature::PrivacySandboxSettings4));
    }
}
