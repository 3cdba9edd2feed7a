//! Cookie settings
//!
//! Combines per-site cookie rules with the third-party cookie blocking mode
//! stored in preferences.

use sandgate_storage::PrefService;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::{Origin, Url};

use crate::map::HostContentSettingsMap;
use crate::setting::{ContentSetting, ContentSettingsType};
use crate::site_for_cookies::SiteForCookies;
use crate::Result;

pub const COOKIE_CONTROLS_MODE_PREF: &str = "profile.cookie_controls_mode";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CookieControlsMode {
    #[default]
    Off,
    BlockThirdParty,
    /// Block third-party cookies in incognito profiles only
    IncognitoOnly,
}

impl CookieControlsMode {
    pub fn from_pref_value(value: i64) -> Option<Self> {
        match value {
            0 => Some(CookieControlsMode::Off),
            1 => Some(CookieControlsMode::BlockThirdParty),
            2 => Some(CookieControlsMode::IncognitoOnly),
            _ => None,
        }
    }

    pub fn as_pref_value(&self) -> i64 {
        match self {
            CookieControlsMode::Off => 0,
            CookieControlsMode::BlockThirdParty => 1,
            CookieControlsMode::IncognitoOnly => 2,
        }
    }
}

pub fn register_cookie_prefs(prefs: &PrefService) -> sandgate_storage::Result<()> {
    prefs.register_integer_pref(
        COOKIE_CONTROLS_MODE_PREF,
        CookieControlsMode::Off.as_pref_value(),
    )
}

/// Cookie access decisions, as needed by permission checks.
pub trait CookieAccessPolicy: Send + Sync {
    fn get_default_cookie_setting(&self) -> ContentSetting;

    /// Whether `url` may read and write cookies without restriction when
    /// loaded under `site_for_cookies` in a frame tree topped by
    /// `top_frame_origin`.
    fn is_full_cookie_access_allowed(
        &self,
        url: &Url,
        site_for_cookies: &SiteForCookies,
        top_frame_origin: Option<&Origin>,
    ) -> bool;
}

pub struct CookieSettings {
    map: Arc<HostContentSettingsMap>,
    prefs: PrefService,
    is_incognito: bool,
}

impl CookieSettings {
    pub fn new(map: Arc<HostContentSettingsMap>, prefs: PrefService, is_incognito: bool) -> Self {
        Self {
            map,
            prefs,
            is_incognito,
        }
    }

    pub fn cookie_controls_mode(&self) -> CookieControlsMode {
        let raw = self.prefs.get_integer(COOKIE_CONTROLS_MODE_PREF);
        CookieControlsMode::from_pref_value(raw).unwrap_or_else(|| {
            tracing::warn!(value = raw, "Unknown cookie controls mode, treating as off");
            CookieControlsMode::Off
        })
    }

    pub fn set_cookie_controls_mode(&self, mode: CookieControlsMode) -> Result<()> {
        self.prefs
            .set_integer(COOKIE_CONTROLS_MODE_PREF, mode.as_pref_value())?;
        tracing::info!(?mode, "Cookie controls mode changed");
        Ok(())
    }

    pub fn should_block_third_party_cookies(&self) -> bool {
        match self.cookie_controls_mode() {
            CookieControlsMode::Off => false,
            CookieControlsMode::BlockThirdParty => true,
            CookieControlsMode::IncognitoOnly => self.is_incognito,
        }
    }

    pub fn set_cookie_setting(&self, url: &Url, setting: ContentSetting) -> Result<()> {
        self.map
            .set_content_setting_default_scope(url, None, ContentSettingsType::Cookies, setting)
    }

    pub fn is_cookie_session_only(&self, url: &Url) -> bool {
        self.map
            .get_content_setting(url, None, ContentSettingsType::Cookies)
            == ContentSetting::SessionOnly
    }

    /// The cookie setting for `url` in the given context. Third-party
    /// contexts are blocked when third-party cookie blocking is on, unless a
    /// site-specific rule allows them.
    pub fn get_cookie_setting(
        &self,
        url: &Url,
        site_for_cookies: &SiteForCookies,
        top_frame_origin: Option<&Origin>,
    ) -> ContentSetting {
        let first_party_url = top_frame_origin
            .and_then(|origin| Url::parse(&origin.ascii_serialization()).ok())
            .or_else(|| site_for_cookies.representative_url());

        let info = self.map.get_content_setting_with_info(
            url,
            first_party_url.as_ref(),
            ContentSettingsType::Cookies,
        );

        let third_party = !site_for_cookies.is_first_party(url);
        let explicitly_allowed = info.is_site_specific() && info.setting.is_allowed();
        if third_party && !explicitly_allowed && self.should_block_third_party_cookies() {
            return ContentSetting::Block;
        }
        info.setting
    }
}

impl CookieAccessPolicy for CookieSettings {
    fn get_default_cookie_setting(&self) -> ContentSetting {
        self.map
            .get_default_content_setting(ContentSettingsType::Cookies)
    }

    fn is_full_cookie_access_allowed(
        &self,
        url: &Url,
        site_for_cookies: &SiteForCookies,
        top_frame_origin: Option<&Origin>,
    ) -> bool {
        self.get_cookie_setting(url, site_for_cookies, top_frame_origin)
            .is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::ContentSettingsPattern;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn cookie_settings(is_incognito: bool) -> (Arc<HostContentSettingsMap>, CookieSettings) {
        let prefs = PrefService::new();
        register_cookie_prefs(&prefs).unwrap();
        let map = Arc::new(HostContentSettingsMap::new());
        let settings = CookieSettings::new(Arc::clone(&map), prefs, is_incognito);
        (map, settings)
    }

    #[test]
    fn test_first_party_allowed_by_default() {
        let (_, settings) = cookie_settings(false);
        let page = url("https://www.example.com");
        let site = SiteForCookies::from_url(&page);
        assert!(settings.is_full_cookie_access_allowed(&page, &site, Some(&page.origin())));
        assert_eq!(settings.get_default_cookie_setting(), ContentSetting::Allow);
    }

    #[test]
    fn test_third_party_blocking() {
        let (_, settings) = cookie_settings(false);
        let embedded = url("https://ads.test/frame");
        let top = url("https://news.test").origin();

        assert!(settings.is_full_cookie_access_allowed(&embedded, &SiteForCookies::null(), Some(&top)));

        settings
            .set_cookie_controls_mode(CookieControlsMode::BlockThirdParty)
            .unwrap();
        assert!(settings.should_block_third_party_cookies());
        assert!(!settings.is_full_cookie_access_allowed(&embedded, &SiteForCookies::null(), Some(&top)));

        // A site-specific allow rule punches through third-party blocking.
        settings
            .set_cookie_setting(&url("https://ads.test"), ContentSetting::Allow)
            .unwrap();
        assert!(settings.is_full_cookie_access_allowed(&embedded, &SiteForCookies::null(), Some(&top)));
    }

    #[test]
    fn test_incognito_only_mode() {
        let (_, regular) = cookie_settings(false);
        regular
            .set_cookie_controls_mode(CookieControlsMode::IncognitoOnly)
            .unwrap();
        assert!(!regular.should_block_third_party_cookies());

        let (_, incognito) = cookie_settings(true);
        incognito
            .set_cookie_controls_mode(CookieControlsMode::IncognitoOnly)
            .unwrap();
        assert!(incognito.should_block_third_party_cookies());
    }

    #[test]
    fn test_block_rule_and_session_only() {
        let (map, settings) = cookie_settings(false);
        map.set_content_setting_custom_scope(
            ContentSettingsPattern::parse("[*.]tracker.test").unwrap(),
            ContentSettingsPattern::wildcard(),
            ContentSettingsType::Cookies,
            ContentSetting::Block,
        )
        .unwrap();
        let tracker = url("https://cdn.tracker.test");
        assert!(!settings.is_full_cookie_access_allowed(
            &tracker,
            &SiteForCookies::from_url(&tracker),
            None
        ));

        map.set_default_content_setting(ContentSettingsType::Cookies, ContentSetting::SessionOnly)
            .unwrap();
        assert!(settings.is_cookie_session_only(&url("https://other.test")));
        assert!(settings.is_full_cookie_access_allowed(
            &url("https://other.test"),
            &SiteForCookies::null(),
            None
        ));
    }

    #[test]
    fn test_unknown_mode_reads_as_off() {
        let prefs = PrefService::new();
        register_cookie_prefs(&prefs).unwrap();
        prefs.set_integer(COOKIE_CONTROLS_MODE_PREF, 7).unwrap();
        let settings = CookieSettings::new(Arc::new(HostContentSettingsMap::new()), prefs, false);
        assert_eq!(settings.cookie_controls_mode(), CookieControlsMode::Off);
    }
}
