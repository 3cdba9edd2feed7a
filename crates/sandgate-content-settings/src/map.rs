//! Host content settings map
//!
//! Per content type, rules are looked up in order: policy rules, user rules,
//! then the default. Within a layer the most specific matching pattern wins.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

use crate::error::ContentSettingsError;
use crate::pattern::ContentSettingsPattern;
use crate::setting::{ContentSetting, ContentSettingsType};
use crate::Result;

/// Read access to content settings, as needed by permission checks.
pub trait ContentSettingsProvider: Send + Sync {
    /// Effective setting for `primary` embedded under `secondary`. With no
    /// secondary URL only rules with a wildcard secondary pattern apply.
    fn get_content_setting(
        &self,
        primary: &Url,
        secondary: Option<&Url>,
        content_type: ContentSettingsType,
    ) -> ContentSetting;

    fn get_default_content_setting(&self, content_type: ContentSettingsType) -> ContentSetting;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingSource {
    Policy,
    User,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSettingRule {
    pub primary_pattern: ContentSettingsPattern,
    pub secondary_pattern: ContentSettingsPattern,
    pub setting: ContentSetting,
    pub source: SettingSource,
}

impl ContentSettingRule {
    fn matches(&self, primary: &Url, secondary: Option<&Url>) -> bool {
        if !self.primary_pattern.matches(primary) {
            return false;
        }
        match secondary {
            Some(url) => self.secondary_pattern.matches(url),
            None => self.secondary_pattern.is_wildcard(),
        }
    }

    fn is_wildcard(&self) -> bool {
        self.primary_pattern.is_wildcard() && self.secondary_pattern.is_wildcard()
    }
}

/// Result of a lookup together with the rule that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingInfo {
    pub setting: ContentSetting,
    pub source: SettingSource,
    pub primary_pattern: ContentSettingsPattern,
    pub secondary_pattern: ContentSettingsPattern,
}

impl SettingInfo {
    /// Whether the setting came from a site-specific rule rather than a
    /// default or a wildcard rule.
    pub fn is_site_specific(&self) -> bool {
        !(self.primary_pattern.is_wildcard() && self.secondary_pattern.is_wildcard())
    }
}

impl From<&ContentSettingRule> for SettingInfo {
    fn from(rule: &ContentSettingRule) -> Self {
        Self {
            setting: rule.setting,
            source: rule.source,
            primary_pattern: rule.primary_pattern.clone(),
            secondary_pattern: rule.secondary_pattern.clone(),
        }
    }
}

#[derive(Default)]
struct RuleSet {
    rules: HashMap<ContentSettingsType, Vec<ContentSettingRule>>,
}

impl RuleSet {
    /// Insert or replace the rule for a pattern pair. `Default` removes it.
    fn set(&mut self, rule: ContentSettingRule, content_type: ContentSettingsType) {
        let rules = self.rules.entry(content_type).or_default();
        rules.retain(|existing| {
            existing.primary_pattern != rule.primary_pattern
                || existing.secondary_pattern != rule.secondary_pattern
        });
        if rule.setting != ContentSetting::Default {
            rules.push(rule);
            rules.sort_by(|a, b| {
                a.primary_pattern
                    .compare_precedence(&b.primary_pattern)
                    .then_with(|| a.secondary_pattern.compare_precedence(&b.secondary_pattern))
            });
        }
    }

    fn find(
        &self,
        primary: &Url,
        secondary: Option<&Url>,
        content_type: ContentSettingsType,
    ) -> Option<&ContentSettingRule> {
        self.rules
            .get(&content_type)?
            .iter()
            .find(|rule| rule.matches(primary, secondary))
    }

    fn wildcard(&self, content_type: ContentSettingsType) -> Option<&ContentSettingRule> {
        self.rules
            .get(&content_type)?
            .iter()
            .find(|rule| rule.is_wildcard())
    }

    fn all(&self, content_type: ContentSettingsType) -> impl Iterator<Item = &ContentSettingRule> {
        self.rules.get(&content_type).into_iter().flatten()
    }
}

#[derive(Default)]
struct MapState {
    policy: RuleSet,
    user: RuleSet,
    defaults: HashMap<ContentSettingsType, ContentSetting>,
}

impl MapState {
    fn default_setting(&self, content_type: ContentSettingsType) -> ContentSetting {
        if let Some(rule) = self.policy.wildcard(content_type) {
            return rule.setting;
        }
        self.defaults
            .get(&content_type)
            .copied()
            .unwrap_or_else(|| content_type.initial_default())
    }
}

#[derive(Default)]
pub struct HostContentSettingsMap {
    state: RwLock<MapState>,
}

impl HostContentSettingsMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn validate(content_type: ContentSettingsType, setting: ContentSetting) -> Result<()> {
        if setting == ContentSetting::Default || content_type.supports(setting) {
            Ok(())
        } else {
            Err(ContentSettingsError::InvalidSetting {
                content_type,
                setting,
            })
        }
    }

    /// Change the default for `content_type`. `Default` restores the built-in
    /// default.
    pub fn set_default_content_setting(
        &self,
        content_type: ContentSettingsType,
        setting: ContentSetting,
    ) -> Result<()> {
        Self::validate(content_type, setting)?;
        let mut state = self.state.write();
        if setting == ContentSetting::Default {
            state.defaults.remove(&content_type);
        } else {
            state.defaults.insert(content_type, setting);
        }
        tracing::info!(%content_type, %setting, "Default content setting changed");
        Ok(())
    }

    pub fn get_default_content_setting(&self, content_type: ContentSettingsType) -> ContentSetting {
        self.state.read().default_setting(content_type)
    }

    /// Set a user rule for a pattern pair. A wildcard pair changes the
    /// default instead. `Default` removes the rule.
    pub fn set_content_setting_custom_scope(
        &self,
        primary_pattern: ContentSettingsPattern,
        secondary_pattern: ContentSettingsPattern,
        content_type: ContentSettingsType,
        setting: ContentSetting,
    ) -> Result<()> {
        if primary_pattern.is_wildcard() && secondary_pattern.is_wildcard() {
            return self.set_default_content_setting(content_type, setting);
        }
        Self::validate(content_type, setting)?;

        tracing::debug!(
            primary = %primary_pattern,
            secondary = %secondary_pattern,
            %content_type,
            %setting,
            "Content setting rule changed"
        );
        self.state.write().user.set(
            ContentSettingRule {
                primary_pattern,
                secondary_pattern,
                setting,
                source: SettingSource::User,
            },
            content_type,
        );
        Ok(())
    }

    /// Set a user rule scoped to the origin of `primary_url` (and of
    /// `secondary_url`, if given).
    pub fn set_content_setting_default_scope(
        &self,
        primary_url: &Url,
        secondary_url: Option<&Url>,
        content_type: ContentSettingsType,
        setting: ContentSetting,
    ) -> Result<()> {
        let primary = ContentSettingsPattern::from_url(primary_url)?;
        let secondary = match secondary_url {
            Some(url) => ContentSettingsPattern::from_url(url)?,
            None => ContentSettingsPattern::wildcard(),
        };
        self.set_content_setting_custom_scope(primary, secondary, content_type, setting)
    }

    /// Set a policy rule. Policy rules take precedence over user rules, and a
    /// wildcard policy rule overrides the default.
    pub fn set_policy_content_setting(
        &self,
        primary_pattern: ContentSettingsPattern,
        secondary_pattern: ContentSettingsPattern,
        content_type: ContentSettingsType,
        setting: ContentSetting,
    ) -> Result<()> {
        Self::validate(content_type, setting)?;
        tracing::info!(
            primary = %primary_pattern,
            secondary = %secondary_pattern,
            %content_type,
            %setting,
            "Policy content setting applied"
        );
        self.state.write().policy.set(
            ContentSettingRule {
                primary_pattern,
                secondary_pattern,
                setting,
                source: SettingSource::Policy,
            },
            content_type,
        );
        Ok(())
    }

    pub fn get_content_setting(
        &self,
        primary: &Url,
        secondary: Option<&Url>,
        content_type: ContentSettingsType,
    ) -> ContentSetting {
        self.get_content_setting_with_info(primary, secondary, content_type)
            .setting
    }

    pub fn get_content_setting_with_info(
        &self,
        primary: &Url,
        secondary: Option<&Url>,
        content_type: ContentSettingsType,
    ) -> SettingInfo {
        let state = self.state.read();
        if let Some(rule) = state
            .policy
            .find(primary, secondary, content_type)
            .or_else(|| state.user.find(primary, secondary, content_type))
        {
            return rule.into();
        }

        SettingInfo {
            setting: state.default_setting(content_type),
            source: SettingSource::Default,
            primary_pattern: ContentSettingsPattern::wildcard(),
            secondary_pattern: ContentSettingsPattern::wildcard(),
        }
    }

    /// All rules for `content_type` in lookup order, ending with the default.
    pub fn get_settings_for_one_type(
        &self,
        content_type: ContentSettingsType,
    ) -> Vec<ContentSettingRule> {
        let state = self.state.read();
        let mut rules: Vec<ContentSettingRule> = state
            .policy
            .all(content_type)
            .chain(state.user.all(content_type))
            .cloned()
            .collect();
        rules.push(ContentSettingRule {
            primary_pattern: ContentSettingsPattern::wildcard(),
            secondary_pattern: ContentSettingsPattern::wildcard(),
            setting: state.default_setting(content_type),
            source: SettingSource::Default,
        });
        rules
    }

    /// Remove every user rule for `content_type`. Policy rules and the
    /// default are kept.
    pub fn clear_settings_for_one_type(&self, content_type: ContentSettingsType) {
        let removed = self
            .state
            .write()
            .user
            .rules
            .remove(&content_type)
            .map_or(0, |rules| rules.len());
        tracing::info!(%content_type, removed, "Cleared content setting rules");
    }
}

impl ContentSettingsProvider for HostContentSettingsMap {
    fn get_content_setting(
        &self,
        primary: &Url,
        secondary: Option<&Url>,
        content_type: ContentSettingsType,
    ) -> ContentSetting {
        HostContentSettingsMap::get_content_setting(self, primary, secondary, content_type)
    }

    fn get_default_content_setting(&self, content_type: ContentSettingsType) -> ContentSetting {
        HostContentSettingsMap::get_default_content_setting(self, content_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn pattern(s: &str) -> ContentSettingsPattern {
        ContentSettingsPattern::parse(s).unwrap()
    }

    #[test]
    fn test_defaults() {
        let map = HostContentSettingsMap::new();
        assert_eq!(
            map.get_default_content_setting(ContentSettingsType::Cookies),
            ContentSetting::Allow
        );
        assert_eq!(
            map.get_content_setting(&url("https://a.test"), None, ContentSettingsType::Popups),
            ContentSetting::Block
        );

        map.set_default_content_setting(ContentSettingsType::Cookies, ContentSetting::SessionOnly)
            .unwrap();
        assert_eq!(
            map.get_default_content_setting(ContentSettingsType::Cookies),
            ContentSetting::SessionOnly
        );

        map.set_default_content_setting(ContentSettingsType::Cookies, ContentSetting::Default)
            .unwrap();
        assert_eq!(
            map.get_default_content_setting(ContentSettingsType::Cookies),
            ContentSetting::Allow
        );
    }

    #[test]
    fn test_invalid_setting_rejected() {
        let map = HostContentSettingsMap::new();
        let err = map
            .set_default_content_setting(ContentSettingsType::Cookies, ContentSetting::Ask)
            .unwrap_err();
        assert!(matches!(err, ContentSettingsError::InvalidSetting { .. }));
    }

    #[test]
    fn test_most_specific_rule_wins() {
        let map = HostContentSettingsMap::new();
        map.set_content_setting_custom_scope(
            pattern("[*.]example.com"),
            ContentSettingsPattern::wildcard(),
            ContentSettingsType::Cookies,
            ContentSetting::Block,
        )
        .unwrap();
        map.set_content_setting_custom_scope(
            pattern("good.example.com"),
            ContentSettingsPattern::wildcard(),
            ContentSettingsType::Cookies,
            ContentSetting::Allow,
        )
        .unwrap();

        let cookies = ContentSettingsType::Cookies;
        assert_eq!(
            map.get_content_setting(&url("https://bad.example.com"), None, cookies),
            ContentSetting::Block
        );
        assert_eq!(
            map.get_content_setting(&url("https://good.example.com"), None, cookies),
            ContentSetting::Allow
        );
        assert_eq!(
            map.get_content_setting(&url("https://other.test"), None, cookies),
            ContentSetting::Allow
        );
    }

    #[test]
    fn test_secondary_pattern_needs_secondary_url() {
        let map = HostContentSettingsMap::new();
        map.set_content_setting_default_scope(
            &url("https://embedded.test"),
            Some(&url("https://top.test")),
            ContentSettingsType::Cookies,
            ContentSetting::Block,
        )
        .unwrap();

        let embedded = url("https://embedded.test/frame");
        let cookies = ContentSettingsType::Cookies;
        assert_eq!(
            map.get_content_setting(&embedded, Some(&url("https://top.test/")), cookies),
            ContentSetting::Block
        );
        assert_eq!(map.get_content_setting(&embedded, None, cookies), ContentSetting::Allow);
    }

    #[test]
    fn test_policy_overrides_user() {
        let map = HostContentSettingsMap::new();
        let cookies = ContentSettingsType::Cookies;
        map.set_content_setting_custom_scope(
            pattern("a.test"),
            ContentSettingsPattern::wildcard(),
            cookies,
            ContentSetting::Allow,
        )
        .unwrap();
        map.set_policy_content_setting(
            ContentSettingsPattern::wildcard(),
            ContentSettingsPattern::wildcard(),
            cookies,
            ContentSetting::Block,
        )
        .unwrap();

        let info = map.get_content_setting_with_info(&url("https://a.test"), None, cookies);
        assert_eq!(info.setting, ContentSetting::Block);
        assert_eq!(info.source, SettingSource::Policy);
        assert!(!info.is_site_specific());
        assert_eq!(map.get_default_content_setting(cookies), ContentSetting::Block);
    }

    #[test]
    fn test_rule_listing_and_clearing() {
        let map = HostContentSettingsMap::new();
        let cookies = ContentSettingsType::Cookies;
        map.set_content_setting_custom_scope(
            pattern("a.test"),
            ContentSettingsPattern::wildcard(),
            cookies,
            ContentSetting::Block,
        )
        .unwrap();
        // Same pattern pair replaces the earlier rule.
        map.set_content_setting_custom_scope(
            pattern("a.test"),
            ContentSettingsPattern::wildcard(),
            cookies,
            ContentSetting::SessionOnly,
        )
        .unwrap();

        let rules = map.get_settings_for_one_type(cookies);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].setting, ContentSetting::SessionOnly);
        assert_eq!(rules[1].source, SettingSource::Default);

        map.clear_settings_for_one_type(cookies);
        assert_eq!(map.get_settings_for_one_type(cookies).len(), 1);
    }
}
