//! Runtime feature switches

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::SettingsError;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    /// Per-API (M1) preferences replace the single Privacy Sandbox toggle
    PrivacySandboxSettings4,
    /// Force every API on for local testing, unless the profile is
    /// incognito or restricted
    OverridePrivacySandboxSettingsLocalTesting,
    FirstPartySets,
}

impl Feature {
    pub const ALL: [Feature; 3] = [
        Feature::PrivacySandboxSettings4,
        Feature::OverridePrivacySandboxSettingsLocalTesting,
        Feature::FirstPartySets,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Feature::PrivacySandboxSettings4 => "PrivacySandboxSettings4",
            Feature::OverridePrivacySandboxSettingsLocalTesting => {
                "OverridePrivacySandboxSettingsLocalTesting"
            }
            Feature::FirstPartySets => "FirstPartySets",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self> {
        Feature::ALL
            .into_iter()
            .find(|feature| feature.name() == s)
            .ok_or_else(|| SettingsError::UnknownFeature(s.to_string()))
    }
}

/// The set of enabled features. Everything starts disabled.
#[derive(Debug, Default)]
pub struct FeatureList {
    enabled: RwLock<HashSet<Feature>>,
}

impl FeatureList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_features<I>(features: I) -> Self
    where
        I: IntoIterator<Item = Feature>,
    {
        Self {
            enabled: RwLock::new(features.into_iter().collect()),
        }
    }

    /// Parse a comma separated list such as `"FirstPartySets,PrivacySandboxSettings4"`.
    pub fn parse(list: &str) -> Result<Self> {
        let features = list
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(Feature::from_str)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::with_features(features))
    }

    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.enabled.read().contains(&feature)
    }

    pub fn enable(&self, feature: Feature) {
        if self.enabled.write().insert(feature) {
            tracing::info!(%feature, "Feature enabled");
        }
    }

    pub fn disable(&self, feature: Feature) {
        if self.enabled.write().remove(&feature) {
            tracing::info!(%feature, "Feature disabled");
        }
    }

    pub fn enabled_features(&self) -> Vec<Feature> {
        let enabled = self.enabled.read();
        Feature::ALL
            .into_iter()
            .filter(|feature| enabled.contains(feature))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feature_list() {
        let list = FeatureList::parse(" FirstPartySets, PrivacySandboxSettings4 ,").unwrap();
        assert!(list.is_enabled(Feature::FirstPartySets));
        assert!(list.is_enabled(Feature::PrivacySandboxSettings4));
        assert!(!list.is_enabled(Feature::OverridePrivacySandboxSettingsLocalTesting));
        assert_eq!(
            list.enabled_features(),
            vec![Feature::PrivacySandboxSettings4, Feature::FirstPartySets]
        );

        assert!(FeatureList::parse("").unwrap().enabled_features().is_empty());
    }

    #[test]
    fn test_unknown_feature() {
        let err = FeatureList::parse("FirstPartySets,Bogus").unwrap_err();
        assert!(matches!(err, SettingsError::UnknownFeature(name) if name == "Bogus"));
    }

    #[test]
    fn test_toggle() {
        let list = FeatureList::new();
        list.enable(Feature::FirstPartySets);
        assert!(list.is_enabled(Feature::FirstPartySets));
        list.disable(Feature::FirstPartySets);
        assert!(!list.is_enabled(Feature::FirstPartySets));
    }

    #[test]
    fn test_name_round_trip() {
        for feature in Feature::ALL {
            assert_eq!(feature.name().parse::<Feature>().unwrap(), feature);
        }
    }
}
