//! Content setting values and types

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSetting {
    /// No explicit value; defer to the next layer
    Default,
    Allow,
    Block,
    Ask,
    /// Allowed until the session ends ("clear on exit" for cookies)
    SessionOnly,
}

impl ContentSetting {
    pub fn is_allowed(&self) -> bool {
        matches!(self, ContentSetting::Allow | ContentSetting::SessionOnly)
    }
}

impl fmt::Display for ContentSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContentSetting::Default => "default",
            ContentSetting::Allow => "allow",
            ContentSetting::Block => "block",
            ContentSetting::Ask => "ask",
            ContentSetting::SessionOnly => "session_only",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSettingsType {
    Cookies,
    Javascript,
    Popups,
}

impl ContentSettingsType {
    pub const ALL: [ContentSettingsType; 3] = [
        ContentSettingsType::Cookies,
        ContentSettingsType::Javascript,
        ContentSettingsType::Popups,
    ];

    /// Built-in default used until the default is changed
    pub fn initial_default(&self) -> ContentSetting {
        match self {
            ContentSettingsType::Cookies => ContentSetting::Allow,
            ContentSettingsType::Javascript => ContentSetting::Allow,
            ContentSettingsType::Popups => ContentSetting::Block,
        }
    }

    pub fn supports(&self, setting: ContentSetting) -> bool {
        match (self, setting) {
            (_, ContentSetting::Default) => false,
            (ContentSettingsType::Cookies, ContentSetting::Ask) => false,
            (ContentSettingsType::Cookies, _) => true,
            (_, ContentSetting::Allow | ContentSetting::Block) => true,
            (_, ContentSetting::Ask | ContentSetting::SessionOnly) => false,
        }
    }
}

impl fmt::Display for ContentSettingsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContentSettingsType::Cookies => "cookies",
            ContentSettingsType::Javascript => "javascript",
            ContentSettingsType::Popups => "popups",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_only_is_cookie_specific() {
        assert!(ContentSettingsType::Cookies.supports(ContentSetting::SessionOnly));
        assert!(!ContentSettingsType::Popups.supports(ContentSetting::SessionOnly));
        assert!(!ContentSettingsType::Cookies.supports(ContentSetting::Ask));
        assert!(!ContentSettingsType::Javascript.supports(ContentSetting::Default));
    }

    #[test]
    fn test_allowed_settings() {
        assert!(ContentSetting::SessionOnly.is_allowed());
        assert!(!ContentSetting::Block.is_allowed());
        assert_eq!(
            serde_json::to_string(&ContentSetting::SessionOnly).unwrap(),
            "\"session_only\""
        );
    }
}
