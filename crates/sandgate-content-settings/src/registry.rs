//! Registrable domains (eTLD+1)
//!
//! Rules use the public suffix list text format: one rule per line, `*.` for
//! wildcard rules, `!` for exceptions, `//` for comments. Rules after the
//! `// ===BEGIN PRIVATE DOMAINS===` marker belong to the private section.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::OnceLock;

use crate::error::ContentSettingsError;

const PRIVATE_SECTION_MARKER: &str = "===BEGIN PRIVATE DOMAINS===";

const BUILTIN_RULES: &str = r#"
// ===BEGIN ICANN DOMAINS===
com
net
org
edu
gov
io
dev
app
test
uk
co.uk
org.uk
ac.uk
gov.uk
au
com.au
net.au
org.au
de
fr
jp
co.jp
ne.jp
*.kawasaki.jp
!city.kawasaki.jp
*.ck
!www.ck
// ===END ICANN DOMAINS===
// ===BEGIN PRIVATE DOMAINS===
github.io
blogspot.com
appspot.com
herokuapp.com
pages.dev
// ===END PRIVATE DOMAINS===
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryFilter {
    /// Only ICANN registries count as public suffixes
    ExcludePrivate,
    /// Private registries such as `github.io` count as well
    IncludePrivate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleKind {
    Normal,
    Wildcard,
    Exception,
}

#[derive(Debug, Clone, Copy)]
struct Rule {
    kind: RuleKind,
    private: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PublicSuffixList {
    rules: HashMap<String, Rule>,
}

impl PublicSuffixList {
    pub fn parse(text: &str) -> Result<Self, ContentSettingsError> {
        let mut rules = HashMap::new();
        let mut private = false;

        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if let Some(comment) = line.strip_prefix("//") {
                if comment.contains(PRIVATE_SECTION_MARKER) {
                    private = true;
                }
                continue;
            }
            // Only the first whitespace-separated token is the rule.
            let Some(rule) = line.split_whitespace().next() else {
                continue;
            };

            let (kind, suffix) = if let Some(rest) = rule.strip_prefix('!') {
                (RuleKind::Exception, rest)
            } else if let Some(rest) = rule.strip_prefix("*.") {
                (RuleKind::Wildcard, rest)
            } else {
                (RuleKind::Normal, rule)
            };

            if suffix.is_empty() || suffix.split('.').any(|label| label.is_empty() || label == "*") {
                return Err(ContentSettingsError::SuffixList {
                    line: index + 1,
                    reason: format!("malformed rule {:?}", rule),
                });
            }

            rules.insert(suffix.to_ascii_lowercase(), Rule { kind, private });
        }

        tracing::debug!(rules = rules.len(), "Loaded public suffix list");
        Ok(Self { rules })
    }

    /// The built-in rule set.
    pub fn builtin() -> &'static PublicSuffixList {
        static BUILTIN: OnceLock<PublicSuffixList> = OnceLock::new();
        BUILTIN.get_or_init(|| {
            Self::parse(BUILTIN_RULES).unwrap_or_else(|err| {
                tracing::error!(error = %err, "Built-in public suffix list failed to parse");
                Self::default()
            })
        })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Number of labels in the public suffix of `labels`. Hosts under an
    /// unknown TLD use the TLD itself as the suffix.
    fn suffix_label_count(&self, labels: &[&str], filter: RegistryFilter) -> usize {
        let lookup = |key: &str| {
            self.rules
                .get(key)
                .filter(|rule| filter == RegistryFilter::IncludePrivate || !rule.private)
        };

        let mut longest = 1;
        for start in 0..labels.len() {
            let candidate = labels[start..].join(".");
            let Some(rule) = lookup(&candidate) else {
                continue;
            };
            match rule.kind {
                RuleKind::Exception => return labels.len() - start - 1,
                RuleKind::Normal => longest = longest.max(labels.len() - start),
                // `*.suffix` needs one extra label in front of the suffix.
                RuleKind::Wildcard if start > 0 => {
                    longest = longest.max(labels.len() - start + 1)
                }
                RuleKind::Wildcard => {}
            }
        }
        longest
    }

    /// The registrable domain of `host`, or an empty string when the host is
    /// an IP literal, a public suffix itself, or not a hostname.
    pub fn get_domain_and_registry(&self, host: &str, filter: RegistryFilter) -> String {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        if host.is_empty() || is_ip_literal(&host) {
            return String::new();
        }

        let labels: Vec<&str> = host.split('.').collect();
        if labels.iter().any(|label| label.is_empty()) {
            return String::new();
        }

        let suffix_labels = self.suffix_label_count(&labels, filter);
        if suffix_labels >= labels.len() {
            return String::new();
        }
        labels[labels.len() - suffix_labels - 1..].join(".")
    }
}

fn is_ip_literal(host: &str) -> bool {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .is_ok()
}

/// Registrable domain of `host` under the built-in list.
pub fn get_domain_and_registry(host: &str, filter: RegistryFilter) -> String {
    PublicSuffixList::builtin().get_domain_and_registry(host, filter)
}
