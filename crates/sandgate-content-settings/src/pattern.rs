//! Content settings patterns
//!
//! Accepted forms:
//! - `*` matches every URL
//! - `example.com` matches that host exactly, any scheme and port
//! - `[*.]example.com` matches the host and all of its subdomains
//! - `https://[*.]example.com:8443` restricts scheme and port
//! - `1.2.3.4`, `[::1]` match an IP literal exactly
//!
//! Paths are ignored. `[*.]` in front of an IP literal is rejected.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use url::{Host, Url};

use crate::error::PatternError;

const SUBDOMAIN_WILDCARD: &str = "[*.]";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum HostPart {
    Any,
    Exact(String),
    WithSubdomains(String),
}

impl HostPart {
    fn rank(&self) -> u8 {
        match self {
            HostPart::Exact(_) => 2,
            HostPart::WithSubdomains(_) => 1,
            HostPart::Any => 0,
        }
    }

    fn label_count(&self) -> usize {
        match self {
            HostPart::Exact(host) | HostPart::WithSubdomains(host) => host.split('.').count(),
            HostPart::Any => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentSettingsPattern {
    scheme: Option<String>,
    host: HostPart,
    port: Option<u16>,
}

impl ContentSettingsPattern {
    /// The pattern matching every URL.
    pub fn wildcard() -> Self {
        Self {
            scheme: None,
            host: HostPart::Any,
            port: None,
        }
    }

    pub fn parse(input: &str) -> Result<Self, PatternError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(PatternError::Empty);
        }
        if input == "*" {
            return Ok(Self::wildcard());
        }

        let (scheme, rest) = match input.split_once("://") {
            Some((scheme, rest)) => (parse_scheme(scheme)?, rest),
            None => (None, input),
        };

        // Everything from the first '/' on is a path.
        let authority = match rest.find('/') {
            Some(index) => &rest[..index],
            None => rest,
        };

        let (with_subdomains, authority) = match authority.strip_prefix(SUBDOMAIN_WILDCARD) {
            Some(stripped) => (true, stripped),
            None => (false, authority),
        };

        let (host, port) = split_host_port(authority)?;
        let port = match port {
            None | Some("*") => None,
            Some(raw) => Some(
                raw.parse::<u16>()
                    .map_err(|_| PatternError::InvalidPort(raw.to_string()))?,
            ),
        };

        let host = if host == "*" && !with_subdomains {
            HostPart::Any
        } else {
            match Host::parse(host) {
                Ok(Host::Domain(domain)) if with_subdomains => HostPart::WithSubdomains(domain),
                Ok(Host::Domain(domain)) => HostPart::Exact(domain),
                Ok(ip) if with_subdomains => {
                    return Err(PatternError::WildcardOnIpAddress(ip.to_string()))
                }
                Ok(ip) => HostPart::Exact(ip.to_string()),
                Err(_) => return Err(PatternError::InvalidHost(host.to_string())),
            }
        };

        Ok(Self { scheme, host, port })
    }

    /// A pattern matching exactly the origin of `url`.
    pub fn from_url(url: &Url) -> Result<Self, PatternError> {
        let host = url
            .host_str()
            .ok_or_else(|| PatternError::InvalidHost(url.as_str().to_string()))?;
        Ok(Self {
            scheme: Some(url.scheme().to_string()),
            host: HostPart::Exact(host.to_ascii_lowercase()),
            port: url.port_or_known_default(),
        })
    }

    pub fn is_wildcard(&self) -> bool {
        self.scheme.is_none() && self.host == HostPart::Any && self.port.is_none()
    }

    pub fn matches(&self, url: &Url) -> bool {
        if self.is_wildcard() {
            return true;
        }

        if let Some(scheme) = &self.scheme {
            if url.scheme() != scheme {
                return false;
            }
        }

        if let Some(port) = self.port {
            if url.port_or_known_default() != Some(port) {
                return false;
            }
        }

        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        match &self.host {
            HostPart::Any => true,
            HostPart::Exact(expected) => host == *expected,
            HostPart::WithSubdomains(domain) => {
                host == *domain
                    || host
                        .strip_suffix(domain.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            }
        }
    }

    /// Orders patterns so that the more specific one comes first. Host
    /// specificity dominates, then port, then scheme.
    pub fn compare_precedence(&self, other: &Self) -> Ordering {
        let key = |pattern: &Self| {
            (
                pattern.host.rank(),
                pattern.host.label_count(),
                pattern.port.is_some(),
                pattern.scheme.is_some(),
            )
        };
        key(other)
            .cmp(&key(self))
            .then_with(|| self.to_string().cmp(&other.to_string()))
    }
}

fn parse_scheme(scheme: &str) -> Result<Option<String>, PatternError> {
    if scheme == "*" {
        return Ok(None);
    }
    let valid = scheme.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !valid {
        return Err(PatternError::InvalidScheme(scheme.to_string()));
    }
    Ok(Some(scheme.to_ascii_lowercase()))
}

fn split_host_port(authority: &str) -> Result<(&str, Option<&str>), PatternError> {
    if authority.starts_with('[') {
        let close = authority
            .find(']')
            .ok_or_else(|| PatternError::InvalidHost(authority.to_string()))?;
        let (host, rest) = authority.split_at(close + 1);
        return match rest.strip_prefix(':') {
            Some(port) => Ok((host, Some(port))),
            None if rest.is_empty() => Ok((host, None)),
            None => Err(PatternError::InvalidHost(authority.to_string())),
        };
    }

    Ok(match authority.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (authority, None),
    })
}

impl fmt::Display for ContentSettingsPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_wildcard() {
            return f.write_str("*");
        }
        match (&self.scheme, self.port) {
            (Some(scheme), _) => write!(f, "{}://", scheme)?,
            (None, Some(_)) => f.write_str("*://")?,
            (None, None) => {}
        }
        match &self.host {
            HostPart::Any => f.write_str("*")?,
            HostPart::Exact(host) => f.write_str(host)?,
            HostPart::WithSubdomains(domain) => write!(f, "{}{}", SUBDOMAIN_WILDCARD, domain)?,
        }
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        Ok(())
    }
}

impl FromStr for ContentSettingsPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContentSettingsPattern {
    type Error = PatternError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentSettingsPattern> for String {
    fn from(pattern: ContentSettingsPattern) -> Self {
        pattern.to_string()
    }
}
