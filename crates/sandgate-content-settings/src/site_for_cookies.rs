//! Site-for-cookies
//!
//! The site a request is made on behalf of. A null site is never first party,
//! so any query made with it is treated as a third-party context.

use url::{Origin, Url};

use crate::registry::{get_domain_and_registry, RegistryFilter};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SiteForCookies {
    site: Option<Site>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Site {
    scheme: String,
    registrable_domain: String,
}

impl Site {
    fn of(url: &Url) -> Option<Self> {
        let host = url.host_str()?.to_ascii_lowercase();
        let domain = get_domain_and_registry(&host, RegistryFilter::IncludePrivate);
        Some(Self {
            scheme: normalize_scheme(url.scheme()).to_string(),
            registrable_domain: if domain.is_empty() { host } else { domain },
        })
    }
}

fn normalize_scheme(scheme: &str) -> &str {
    match scheme {
        "ws" => "http",
        "wss" => "https",
        other => other,
    }
}

impl SiteForCookies {
    pub fn null() -> Self {
        Self { site: None }
    }

    pub fn from_url(url: &Url) -> Self {
        Self { site: Site::of(url) }
    }

    pub fn from_origin(origin: &Origin) -> Self {
        match Url::parse(&origin.ascii_serialization()) {
            Ok(url) => Self::from_url(&url),
            Err(_) => Self::null(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.site.is_none()
    }

    pub fn is_first_party(&self, url: &Url) -> bool {
        match (&self.site, Site::of(url)) {
            (Some(site), Some(other)) => *site == other,
            _ => false,
        }
    }

    /// A URL representing the site, used as the top-level URL for rule lookups.
    pub fn representative_url(&self) -> Option<Url> {
        let site = self.site.as_ref()?;
        Url::parse(&format!("{}://{}", site.scheme, site.registrable_domain)).ok()
    }
}
