//! Privacy Sandbox permission gate
//!
//! Every check is a synchronous read of preference and cookie state. Two
//! generations of settings coexist:
//! - legacy: a single `apis_enabled_v2` toggle, and every per-context check
//!   also requires full (third-party) cookie access for the context
//! - `PrivacySandboxSettings4`: per-API (M1) toggles, and per-context checks
//!   only require that site data is not blocked for the site in question
//!
//! Blocked topics and blocked Fledge join sites are kept in preferences with
//! the time they were blocked, so that time-ranged data deletion can remove
//! them.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sandgate_content_settings::{
    get_domain_and_registry, ContentSetting, ContentSettingsPattern, ContentSettingsProvider,
    ContentSettingsType, CookieAccessPolicy, CookieControlsMode, RegistryFilter, SiteForCookies,
    COOKIE_CONTROLS_MODE_PREF,
};
use sandgate_storage::{max_time, null_time, time_to_value, value_to_time, PrefChangeRegistrar, PrefService};
use serde_json::{json, Value};
use std::sync::{Arc, Weak};
use url::{Host, Origin, Url};

use crate::clock::{Clock, SystemClock};
use crate::delegate::PrivacySandboxDelegate;
use crate::error::SettingsError;
use crate::features::{Feature, FeatureList};
use crate::observer::PrivacySandboxObserver;
use crate::prefs::{self, BLOCKED_TOPICS_BLOCKED_ON_KEY, BLOCKED_TOPICS_TOPIC_KEY};
use crate::topic::CanonicalTopic;
use crate::Result;

/// APIs with their own preference under `PrivacySandboxSettings4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum M1Api {
    Topics,
    Fledge,
    AdMeasurement,
}

impl M1Api {
    fn pref_name(&self) -> &'static str {
        match self {
            M1Api::Topics => prefs::M1_TOPICS_ENABLED,
            M1Api::Fledge => prefs::M1_FLEDGE_ENABLED,
            M1Api::AdMeasurement => prefs::M1_AD_MEASUREMENT_ENABLED,
        }
    }
}

pub struct PrivacySandboxSettings {
    delegate: RwLock<Box<dyn PrivacySandboxDelegate>>,
    content_settings: Arc<dyn ContentSettingsProvider>,
    cookie_settings: Arc<dyn CookieAccessPolicy>,
    prefs: PrefService,
    features: Arc<FeatureList>,
    clock: Arc<dyn Clock>,
    observers: RwLock<Vec<Weak<dyn PrivacySandboxObserver>>>,
    _pref_registrar: PrefChangeRegistrar,
}

impl PrivacySandboxSettings {
    pub fn new(
        delegate: Box<dyn PrivacySandboxDelegate>,
        content_settings: Arc<dyn ContentSettingsProvider>,
        cookie_settings: Arc<dyn CookieAccessPolicy>,
        prefs: PrefService,
        features: Arc<FeatureList>,
    ) -> Result<Arc<Self>> {
        Self::with_clock(
            delegate,
            content_settings,
            cookie_settings,
            prefs,
            features,
            Arc::new(SystemClock),
        )
    }

    pub fn with_clock(
        delegate: Box<dyn PrivacySandboxDelegate>,
        content_settings: Arc<dyn ContentSettingsProvider>,
        cookie_settings: Arc<dyn CookieAccessPolicy>,
        prefs: PrefService,
        features: Arc<FeatureList>,
        clock: Arc<dyn Clock>,
    ) -> Result<Arc<Self>> {
        let settings = Arc::new_cyclic(|this: &Weak<Self>| {
            let mut registrar = PrefChangeRegistrar::new(&prefs);

            let gate = this.clone();
            registrar.add(prefs::APIS_ENABLED_V2, move |_| {
                if let Some(gate) = gate.upgrade() {
                    gate.on_privacy_sandbox_pref_changed();
                }
            });

            let gate = this.clone();
            registrar.add(prefs::FIRST_PARTY_SETS_ENABLED, move |_| {
                if let Some(gate) = gate.upgrade() {
                    gate.on_first_party_sets_enabled_pref_changed();
                }
            });

            Self {
                delegate: RwLock::new(delegate),
                content_settings,
                cookie_settings,
                prefs,
                features,
                clock,
                observers: RwLock::new(Vec::new()),
                _pref_registrar: registrar,
            }
        });

        // Cookies set to clear on exit were deleted when the profile last
        // shut down; nothing could have been written since.
        if settings
            .content_settings
            .get_default_content_setting(ContentSettingsType::Cookies)
            == ContentSetting::SessionOnly
        {
            tracing::info!("Cookies clear on exit, treating startup as a cookie deletion");
            settings.on_cookies_cleared()?;
        }

        Ok(settings)
    }

    // === Topics ===

    pub fn is_topics_allowed(&self) -> bool {
        if self.features.is_enabled(Feature::PrivacySandboxSettings4) {
            return self.is_m1_api_enabled(M1Api::Topics);
        }

        // Topics are computed without any per-context check, so blocked
        // third-party cookies disable them entirely.
        let cookie_controls_mode =
            CookieControlsMode::from_pref_value(self.prefs.get_integer(COOKIE_CONTROLS_MODE_PREF));
        let third_party_cookies_blocked = self.cookie_settings.get_default_cookie_setting()
            == ContentSetting::Block
            || cookie_controls_mode == Some(CookieControlsMode::BlockThirdParty);

        self.is_privacy_sandbox_enabled() && !third_party_cookies_blocked
    }

    pub fn is_topics_allowed_for_context(&self, url: &Url, top_frame_origin: Option<&Origin>) -> bool {
        if self.features.is_enabled(Feature::PrivacySandboxSettings4) {
            return self.is_topics_allowed() && self.is_site_data_allowed(url);
        }

        self.is_topics_allowed() && self.is_privacy_sandbox_enabled_for_context(url, top_frame_origin)
    }

    pub fn is_topic_allowed(&self, topic: &CanonicalTopic) -> bool {
        self.prefs
            .get_list(prefs::BLOCKED_TOPICS)
            .iter()
            .filter_map(blocked_topic)
            .all(|blocked| blocked != *topic)
    }

    /// Block or unblock `topic`. Blocking an already blocked topic refreshes
    /// its block time.
    pub fn set_topic_allowed(&self, topic: &CanonicalTopic, allowed: bool) -> Result<()> {
        let now = self.clock.now();
        self.prefs.update_list(prefs::BLOCKED_TOPICS, |entries| {
            entries.retain(|entry| blocked_topic(entry) != Some(*topic));
            if !allowed {
                entries.push(json!({
                    BLOCKED_TOPICS_TOPIC_KEY: topic.to_value(),
                    BLOCKED_TOPICS_BLOCKED_ON_KEY: time_to_value(now),
                }));
            }
        })?;

        tracing::info!(%topic, allowed, "Topic setting changed");
        Ok(())
    }

    /// Remove blocked topics whose block time falls within
    /// `[start_time, end_time]`. The full range clears everything.
    pub fn clear_topic_settings(&self, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Result<()> {
        let removed = self.prefs.update_list(prefs::BLOCKED_TOPICS, |entries| {
            let before = entries.len();
            if is_full_range(start_time, end_time) {
                entries.clear();
            } else {
                entries.retain(|entry| {
                    let blocked_on = entry
                        .get(BLOCKED_TOPICS_BLOCKED_ON_KEY)
                        .and_then(value_to_time);
                    !in_range(blocked_on, start_time, end_time)
                });
            }
            before - entries.len()
        })?;

        tracing::info!(%start_time, %end_time, removed, "Cleared topic settings");
        Ok(())
    }

    pub fn topics_data_accessible_since(&self) -> DateTime<Utc> {
        self.prefs.get_time(prefs::TOPICS_DATA_ACCESSIBLE_SINCE)
    }

    // === Attribution Reporting ===

    pub fn is_attribution_reporting_allowed(&self, top_frame_origin: &Origin, reporting_origin: &Origin) -> bool {
        self.is_privacy_sandbox_enabled_for_origin(reporting_origin, top_frame_origin)
    }

    /// The reporting origin must be allowed under both the source and the
    /// destination, since settings may have changed since either was seen.
    pub fn may_send_attribution_report(
        &self,
        source_origin: &Origin,
        destination_origin: &Origin,
        reporting_origin: &Origin,
    ) -> bool {
        self.is_privacy_sandbox_enabled_for_origin(reporting_origin, source_origin)
            && self.is_privacy_sandbox_enabled_for_origin(reporting_origin, destination_origin)
    }

    // === Fledge ===

    /// Block or unblock interest group joining on `top_frame_etld_plus1`.
    /// Input that is not a registrable domain is accepted if it is a valid
    /// host; anything else is rejected.
    pub fn set_fledge_joining_allowed(&self, top_frame_etld_plus1: &str, allowed: bool) -> Result<()> {
        let Some(site) = effective_etld_plus_one(top_frame_etld_plus1) else {
            tracing::warn!(input = %top_frame_etld_plus1, "Cannot control Fledge joining for an empty eTLD+1");
            return Err(SettingsError::InvalidEtldPlusOne(top_frame_etld_plus1.to_string()));
        };

        let now = self.clock.now();
        self.prefs.update_dict(prefs::FLEDGE_JOIN_BLOCKED, |blocked| {
            if allowed {
                blocked.remove(&site);
            } else {
                blocked.insert(site.clone(), time_to_value(now));
            }
        })?;

        tracing::info!(%site, allowed, "Fledge joining setting changed");
        Ok(())
    }

    pub fn clear_fledge_joining_allowed_settings(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<()> {
        let removed = self.prefs.update_dict(prefs::FLEDGE_JOIN_BLOCKED, |blocked| {
            let before = blocked.len();
            if is_full_range(start_time, end_time) {
                blocked.clear();
            } else {
                blocked.retain(|_, blocked_on| !in_range(value_to_time(blocked_on), start_time, end_time));
            }
            before - blocked.len()
        })?;

        tracing::info!(%start_time, %end_time, removed, "Cleared Fledge joining settings");
        Ok(())
    }

    pub fn is_fledge_joining_allowed(&self, top_frame_origin: &Origin) -> bool {
        let Some(top_frame_url) = origin_url(top_frame_origin) else {
            return true;
        };

        !self
            .prefs
            .get_dict(prefs::FLEDGE_JOIN_BLOCKED)
            .keys()
            .flat_map(|site| fledge_block_patterns(site))
            .any(|pattern| pattern.matches(&top_frame_url))
    }

    pub fn is_fledge_allowed(&self, top_frame_origin: &Origin, auction_party: &Origin) -> bool {
        if self.features.is_enabled(Feature::PrivacySandboxSettings4) {
            return self.is_m1_api_enabled(M1Api::Fledge)
                && origin_url(auction_party).is_some_and(|url| self.is_site_data_allowed(&url));
        }

        self.is_privacy_sandbox_enabled_for_origin(auction_party, top_frame_origin)
    }

    /// The auction parties allowed to take part in an auction under
    /// `top_frame_origin`, in their original order.
    pub fn filter_fledge_allowed_parties(&self, top_frame_origin: &Origin, auction_parties: &[Url]) -> Vec<Url> {
        auction_parties
            .iter()
            .filter(|party| self.is_fledge_allowed(top_frame_origin, &party.origin()))
            .cloned()
            .collect()
    }

    // === Shared Storage and Private Aggregation ===

    pub fn is_shared_storage_allowed(&self, top_frame_origin: &Origin, accessing_origin: &Origin) -> bool {
        self.is_privacy_sandbox_enabled_for_origin(accessing_origin, top_frame_origin)
    }

    // TODO: apply the M1 ad measurement pref and site data settings to the
    // three operation-specific Shared Storage checks under Settings4.
    pub fn is_shared_storage_write_allowed(&self, top_frame_origin: &Origin, accessing_origin: &Origin) -> bool {
        self.is_shared_storage_allowed(top_frame_origin, accessing_origin)
    }

    pub fn is_shared_storage_select_url_allowed(&self, top_frame_origin: &Origin, accessing_origin: &Origin) -> bool {
        self.is_shared_storage_allowed(top_frame_origin, accessing_origin)
    }

    pub fn is_shared_storage_aggregate_reporting_allowed(
        &self,
        top_frame_origin: &Origin,
        accessing_origin: &Origin,
    ) -> bool {
        self.is_shared_storage_allowed(top_frame_origin, accessing_origin)
    }

    pub fn is_private_aggregation_allowed(&self, top_frame_origin: &Origin, reporting_origin: &Origin) -> bool {
        self.is_privacy_sandbox_enabled_for_origin(reporting_origin, top_frame_origin)
    }

    // === Global state ===

    pub fn is_privacy_sandbox_enabled(&self) -> bool {
        let delegate = self.delegate.read();
        if delegate.is_privacy_sandbox_restricted() || delegate.is_incognito_profile() {
            return false;
        }

        // Local testing does not require the user to have opted in.
        if self
            .features
            .is_enabled(Feature::OverridePrivacySandboxSettingsLocalTesting)
        {
            return true;
        }

        self.prefs.get_boolean(prefs::APIS_ENABLED_V2)
    }

    pub fn set_privacy_sandbox_enabled(&self, enabled: bool) -> Result<()> {
        self.prefs.set_boolean(prefs::APIS_ENABLED_V2, enabled)?;
        tracing::info!(enabled, "Privacy Sandbox toggled");
        Ok(())
    }

    /// Whether the enabled toggle is controlled by policy.
    pub fn is_privacy_sandbox_managed(&self) -> bool {
        self.prefs.is_managed_preference(prefs::APIS_ENABLED_V2)
    }

    pub fn is_trust_tokens_allowed(&self) -> bool {
        self.is_privacy_sandbox_enabled()
    }

    pub fn is_privacy_sandbox_restricted(&self) -> bool {
        self.delegate.read().is_privacy_sandbox_restricted()
    }

    pub fn are_first_party_sets_enabled(&self) -> bool {
        self.features.is_enabled(Feature::FirstPartySets)
            && self.prefs.get_boolean(prefs::FIRST_PARTY_SETS_ENABLED)
    }

    /// Cookies were deleted: Topics may only use data from now on.
    pub fn on_cookies_cleared(&self) -> Result<()> {
        self.prefs
            .set_time(prefs::TOPICS_DATA_ACCESSIBLE_SINCE, self.clock.now())?;
        self.for_each_observer(|observer| observer.on_topics_data_accessible_since_updated());
        Ok(())
    }

    // === Observers ===

    /// Register `observer` without taking ownership. It is dropped from the
    /// list once no strong reference remains.
    pub fn add_observer<O>(&self, observer: &Arc<O>)
    where
        O: PrivacySandboxObserver + 'static,
    {
        let observer: Weak<O> = Arc::downgrade(observer);
        let observer: Weak<dyn PrivacySandboxObserver> = observer;
        let mut observers = self.observers.write();
        observers.retain(|existing| existing.strong_count() > 0);
        observers.push(observer);
    }

    pub fn remove_observer<O>(&self, observer: &Arc<O>)
    where
        O: PrivacySandboxObserver + 'static,
    {
        let target = Arc::as_ptr(observer) as *const ();
        self.observers
            .write()
            .retain(|existing| existing.as_ptr() as *const () != target);
    }

    fn for_each_observer(&self, notify: impl Fn(&dyn PrivacySandboxObserver)) {
        let live: Vec<Arc<dyn PrivacySandboxObserver>> =
            self.observers.read().iter().filter_map(Weak::upgrade).collect();
        for observer in live {
            notify(observer.as_ref());
        }
    }

    // === Testing ===

    pub fn set_delegate_for_testing(&self, delegate: Box<dyn PrivacySandboxDelegate>) {
        *self.delegate.write() = delegate;
    }

    pub fn set_all_privacy_sandbox_allowed_for_testing(&self) -> Result<()> {
        self.prefs.set_boolean(prefs::APIS_ENABLED_V2, true)?;
        for api in [M1Api::Topics, M1Api::Fledge, M1Api::AdMeasurement] {
            self.prefs.set_boolean(api.pref_name(), true)?;
        }
        Ok(())
    }

    pub fn set_topics_blocked_for_testing(&self) -> Result<()> {
        self.prefs.set_boolean(M1Api::Topics.pref_name(), false)?;
        Ok(())
    }

    // === Internals ===

    fn is_m1_api_enabled(&self, api: M1Api) -> bool {
        let delegate = self.delegate.read();
        if delegate.is_incognito_profile() || delegate.is_privacy_sandbox_restricted() {
            return false;
        }

        if self
            .features
            .is_enabled(Feature::OverridePrivacySandboxSettingsLocalTesting)
        {
            return true;
        }

        self.prefs.get_boolean(api.pref_name())
    }

    /// Privacy Sandbox is on and `url` has full cookie access in a
    /// third-party context under `top_frame_origin`.
    fn is_privacy_sandbox_enabled_for_context(&self, url: &Url, top_frame_origin: Option<&Origin>) -> bool {
        if !self.is_privacy_sandbox_enabled() {
            return false;
        }

        self.cookie_settings
            .is_full_cookie_access_allowed(url, &SiteForCookies::null(), top_frame_origin)
    }

    fn is_privacy_sandbox_enabled_for_origin(&self, origin: &Origin, top_frame_origin: &Origin) -> bool {
        match origin_url(origin) {
            Some(url) => self.is_privacy_sandbox_enabled_for_context(&url, Some(top_frame_origin)),
            None => false,
        }
    }

    /// Site data for `url` on its own, ignoring third-party context.
    fn is_site_data_allowed(&self, url: &Url) -> bool {
        self.content_settings
            .get_content_setting(url, None, ContentSettingsType::Cookies)
            != ContentSetting::Block
    }

    fn on_privacy_sandbox_pref_changed(&self) {
        let blocked = !self.is_trust_tokens_allowed();
        self.for_each_observer(|observer| observer.on_trust_token_blocking_changed(blocked));
    }

    fn on_first_party_sets_enabled_pref_changed(&self) {
        if !self.features.is_enabled(Feature::FirstPartySets) {
            return;
        }
        let enabled = self.prefs.get_boolean(prefs::FIRST_PARTY_SETS_ENABLED);
        self.for_each_observer(|observer| observer.on_first_party_sets_enabled_changed(enabled));
    }
}

fn blocked_topic(entry: &Value) -> Option<CanonicalTopic> {
    let topic = entry
        .get(BLOCKED_TOPICS_TOPIC_KEY)
        .and_then(CanonicalTopic::from_value);
    if topic.is_none() {
        tracing::warn!(%entry, "Skipping malformed blocked topic entry");
    }
    topic
}

fn is_full_range(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> bool {
    start_time == null_time() && end_time == max_time()
}

/// Inclusive on both ends. An undecodable time is never in range.
fn in_range(time: Option<DateTime<Utc>>, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> bool {
    time.is_some_and(|time| start_time <= time && time <= end_time)
}

fn origin_url(origin: &Origin) -> Option<Url> {
    if !origin.is_tuple() {
        return None;
    }
    Url::parse(&origin.ascii_serialization()).ok()
}

fn effective_etld_plus_one(input: &str) -> Option<String> {
    let etld_plus_one = get_domain_and_registry(input, RegistryFilter::IncludePrivate);
    let effective = if etld_plus_one == input && Host::parse(input).is_ok() {
        etld_plus_one
    } else {
        // Hosts are accepted too: the suffix list may have changed since the
        // caller computed its eTLD+1.
        Url::parse(&format!("https://{}", input))
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_default()
    };

    // A key with no usable pattern would block nothing.
    (!effective.is_empty() && !fledge_block_patterns(&effective).is_empty()).then_some(effective)
}

/// `[*.]site` covers the site and its subdomains; the bare form covers IP
/// literals, for which the subdomain form does not parse.
fn fledge_block_patterns(site: &str) -> Vec<ContentSettingsPattern> {
    [format!("[*.]{}", site), site.to_string()]
        .iter()
        .filter_map(|pattern| ContentSettingsPattern::parse(pattern).ok())
        .collect()
}
