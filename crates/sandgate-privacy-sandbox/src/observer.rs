/// Receives Privacy Sandbox state changes. All methods default to no-ops.
///
/// Observers are held weakly; dropping the last strong reference is enough
/// to stop notifications.
pub trait PrivacySandboxObserver: Send + Sync {
    fn on_topics_data_accessible_since_updated(&self) {}

    fn on_trust_token_blocking_changed(&self, _blocked: bool) {}

    fn on_first_party_sets_enabled_changed(&self, _enabled: bool) {}
}
