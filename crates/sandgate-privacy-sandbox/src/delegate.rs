/// The embedder's view of the profile the gate serves.
pub trait PrivacySandboxDelegate: Send + Sync {
    /// Whether Privacy Sandbox must be unavailable for this profile, for
    /// example because of account restrictions.
    fn is_privacy_sandbox_restricted(&self) -> bool;

    fn is_incognito_profile(&self) -> bool;
}
