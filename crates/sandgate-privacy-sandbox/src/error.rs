use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Storage error: {0}")]
    Storage(#[from] sandgate_storage::StorageError),

    #[error("Not a registrable domain or host: {0:?}")]
    InvalidEtldPlusOne(String),

    #[error("Unknown feature: {0}")]
    UnknownFeature(String),
}
