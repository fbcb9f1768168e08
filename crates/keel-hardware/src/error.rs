//! Flash-efficient error handling using thiserror 2.0

use thiserror::Error;

/// Non-volatile store errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    #[error("Store read operation failed")]
    ReadFailed,

    #[error("Store write operation failed")]
    WriteFailed,

    #[error("Record larger than store capacity")]
    Capacity,
}

/// Configuration blob errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    #[error("Config signature mismatch (found {found:#010x})")]
    SignatureMismatch { found: u32 },

    #[error("Config blob truncated or corrupt")]
    Corrupt,

    #[error("Config serialization failed")]
    Serialization,
}

/// Main error type that encompasses all subsystem errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeelError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

pub type KeelResult<T> = Result<T, KeelError>;
