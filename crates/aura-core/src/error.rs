use thiserror::Error;

use crate::types::EntityKind;

#[derive(Debug, Error)]
pub enum AuraError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// A stored document could not be decoded into its typed form. The key
    /// is included so the offending record can be found and repaired.
    #[error("Malformed {kind} at {key}: {reason}")]
    MalformedEntity {
        kind: EntityKind,
        key: String,
        reason: String,
    },

    #[error("Malformed player record at {key}: {reason}")]
    MalformedPlayer { key: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AuraError {
    /// Short error code string, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            AuraError::Config(_) => "CONFIG_ERROR",
            AuraError::MalformedEntity { .. } => "MALFORMED_ENTITY",
            AuraError::MalformedPlayer { .. } => "MALFORMED_PLAYER",
            AuraError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, AuraError>;
