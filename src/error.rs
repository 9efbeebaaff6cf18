use std::path::PathBuf;
use thiserror::Error;

use crate::format::Format;

#[derive(Debug, Error)]
pub enum ConfigsError {
    #[error("Invalid key '{key}': {reason}")]
    InvalidKeyFormat { key: String, reason: String },

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Initial data does not match the non-empty contents of the store")]
    DataConflict,

    #[error("Failed to detect the store format of {path}")]
    StoreDetectionFailed { path: PathBuf },

    #[error("Unknown store type '{0}' (expected auto, yaml, yml, json or toml)")]
    UnknownStoreType(String),

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Invalid document in {path}: {reason}")]
    InvalidDocument { path: PathBuf, reason: String },

    #[error("Failed to parse {path} as {format}: {reason}")]
    ParseError {
        path: PathBuf,
        format: Format,
        reason: String,
    },

    #[error("Failed to render {path} as {format}: {reason}")]
    RenderError {
        path: PathBuf,
        format: Format,
        reason: String,
    },

    #[error("Failed to access {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No platform config directory available for app '{0}'")]
    NoConfigDir(String),
}

impl ConfigsError {
    pub(crate) fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigsError::InvalidKeyFormat {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// True for the one error kind that `get`, `get_or` and `pop_or` recover from.
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, ConfigsError::KeyNotFound(_))
    }
}
