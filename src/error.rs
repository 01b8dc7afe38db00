//! Error handling for result merging operations.
//!
//! Separates fatal startup and sink failures from the per-cycle failures the
//! polling loop contains and retries.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MergerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Settings file could not be parsed: {path} - {source}")]
    SettingsFormat {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Configured path is not an existing directory: {path}")]
    PathValidation { path: PathBuf },

    #[error("Register request to {url} failed: {source}")]
    RegisterFetch {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("Register dump is malformed: {reason}")]
    RegisterParse { reason: String },

    #[error("Directory traversal failed under {root}: {source}")]
    DirectoryTraversal {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Could not read tail of {path}: {source}")]
    TailRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not append to results log {path}: {source}")]
    SinkWrite {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl MergerError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a register parse error
    pub fn register_parse(reason: impl Into<String>) -> Self {
        Self::RegisterParse {
            reason: reason.into(),
        }
    }

    /// Whether this error must stop the process instead of being retried next cycle
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MergerError::Configuration { .. }
                | MergerError::SettingsFormat { .. }
                | MergerError::PathValidation { .. }
                | MergerError::SinkWrite { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, MergerError>;
