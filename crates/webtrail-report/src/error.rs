//! Report and catalog error types.

use std::path::PathBuf;

use thiserror::Error;
use webtrail_events::StoreError;

/// Errors that abort report generation for a run.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Creating, writing or removing a report artifact failed.
    #[error("report I/O failed at {}: {source}", path.display())]
    Io {
        /// The artifact being processed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Reading the run's records failed.
    #[error("failed to read events: {0}")]
    Store(#[from] StoreError),
}

impl ReportError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

/// Errors raised while loading message bundles.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The bundle file could not be read.
    #[error("failed to read message bundle {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bundle is not valid TOML.
    #[error("failed to parse message bundle: {0}")]
    Parse(#[from] toml::de::Error),

    /// A template value is not a string.
    #[error("message template `{key}` is not a string")]
    NotAString { key: String },
}
