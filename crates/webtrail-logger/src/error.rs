//! Error types for logger construction and log calls.

use webtrail_events::StoreError;
use webtrail_types::EventSource;

/// Configuration errors raised while handing out a logger.
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// No default threshold was seeded for the source.
    #[error("no default priority configured for event source {0}")]
    MissingDefault(EventSource),
}

/// Errors raised by a log call.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The store rejected the record.
    #[error("failed to store event: {0}")]
    Store(#[from] StoreError),

    /// A writer panicked while holding the store.
    #[error("event store lock poisoned")]
    StorePoisoned,
}
