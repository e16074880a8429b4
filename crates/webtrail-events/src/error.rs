//! Error types for the event store.

/// Errors that can occur while persisting or reading events.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A database operation failed.
    #[error("event store database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No connection could be checked out of the pool.
    #[error("event store connection error: {0}")]
    Pool(#[from] r2d2::Error),

    /// The store was used for writing before `open` or after `close`.
    #[error("event store is not open")]
    NotOpen,

    /// A persisted column holds a value this version cannot interpret.
    #[error("event store holds an unreadable {column}: {value}")]
    Corrupt {
        /// The column name.
        column: &'static str,
        /// The offending value.
        value: String,
    },
}
