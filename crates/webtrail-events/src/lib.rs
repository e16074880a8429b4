//! Event records and their durable, batched storage.
//!
//! Every log call that survives priority filtering ends up here as an
//! [`EventRecord`]. Records are handed to an [`EventStore`], which buffers
//! them and writes them out in batches inside one long-running transaction
//! per run:
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | `open` | checks out a connection and begins the run's transaction |
//! | `insert` | buffers the record; executes the batch once it exceeds [`MAX_BATCH_SIZE`] |
//! | `write` | executes the batch and commits, keeping the transaction open |
//! | `close` | executes the batch, commits and releases the connection |
//! | `read_all` | streams a run's records back in insertion order |
//!
//! # Usage
//!
//! ```rust,ignore
//! use webtrail_events::{EventRecord, EventStore, SqliteEventStore};
//!
//! let mut store = SqliteEventStore::new(pool);
//! store.open(&run)?;
//! store.insert(record)?;
//! store.write()?;
//! for record in store.read_all(&run)? {
//!     println!("{}", record?.description);
//! }
//! store.close()?;
//! ```

mod error;
mod record;
mod sqlite;
mod store;

pub use error::StoreError;
pub use record::{current_thread_number, Arguments, EventRecord, Screenshot, MAX_ARGUMENTS};
pub use sqlite::{SqliteEventStore, MAX_BATCH_SIZE};
pub use store::{shared, EventCursor, EventStore, SharedStore};

#[cfg(test)]
mod tests;
