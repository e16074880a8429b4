//! The storage abstraction shared by loggers and reporters.

use std::sync::{Arc, Mutex};

use webtrail_types::RunId;

use crate::error::StoreError;
use crate::record::EventRecord;

/// A durable, batched sink for event records plus read-back.
///
/// Implementations hold mutable single-writer state (the pending batch and
/// the open transaction), which is why the mutating operations take
/// `&mut self`. Loggers share a store through [`SharedStore`], whose mutex
/// serialises concurrent writers.
pub trait EventStore: Send {
    /// Opens the store for `run`. Opening an open store is a no-op.
    fn open(&mut self, run: &RunId) -> Result<(), StoreError>;

    /// Buffers a record, executing the batch once it grows past its limit.
    fn insert(&mut self, record: EventRecord) -> Result<(), StoreError>;

    /// Executes the pending batch and commits, leaving the store open.
    fn write(&mut self) -> Result<(), StoreError>;

    /// Executes the pending batch, commits and releases the underlying
    /// resources. Closing a closed store is a no-op.
    fn close(&mut self) -> Result<(), StoreError>;

    /// Streams every persisted record of `run` in insertion order.
    fn read_all(&self, run: &RunId) -> Result<EventCursor<'_>, StoreError>;

    /// Streams only the test-start and test-terminal records of `run`.
    fn read_milestones(&self, run: &RunId) -> Result<EventCursor<'_>, StoreError>;

    /// Returns `true` between `open` and `close`.
    fn is_open(&self) -> bool;
}

/// A store shared between loggers of one run.
pub type SharedStore = Arc<Mutex<dyn EventStore>>;

/// Wraps a store for sharing between loggers.
pub fn shared(store: impl EventStore + 'static) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// A lazy, closable sequence of persisted records.
///
/// Dropping the cursor, whether exhausted or not, releases whatever it holds
/// on to. [`EventCursor::close`] makes that explicit at call sites.
pub struct EventCursor<'a> {
    rows: Box<dyn Iterator<Item = Result<EventRecord, StoreError>> + 'a>,
}

impl<'a> EventCursor<'a> {
    /// Wraps an iterator of records.
    pub fn new(rows: impl Iterator<Item = Result<EventRecord, StoreError>> + 'a) -> Self {
        Self {
            rows: Box::new(rows),
        }
    }

    /// Stops reading and releases the cursor's resources.
    pub fn close(self) {}
}

impl Iterator for EventCursor<'_> {
    type Item = Result<EventRecord, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}

impl std::fmt::Debug for EventCursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventCursor").finish_non_exhaustive()
    }
}
