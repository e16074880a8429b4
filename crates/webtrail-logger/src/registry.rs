//! Identity-based deduplication of reported failures.

use std::sync::{Arc, LazyLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// A failure as passed around by tests and assertion helpers.
///
/// Two handles denote the same failure only if they point at the same
/// allocation; equal messages do not make failures equal.
pub type FailureHandle = Arc<dyn std::error::Error + Send + Sync>;

/// A failed assertion with a human-readable message.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct AssertionFailure(pub String);

impl AssertionFailure {
    /// Wraps `message` into a fresh failure handle.
    pub fn handle(message: impl Into<String>) -> FailureHandle {
        Arc::new(Self(message.into()))
    }
}

static PROCESS: LazyLock<Arc<FailureRegistry>> = LazyLock::new(|| Arc::new(FailureRegistry::new()));

/// The set of failures that have already been logged.
///
/// Registered handles are kept alive so their addresses cannot be reused by
/// a later, different failure. Nothing is evicted on its own: a handle stays
/// registered, and allocated, until [`FailureRegistry::release`] or
/// [`FailureRegistry::clear`] drops it.
#[derive(Default)]
pub struct FailureRegistry {
    seen: DashMap<usize, FailureHandle>,
}

impl FailureRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry every pipeline uses unless told otherwise.
    pub fn process() -> Arc<Self> {
        Arc::clone(&PROCESS)
    }

    /// Registers `failure` and returns `true` the first time this exact
    /// handle is seen.
    pub fn first_report(&self, failure: &FailureHandle) -> bool {
        match self.seen.entry(identity(failure)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(failure));
                true
            }
        }
    }

    /// Returns `true` if `failure` has been registered.
    pub fn contains(&self, failure: &FailureHandle) -> bool {
        self.seen.contains_key(&identity(failure))
    }

    /// Forgets `failure`. Returns `true` if it was registered.
    ///
    /// A released handle is reported again the next time it is logged.
    pub fn release(&self, failure: &FailureHandle) -> bool {
        self.seen.remove(&identity(failure)).is_some()
    }

    /// Forgets every registered failure.
    pub fn clear(&self) {
        self.seen.clear();
    }

    /// Number of distinct failures registered.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns `true` if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl std::fmt::Debug for FailureRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailureRegistry")
            .field("len", &self.seen.len())
            .finish()
    }
}

fn identity(failure: &FailureHandle) -> usize {
    Arc::as_ptr(failure) as *const () as usize
}
