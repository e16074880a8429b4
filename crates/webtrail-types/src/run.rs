//! Run identifiers.

use serde::{Deserialize, Serialize};

/// Identifies one execution of a test suite.
///
/// A run is the unit of batching in the event store and the top-level
/// directory of its reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Wraps an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh identifier from the local start time plus a short
    /// random suffix, e.g. `2026-10-18_09_30_00-1f3a9c2e`.
    pub fn generate() -> Self {
        let started = chrono::Local::now().format("%Y-%m-%d_%H_%M_%S");
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{started}-{}", &suffix[..8]))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
