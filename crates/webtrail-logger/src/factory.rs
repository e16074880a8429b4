//! Logger factories and the pipeline they draw from.

use std::sync::Arc;

use webtrail_events::SharedStore;
use webtrail_types::{EventSource, Priority, RunId};

use crate::error::LoggerError;
use crate::logger::{EventLogger, Logger, NullLogger};
use crate::priorities::PriorityConfiguration;
use crate::registry::FailureRegistry;

/// Everything loggers of one run share: the run id, the thresholds, the
/// store and the registry of already reported failures.
#[derive(Clone)]
pub struct EventPipeline {
    run: RunId,
    priorities: Arc<PriorityConfiguration>,
    store: SharedStore,
    failures: Arc<FailureRegistry>,
}

impl EventPipeline {
    /// Creates a pipeline backed by [`FailureRegistry::process`], so a
    /// failure is reported once per process however many runs see it.
    pub fn new(run: RunId, priorities: Arc<PriorityConfiguration>, store: SharedStore) -> Self {
        Self {
            run,
            priorities,
            store,
            failures: FailureRegistry::process(),
        }
    }

    /// Replaces the process-wide registry, e.g. to isolate a run.
    pub fn with_failure_registry(mut self, failures: Arc<FailureRegistry>) -> Self {
        self.failures = failures;
        self
    }

    /// Returns a factory for loggers of `source`.
    pub fn factory(&self, source: EventSource) -> EventLoggerFactory {
        EventLoggerFactory {
            source,
            pipeline: self.clone(),
        }
    }

    /// The run records are stamped with.
    pub fn run(&self) -> &RunId {
        &self.run
    }

    /// The thresholds consulted by every factory of this pipeline.
    pub fn priorities(&self) -> &Arc<PriorityConfiguration> {
        &self.priorities
    }

    /// The store records are inserted into.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// The registry of failures that were already logged.
    pub fn failures(&self) -> &Arc<FailureRegistry> {
        &self.failures
    }
}

impl std::fmt::Debug for EventPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPipeline")
            .field("run", &self.run)
            .field("priorities", &self.priorities)
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}

/// Hands out loggers for one event source.
#[derive(Debug, Clone)]
pub struct EventLoggerFactory {
    source: EventSource,
    pipeline: EventPipeline,
}

impl EventLoggerFactory {
    /// The source of every logger this factory creates.
    pub fn source(&self) -> EventSource {
        self.source
    }

    /// Returns a logger at `priority` for `(group, item)`.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::MissingDefault`] if no threshold was seeded for
    /// the factory's source.
    pub fn on(&self, priority: Priority, group: &str, item: &str) -> Result<Logger, LoggerError> {
        let priorities = &self.pipeline.priorities;
        let threshold = priorities.log_threshold(self.source, Some(group), Some(item))?;
        if !priority.is_at_least(threshold) {
            return Ok(Logger::Null(NullLogger));
        }

        let screenshot_threshold = priorities.screenshot_threshold(self.source, Some(group), Some(item))?;
        Ok(Logger::Event(EventLogger {
            run: self.pipeline.run.clone(),
            source: self.source,
            group: group.to_string(),
            item: item.to_string(),
            priority,
            screenshot_threshold,
            store: Arc::clone(&self.pipeline.store),
            failures: Arc::clone(&self.pipeline.failures),
        }))
    }

    /// Returns a logger at [`Priority::Debug`].
    pub fn on_debug(&self, group: &str, item: &str) -> Result<Logger, LoggerError> {
        self.on(Priority::Debug, group, item)
    }

    /// Returns a logger at [`Priority::Documentation`].
    pub fn on_doku(&self, group: &str, item: &str) -> Result<Logger, LoggerError> {
        self.on(Priority::Documentation, group, item)
    }

    /// Returns a logger at [`Priority::Failure`].
    pub fn on_failure(&self, group: &str, item: &str) -> Result<Logger, LoggerError> {
        self.on(Priority::Failure, group, item)
    }

    /// Returns a logger at [`Priority::Exception`].
    pub fn on_exception(&self, group: &str, item: &str) -> Result<Logger, LoggerError> {
        self.on(Priority::Exception, group, item)
    }
}
