//! Test run lifecycle: start, per-test scopes, shutdown and reporting.

use std::sync::{Arc, PoisonError};

use webtrail_db::open_database;
use webtrail_events::{shared, EventStore, SqliteEventStore};
use webtrail_logger::{
    BrowserSession, EventLog, EventLoggerFactory, EventPipeline, ExecutionContext, FailureHandle,
    Logger, PriorityConfiguration,
};
use webtrail_report::{LogReporter, ReportError, ReportSummary, ReportSynthesizer};
use webtrail_types::{EventAction, EventSource, Priority, RunId};

use crate::config::Config;
use crate::error::HarnessError;

/// How a test ended.
#[derive(Debug, Clone)]
pub enum TestOutcome {
    Passed,
    /// The test was not run; carries the reason.
    Skipped(String),
    /// One or more assertions failed.
    Failed(Vec<FailureHandle>),
    /// The test was aborted by an unexpected error.
    Errored(FailureHandle),
}

/// What one reporter produced at shutdown.
#[derive(Debug)]
pub struct ReportOutcome {
    /// [`LogReporter::name`] of the reporter.
    pub reporter: String,
    /// What it wrote, or why it failed.
    pub result: Result<ReportSummary, ReportError>,
}

/// One run of a test suite: an open event store, the logger pipeline and
/// the reporters run at shutdown.
///
/// Shutdown happens in [`TestRun::finish`], or on drop if `finish` was never
/// called. It closes the store, then runs every reporter. Neither step
/// panics; failures are logged.
pub struct TestRun {
    pipeline: EventPipeline,
    reporters: Vec<Box<dyn LogReporter>>,
    finished: bool,
}

impl TestRun {
    /// Starts a run with a freshly generated id.
    pub fn start(config: &Config) -> Result<Self, HarnessError> {
        Self::start_with_id(config, RunId::generate())
    }

    /// Opens the configured database, applies migrations and thresholds, and
    /// registers the markdown reporter if reports are enabled.
    pub fn start_with_id(config: &Config, run: RunId) -> Result<Self, HarnessError> {
        let pool = open_database(&config.storage.path, config.storage.runtime_settings())?;

        let mut store = SqliteEventStore::new(pool).with_batch_limit(config.storage.batch_size);
        store.open(&run)?;

        let priorities = PriorityConfiguration::new();
        config.priorities.apply(&priorities);
        let pipeline = EventPipeline::new(run, Arc::new(priorities), shared(store));

        let mut test_run = Self::from_pipeline(pipeline);
        if config.report.enabled {
            let synthesizer =
                ReportSynthesizer::new(config.report.settings.clone()).with_catalog(config.report.catalog()?);
            test_run.reporters.push(Box::new(synthesizer));
        }

        tracing::info!(run = %test_run.run_id(), db = %config.storage.path, "test run started");
        Ok(test_run)
    }

    /// Wraps an existing pipeline. Its store must already be open.
    pub fn from_pipeline(pipeline: EventPipeline) -> Self {
        Self {
            pipeline,
            reporters: Vec::new(),
            finished: false,
        }
    }

    /// Registers an additional reporter.
    pub fn with_reporter(mut self, reporter: impl LogReporter + 'static) -> Self {
        self.reporters.push(Box::new(reporter));
        self
    }

    /// The id every record of this run is stamped with.
    pub fn run_id(&self) -> &RunId {
        self.pipeline.run()
    }

    /// The store, thresholds and failure registry shared by its loggers.
    pub fn pipeline(&self) -> &EventPipeline {
        &self.pipeline
    }

    /// Returns a logger factory for `source`.
    pub fn factory(&self, source: EventSource) -> EventLoggerFactory {
        self.pipeline.factory(source)
    }

    /// Records the start of `class::method` and returns its scope.
    pub fn begin_test(&self, class: &str, method: &str, display_name: &str) -> Result<TestScope, HarnessError> {
        let scope = TestScope {
            class: class.to_string(),
            method: method.to_string(),
            display_name: display_name.to_string(),
            factory: self.factory(EventSource::Test),
            assertions: self.factory(EventSource::Assertion),
            pipeline: self.pipeline.clone(),
            context: ExecutionContext::new(),
            finished: false,
        };
        scope
            .factory
            .on_doku(class, method)?
            .log(EventAction::TestStart, "test.start", &[&scope.display_name])?;
        Ok(scope)
    }

    /// Closes the store and runs every reporter.
    pub fn finish(mut self) -> Vec<ReportOutcome> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Vec<ReportOutcome> {
        if std::mem::replace(&mut self.finished, true) {
            return Vec::new();
        }
        let run = self.pipeline.run().clone();
        let mut store = self
            .pipeline
            .store()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Err(e) = store.close() {
            tracing::error!(run = %run, error = %e, "failed to close the event store");
        }

        self.reporters
            .iter()
            .map(|reporter| {
                let result = reporter.create_report(&*store, &run);
                match &result {
                    Ok(summary) => tracing::info!(
                        reporter = reporter.name(),
                        tests = summary.tests,
                        path = %summary.run_dir.display(),
                        "report created"
                    ),
                    Err(e) => tracing::error!(reporter = reporter.name(), error = %e, "report failed"),
                }
                ReportOutcome {
                    reporter: reporter.name().to_string(),
                    result,
                }
            })
            .collect()
    }
}

impl Drop for TestRun {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(run = %self.pipeline.run(), "test run dropped without finish, shutting down");
            self.shutdown();
        }
    }
}

/// The span of one test between its start and terminal records.
pub struct TestScope {
    class: String,
    method: String,
    display_name: String,
    factory: EventLoggerFactory,
    assertions: EventLoggerFactory,
    pipeline: EventPipeline,
    context: ExecutionContext,
    finished: bool,
}

impl TestScope {
    /// Test class, the group of its records.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Test method, the item of its records.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Holds the browser session screenshots are taken from.
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Makes `session` the session of this test.
    pub fn set_session(&self, session: Arc<dyn BrowserSession>) {
        self.context.set_session(session);
    }

    /// A test-source logger for this test at `priority`.
    pub fn logger(&self, priority: Priority) -> Result<Logger, HarnessError> {
        Ok(self.factory.on(priority, &self.class, &self.method)?)
    }

    /// Reports a failed assertion once, with a screenshot of the current
    /// session. Returns `false` if this failure was already reported.
    pub fn report_assertion_failure(&self, failure: &FailureHandle) -> Result<bool, HarnessError> {
        let logger = self.assertions.on_failure(&self.class, &self.method)?;
        Ok(logger.log_assertion_failure(failure, &self.context)?)
    }

    /// Records the terminal event for `outcome` and commits the run's
    /// records so far. The commit happens even if logging the outcome fails.
    ///
    /// Failures carried by `outcome` are released from the failure registry
    /// afterwards, so the registry only holds failures of running tests.
    pub fn finish(mut self, outcome: TestOutcome) -> Result<(), HarnessError> {
        self.finished = true;
        let logged = self.record_outcome(&outcome);
        if let TestOutcome::Failed(failures) = &outcome {
            let registry = self.pipeline.failures();
            for failure in failures {
                registry.release(failure);
            }
        }
        let written = self.write();
        logged.and(written)
    }

    fn record_outcome(&self, outcome: &TestOutcome) -> Result<(), HarnessError> {
        let doku = self.factory.on_doku(&self.class, &self.method)?;
        let name = &self.display_name;
        match outcome {
            TestOutcome::Passed => {
                doku.log(EventAction::TestFinished, "test.success", &[name])?;
            }
            TestOutcome::Skipped(reason) => {
                doku.log(EventAction::TestSkipped, "test.skipped", &[name, reason])?;
            }
            TestOutcome::Failed(failures) => {
                let mut first_error = None;
                for failure in failures {
                    if let Err(e) = self.report_assertion_failure(failure) {
                        tracing::error!(
                            class = %self.class,
                            method = %self.method,
                            error = %e,
                            "failed to report an assertion failure"
                        );
                        first_error.get_or_insert(e);
                    }
                }
                doku.log(
                    EventAction::TestFinishedWithFailures,
                    "test.failures",
                    &[name, &failures.len()],
                )?;
                if let Some(e) = first_error {
                    return Err(e);
                }
            }
            TestOutcome::Errored(error) => {
                self.factory
                    .on_exception(&self.class, &self.method)?
                    .log_exception(error, &self.context)?;
                doku.log(EventAction::TestFinishedWithException, "test.exception", &[name, error])?;
            }
        }
        Ok(())
    }

    fn write(&self) -> Result<(), HarnessError> {
        let mut store = self
            .pipeline
            .store()
            .lock()
            .map_err(|_| HarnessError::StorePoisoned)?;
        store.write()?;
        Ok(())
    }
}

impl Drop for TestScope {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        tracing::warn!(class = %self.class, method = %self.method, "test scope dropped without an outcome");
        if let Err(e) = self.write() {
            tracing::error!(error = %e, "failed to write events of an unfinished test");
        }
    }
}
