//! Logger objects handed out by the factory.

use std::fmt::Display;
use std::sync::Arc;

use webtrail_events::{EventRecord, Screenshot, SharedStore};
use webtrail_types::{EventAction, EventSource, Priority, RunId};

use crate::error::LogError;
use crate::registry::{FailureHandle, FailureRegistry};
use crate::session::{capture, BrowserSession, ExecutionContext};

/// Message key used for failed assertions.
pub(crate) const ASSERTION_FAILED_KEY: &str = "assertion.failed";

/// Message key used for unexpected errors.
pub(crate) const EXCEPTION_KEY: &str = "test.exception_occurs";

/// The operations every logger supports.
///
/// [`NullLogger`] implements all of them as no-ops, so call sites can use
/// [`will_log`](EventLog::will_log) to skip building expensive arguments.
pub trait EventLog {
    /// Returns `true` if `log` would store anything.
    fn will_log(&self) -> bool;

    /// Returns `true` if `with_screenshot(priority, ..)` would capture.
    fn will_capture_screenshot(&self, priority: Priority) -> bool;

    /// Stores an event with up to four positional arguments.
    fn log(&self, action: EventAction, message_key: &str, args: &[&dyn Display]) -> Result<(), LogError>;

    /// Captures a screenshot from `session` if `priority` reaches the
    /// screenshot threshold. The returned value carries it into `log`.
    fn with_screenshot(&self, priority: Priority, session: &dyn BrowserSession) -> Captured<'_>;

    /// Like [`with_screenshot`](EventLog::with_screenshot) for the context's
    /// current session.
    fn with_current_screenshot(&self, priority: Priority, ctx: &ExecutionContext) -> Captured<'_>;

    /// Logs a failed assertion with a screenshot of the current session, once
    /// per failure handle. Returns `Ok(false)` if nothing was stored.
    fn log_assertion_failure(&self, failure: &FailureHandle, ctx: &ExecutionContext) -> Result<bool, LogError>;

    /// Logs an unexpected error with a screenshot of the current session.
    fn log_exception(&self, failure: &FailureHandle, ctx: &ExecutionContext) -> Result<(), LogError>;
}

/// A logger bound to `(source, group, item)` at a priority that passed the
/// log threshold.
pub struct EventLogger {
    pub(crate) run: RunId,
    pub(crate) source: EventSource,
    pub(crate) group: String,
    pub(crate) item: String,
    pub(crate) priority: Priority,
    pub(crate) screenshot_threshold: Priority,
    pub(crate) store: SharedStore,
    pub(crate) failures: Arc<FailureRegistry>,
}

impl EventLogger {
    /// The priority records from this logger carry.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// The screenshot threshold resolved for this logger's key.
    pub fn screenshot_threshold(&self) -> Priority {
        self.screenshot_threshold
    }

    /// The source this logger is bound to.
    pub fn source(&self) -> EventSource {
        self.source
    }

    /// The group this logger is bound to.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// The item this logger is bound to.
    pub fn item(&self) -> &str {
        &self.item
    }

    fn emit(
        &self,
        priority: Priority,
        action: EventAction,
        message_key: &str,
        args: &[&dyn Display],
        screenshot: Option<Screenshot>,
    ) -> Result<(), LogError> {
        let record = EventRecord::new(
            self.run.clone(),
            self.source,
            self.group.as_str(),
            self.item.as_str(),
            action,
            priority,
            message_key,
        )
        .with_arguments(args)
        .with_screenshot(screenshot);

        let mut store = self.store.lock().map_err(|_| LogError::StorePoisoned)?;
        store.insert(record)?;
        Ok(())
    }

    fn capture_if(&self, priority: Priority, session: Option<&dyn BrowserSession>) -> Option<Screenshot> {
        if !priority.is_at_least(self.screenshot_threshold) {
            return None;
        }
        match session {
            Some(session) => capture(session),
            None => {
                tracing::debug!(
                    group = %self.group,
                    item = %self.item,
                    "screenshot requested without an active session"
                );
                None
            }
        }
    }
}

impl EventLog for EventLogger {
    fn will_log(&self) -> bool {
        true
    }

    fn will_capture_screenshot(&self, priority: Priority) -> bool {
        priority.is_at_least(self.screenshot_threshold)
    }

    fn log(&self, action: EventAction, message_key: &str, args: &[&dyn Display]) -> Result<(), LogError> {
        self.emit(self.priority, action, message_key, args, None)
    }

    fn with_screenshot(&self, priority: Priority, session: &dyn BrowserSession) -> Captured<'_> {
        Captured {
            logger: Some(self),
            screenshot: self.capture_if(priority, Some(session)),
        }
    }

    fn with_current_screenshot(&self, priority: Priority, ctx: &ExecutionContext) -> Captured<'_> {
        let session = ctx.current_session();
        Captured {
            logger: Some(self),
            screenshot: self.capture_if(priority, session.as_deref()),
        }
    }

    fn log_assertion_failure(&self, failure: &FailureHandle, ctx: &ExecutionContext) -> Result<bool, LogError> {
        if !self.failures.first_report(failure) {
            tracing::debug!(group = %self.group, item = %self.item, "assertion failure already logged");
            return Ok(false);
        }
        let message = failure.to_string();
        self.with_current_screenshot(Priority::Failure, ctx).log_at(
            Priority::Failure,
            EventAction::AssertionFailed,
            ASSERTION_FAILED_KEY,
            &[&message],
        )?;
        Ok(true)
    }

    fn log_exception(&self, failure: &FailureHandle, ctx: &ExecutionContext) -> Result<(), LogError> {
        let message = failure.to_string();
        self.with_current_screenshot(Priority::Exception, ctx).log_at(
            Priority::Exception,
            EventAction::ExceptionOccurred,
            EXCEPTION_KEY,
            &[&message],
        )
    }
}

impl std::fmt::Debug for EventLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLogger")
            .field("run", &self.run)
            .field("source", &self.source)
            .field("group", &self.group)
            .field("item", &self.item)
            .field("priority", &self.priority)
            .field("screenshot_threshold", &self.screenshot_threshold)
            .finish_non_exhaustive()
    }
}

/// A logger below the log threshold. Every operation is inert.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl EventLog for NullLogger {
    fn will_log(&self) -> bool {
        false
    }

    fn will_capture_screenshot(&self, _priority: Priority) -> bool {
        false
    }

    fn log(&self, _action: EventAction, _message_key: &str, _args: &[&dyn Display]) -> Result<(), LogError> {
        Ok(())
    }

    fn with_screenshot(&self, _priority: Priority, _session: &dyn BrowserSession) -> Captured<'_> {
        Captured::inert()
    }

    fn with_current_screenshot(&self, _priority: Priority, _ctx: &ExecutionContext) -> Captured<'_> {
        Captured::inert()
    }

    fn log_assertion_failure(&self, _failure: &FailureHandle, _ctx: &ExecutionContext) -> Result<bool, LogError> {
        Ok(false)
    }

    fn log_exception(&self, _failure: &FailureHandle, _ctx: &ExecutionContext) -> Result<(), LogError> {
        Ok(())
    }
}

/// The logger a factory hands out.
#[derive(Debug)]
pub enum Logger {
    /// The priority passed the log threshold.
    Event(EventLogger),
    /// The priority is filtered out.
    Null(NullLogger),
}

impl Logger {
    fn as_log(&self) -> &dyn EventLog {
        match self {
            Logger::Event(logger) => logger,
            Logger::Null(logger) => logger,
        }
    }

    /// Returns the active logger, if the priority passed the threshold.
    pub fn as_event_logger(&self) -> Option<&EventLogger> {
        match self {
            Logger::Event(logger) => Some(logger),
            Logger::Null(_) => None,
        }
    }
}

impl EventLog for Logger {
    fn will_log(&self) -> bool {
        self.as_log().will_log()
    }

    fn will_capture_screenshot(&self, priority: Priority) -> bool {
        self.as_log().will_capture_screenshot(priority)
    }

    fn log(&self, action: EventAction, message_key: &str, args: &[&dyn Display]) -> Result<(), LogError> {
        self.as_log().log(action, message_key, args)
    }

    fn with_screenshot(&self, priority: Priority, session: &dyn BrowserSession) -> Captured<'_> {
        self.as_log().with_screenshot(priority, session)
    }

    fn with_current_screenshot(&self, priority: Priority, ctx: &ExecutionContext) -> Captured<'_> {
        self.as_log().with_current_screenshot(priority, ctx)
    }

    fn log_assertion_failure(&self, failure: &FailureHandle, ctx: &ExecutionContext) -> Result<bool, LogError> {
        self.as_log().log_assertion_failure(failure, ctx)
    }

    fn log_exception(&self, failure: &FailureHandle, ctx: &ExecutionContext) -> Result<(), LogError> {
        self.as_log().log_exception(failure, ctx)
    }
}

/// A pending log call carrying an optional screenshot.
#[must_use = "a captured screenshot is only stored by calling `log`"]
#[derive(Debug)]
pub struct Captured<'a> {
    logger: Option<&'a EventLogger>,
    screenshot: Option<Screenshot>,
}

impl<'a> Captured<'a> {
    fn inert() -> Self {
        Self {
            logger: None,
            screenshot: None,
        }
    }

    /// Returns `true` if a screenshot was captured.
    pub fn has_screenshot(&self) -> bool {
        self.screenshot.is_some()
    }

    /// Stores the event together with the captured screenshot.
    pub fn log(self, action: EventAction, message_key: &str, args: &[&dyn Display]) -> Result<(), LogError> {
        match self.logger {
            Some(logger) => logger.emit(logger.priority, action, message_key, args, self.screenshot),
            None => Ok(()),
        }
    }

    fn log_at(
        self,
        priority: Priority,
        action: EventAction,
        message_key: &str,
        args: &[&dyn Display],
    ) -> Result<(), LogError> {
        match self.logger {
            Some(logger) => logger.emit(priority, action, message_key, args, self.screenshot),
            None => Ok(()),
        }
    }
}
