//! The closed action vocabulary.

use std::borrow::Cow;

use thiserror::Error;

/// What happened.
///
/// The string values are the persisted form; they only appear at the storage
/// boundary. Suites that need their own actions build them with
/// [`EventAction::custom`], which refuses labels of the built-in set, so a
/// persisted label always parses back to the action that wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventAction {
    /// A test started.
    TestStart,
    /// A test finished successfully.
    TestFinished,
    /// A test was skipped.
    TestSkipped,
    /// A test finished with one or more failed assertions.
    TestFinishedWithFailures,
    /// A test was aborted by an unexpected error.
    TestFinishedWithException,
    /// An unexpected error occurred during a test.
    ExceptionOccurred,
    /// An assertion failed.
    AssertionFailed,
    /// A new browser driver instance was created.
    WebdriverCreateInstance,
    /// The browser navigated to a URL.
    WebdriverGet,
    /// The browser driver was shut down.
    WebdriverQuit,
    /// An element was clicked.
    ElementClick,
    /// Keys were sent to an element.
    ElementSendKeys,
    /// A form element was submitted.
    ElementSubmit,
    /// An input element was cleared.
    ElementClear,
    /// An attribute was read from an element.
    ElementGetAttribute,
    /// An option was selected.
    ElementSelect,
    /// A suite-defined action. Never a milestone.
    Custom(CustomAction),
}

/// Label of a suite-defined action, guaranteed not to collide with a
/// built-in one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomAction(String);

impl CustomAction {
    /// Returns the label.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Error returned by [`EventAction::custom`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionLabelError {
    #[error("action label must not be empty")]
    Empty,
    #[error("action label {0:?} is reserved for a built-in action")]
    Reserved(String),
}

const BUILT_IN: [EventAction; 16] = [
    EventAction::TestStart,
    EventAction::TestFinished,
    EventAction::TestSkipped,
    EventAction::TestFinishedWithFailures,
    EventAction::TestFinishedWithException,
    EventAction::ExceptionOccurred,
    EventAction::AssertionFailed,
    EventAction::WebdriverCreateInstance,
    EventAction::WebdriverGet,
    EventAction::WebdriverQuit,
    EventAction::ElementClick,
    EventAction::ElementSendKeys,
    EventAction::ElementSubmit,
    EventAction::ElementClear,
    EventAction::ElementGetAttribute,
    EventAction::ElementSelect,
];

impl EventAction {
    /// Returns the persisted label of this action.
    pub fn as_str(&self) -> &str {
        match self {
            Self::TestStart => "TEST_START",
            Self::TestFinished => "TEST_FINISHED",
            Self::TestSkipped => "TEST_SKIPPED",
            Self::TestFinishedWithFailures => "TEST_FINISHED_WITH_FAILURES",
            Self::TestFinishedWithException => "TEST_FINISHED_WITH_EXCEPTION",
            Self::ExceptionOccurred => "TEST_EXCEPTION",
            Self::AssertionFailed => "ASSERTION_FAILED",
            Self::WebdriverCreateInstance => "WEBDRIVER_CREATE_INSTANCE",
            Self::WebdriverGet => "WEBDRIVER_GET",
            Self::WebdriverQuit => "WEBDRIVER_QUIT",
            Self::ElementClick => "ELEMENT_CLICK",
            Self::ElementSendKeys => "ELEMENT_SEND_KEYS",
            Self::ElementSubmit => "ELEMENT_SUBMIT",
            Self::ElementClear => "ELEMENT_CLEAR",
            Self::ElementGetAttribute => "ELEMENT_GET_ATTRIBUTE",
            Self::ElementSelect => "ELEMENT_SELECT",
            Self::Custom(label) => label.as_str(),
        }
    }

    /// Builds a suite-defined action.
    ///
    /// # Errors
    ///
    /// Fails for an empty label or one that names a built-in action.
    pub fn custom(label: impl Into<String>) -> Result<Self, ActionLabelError> {
        let label = label.into();
        if label.is_empty() {
            return Err(ActionLabelError::Empty);
        }
        if built_in(&label).is_some() {
            return Err(ActionLabelError::Reserved(label));
        }
        Ok(Self::Custom(CustomAction(label)))
    }

    /// Parses a persisted label. Labels outside the built-in set become
    /// [`EventAction::Custom`].
    pub fn from_label(label: impl Into<Cow<'static, str>>) -> Self {
        let label = label.into();
        built_in(&label).unwrap_or_else(|| Self::Custom(CustomAction(label.into_owned())))
    }

    /// Returns `true` for the action that opens a test.
    pub fn is_test_start(&self) -> bool {
        matches!(self, Self::TestStart)
    }

    /// Returns `true` for every action that closes a test.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::TestFinished
                | Self::TestSkipped
                | Self::TestFinishedWithFailures
                | Self::TestFinishedWithException
        )
    }

    /// Returns `true` for terminal actions reporting a failed or aborted test.
    pub fn is_failure_outcome(&self) -> bool {
        matches!(
            self,
            Self::TestFinishedWithFailures | Self::TestFinishedWithException
        )
    }
}

fn built_in(label: &str) -> Option<EventAction> {
    BUILT_IN.iter().find(|action| action.as_str() == label).cloned()
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
