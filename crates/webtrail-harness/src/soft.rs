//! Soft assertions: failures are reported and collected instead of ending
//! the test at the first one.

use std::sync::Arc;

use webtrail_logger::{AssertionFailure, FailureHandle};

use crate::error::HarnessError;
use crate::run::{TestOutcome, TestScope};

/// Collects assertion failures of one test.
///
/// Each failure is reported through the scope as soon as it happens, so its
/// screenshot shows the page at the time of the check. Reporting the same
/// handles again through [`TestOutcome::Failed`] does not duplicate them.
pub struct SoftAssertions<'a> {
    scope: &'a TestScope,
    failures: Vec<FailureHandle>,
}

impl<'a> SoftAssertions<'a> {
    /// Collects failures for the test of `scope`.
    pub fn new(scope: &'a TestScope) -> Self {
        Self {
            scope,
            failures: Vec::new(),
        }
    }

    /// Runs `check`, recording its failure if it has one. Returns whether the
    /// check passed.
    pub fn verify<F>(&mut self, check: F) -> Result<bool, HarnessError>
    where
        F: FnOnce() -> Result<(), AssertionFailure>,
    {
        match check() {
            Ok(()) => Ok(true),
            Err(failure) => {
                let handle: FailureHandle = Arc::new(failure);
                self.scope.report_assertion_failure(&handle)?;
                self.failures.push(handle);
                Ok(false)
            }
        }
    }

    /// Shorthand for a boolean check with a fixed message.
    pub fn check(&mut self, condition: bool, message: impl Into<String>) -> Result<bool, HarnessError> {
        let message = message.into();
        self.verify(|| {
            if condition {
                Ok(())
            } else {
                Err(AssertionFailure(message))
            }
        })
    }

    /// Failures collected so far, in order.
    pub fn failures(&self) -> &[FailureHandle] {
        &self.failures
    }

    /// `Passed` if every check passed, otherwise `Failed` with all failures.
    pub fn into_outcome(self) -> TestOutcome {
        if self.failures.is_empty() {
            TestOutcome::Passed
        } else {
            TestOutcome::Failed(self.failures)
        }
    }
}
