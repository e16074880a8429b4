//! Per-test outcomes derived from start and terminal records.

use chrono::{DateTime, Utc};
use webtrail_events::EventStore;
use webtrail_types::{EventAction, RunId};

use crate::error::ReportError;

/// How one test of a run ended.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    /// Test class.
    pub group: String,
    /// Test method.
    pub item: String,
    /// Timestamp of the start record.
    pub started_at: DateTime<Utc>,
    /// The terminal action, or `None` if the test never finished.
    pub outcome: Option<EventAction>,
    /// Timestamp of the terminal record, if any.
    pub finished_at: Option<DateTime<Utc>>,
}

impl TestResult {
    /// Returns `true` if the test finished with failures or an error.
    pub fn failed(&self) -> bool {
        self.outcome.as_ref().is_some_and(EventAction::is_failure_outcome)
    }

    /// Returns `true` if the test finished successfully.
    pub fn passed(&self) -> bool {
        self.outcome == Some(EventAction::TestFinished)
    }
}

/// Lists every test of `run` with its outcome, in start order.
///
/// Only milestone records are read, so this stays cheap for runs with many
/// screenshots.
pub fn outcomes(store: &dyn EventStore, run: &RunId) -> Result<Vec<TestResult>, ReportError> {
    let mut results: Vec<TestResult> = Vec::new();
    let mut open: Option<usize> = None;

    for record in store.read_milestones(run)? {
        let record = record?;
        if record.action.is_test_start() {
            results.push(TestResult {
                group: record.group,
                item: record.item,
                started_at: record.ts,
                outcome: None,
                finished_at: None,
            });
            open = Some(results.len() - 1);
        } else if record.action.is_terminal() {
            match open.take().and_then(|i| results.get_mut(i)) {
                Some(result) => {
                    result.outcome = Some(record.action);
                    result.finished_at = Some(record.ts);
                }
                None => tracing::debug!(
                    action = %record.action,
                    group = %record.group,
                    item = %record.item,
                    "terminal record without a started test"
                ),
            }
        }
    }

    Ok(results)
}
