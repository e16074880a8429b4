use webtrail_events::EventStore;
use webtrail_types::RunId;

use crate::error::ReportError;
use crate::synthesizer::{ReportSummary, ReportSynthesizer};

/// Something that turns a finished run into a report.
///
/// The harness runs every registered reporter after closing the store.
pub trait LogReporter: Send {
    /// Short name used in log output.
    fn name(&self) -> &str;

    /// Builds the report for `run` from the records in `store`.
    fn create_report(&self, store: &dyn EventStore, run: &RunId) -> Result<ReportSummary, ReportError>;
}

impl LogReporter for ReportSynthesizer {
    fn name(&self) -> &str {
        "markdown"
    }

    fn create_report(&self, store: &dyn EventStore, run: &RunId) -> Result<ReportSummary, ReportError> {
        self.synthesize(store, run)
    }
}
