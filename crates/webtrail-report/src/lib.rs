//! Report generation for recorded test runs.
//!
//! [`ReportSynthesizer`] replays a run's records and writes, per test, a
//! markdown narrative and the screenshots attached to the records:
//!
//! ```text
//! <root>/<run>/<class>/<method>/report.md
//! <root>/<run>/<class>/<method>/<id>.<method>_<argument>.png
//! ```
//!
//! Messages are rendered from the record's message key through a
//! [`MessageCatalog`]. Screenshots of failed assertions are always written,
//! whatever the configured minimum priority.

mod catalog;
mod error;
mod outcome;
mod reporter;
mod settings;
mod synthesizer;

pub use catalog::{MessageCatalog, ROOT_LOCALE};
pub use error::{CatalogError, ReportError};
pub use outcome::{outcomes, TestResult};
pub use reporter::LogReporter;
pub use settings::ReportSettings;
pub use synthesizer::{sanitize, ReportSummary, ReportSynthesizer, NARRATIVE_FILE};
