//! Test-run integration for the webtrail event pipeline.
//!
//! A [`TestRun`] owns everything one suite run needs: the event database,
//! the thresholds loaded from [`Config`], and the reporters run at shutdown.
//! Each test is wrapped in a [`TestScope`] that records its start and its
//! terminal outcome.
//!
//! ```rust,ignore
//! let config = webtrail_harness::load_config(Some("webtrail.toml"))?;
//! webtrail_harness::init_tracing(&config.logging);
//!
//! let run = TestRun::start(&config)?;
//! let scope = run.begin_test("LoginTest", "logs_in", "LoginTest.logs_in")?;
//! scope.set_session(browser.clone());
//!
//! let mut soft = SoftAssertions::new(&scope);
//! soft.check(page.title() == "Welcome", "title should greet the user")?;
//! let outcome = soft.into_outcome();
//! scope.finish(outcome)?;
//!
//! for report in run.finish() {
//!     report.result?;
//! }
//! ```

pub mod config;
mod error;
mod logging;
mod run;
mod soft;

pub use config::{load_config, Config, ConfigError};
pub use error::HarnessError;
pub use logging::init_tracing;
pub use run::{ReportOutcome, TestOutcome, TestRun, TestScope};
pub use soft::SoftAssertions;
