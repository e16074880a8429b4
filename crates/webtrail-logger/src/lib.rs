//! Priority-filtered event loggers.
//!
//! Call sites obtain a logger from an [`EventLoggerFactory`] for a fixed
//! `(source, group, item)` and severity tier. The factory consults the
//! [`PriorityConfiguration`] once:
//!
//! - below the resolved log threshold it hands out a [`NullLogger`], so the
//!   call never reaches the store;
//! - otherwise it hands out an [`EventLogger`] that remembers the resolved
//!   screenshot threshold for later [`EventLog::with_screenshot`] calls.
//!
//! # Usage
//!
//! ```rust,ignore
//! use webtrail_logger::{EventLog, EventPipeline, PriorityConfiguration};
//! use webtrail_types::{EventAction, EventSource, Priority};
//!
//! let pipeline = EventPipeline::new(run, Arc::new(priorities), store);
//! let factory = pipeline.factory(EventSource::Page);
//!
//! factory
//!     .on_doku("LoginPage", "submit")?
//!     .with_screenshot(Priority::Documentation, session.as_ref())
//!     .log(EventAction::ElementClick, "element.click", &[&"Sign in"])?;
//! ```

mod error;
mod factory;
mod logger;
mod priorities;
mod registry;
mod session;

pub use error::{LogError, LoggerError};
pub use factory::{EventLoggerFactory, EventPipeline};
pub use logger::{Captured, EventLog, EventLogger, Logger, NullLogger};
pub use priorities::{priority_key, PriorityConfiguration};
pub use registry::{AssertionFailure, FailureHandle, FailureRegistry};
pub use session::{BrowserSession, CaptureError, ExecutionContext};
