//! The event record value type.

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use webtrail_types::{EventAction, EventSource, Priority, RunId, ScreenshotKind};

/// Maximum number of positional arguments a record carries.
pub const MAX_ARGUMENTS: usize = 4;

/// Rendered positional arguments, substituted into the message template at
/// report time.
pub type Arguments = [Option<String>; MAX_ARGUMENTS];

static NEXT_THREAD_NUMBER: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_NUMBER: u64 = NEXT_THREAD_NUMBER.fetch_add(1, Ordering::Relaxed);
}

/// Returns a small process-local number identifying the calling thread.
///
/// Numbers are handed out on first use and stay stable for the lifetime of
/// the thread.
pub fn current_thread_number() -> u64 {
    THREAD_NUMBER.with(|n| *n)
}

/// A captured screenshot: rendered image bytes or the page markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    /// How the screenshot was captured.
    pub kind: ScreenshotKind,
    /// The raw payload.
    pub bytes: Vec<u8>,
}

impl Screenshot {
    /// A rendered PNG image.
    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            kind: ScreenshotKind::Png,
            bytes,
        }
    }

    /// The page markup, used when the driver cannot render images.
    pub fn html(markup: String) -> Self {
        Self {
            kind: ScreenshotKind::Html,
            bytes: markup.into_bytes(),
        }
    }
}

/// One occurrence in a test run.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// Store-assigned identity; `None` until the record has been persisted
    /// and read back.
    pub id: Option<i64>,
    /// When the event happened.
    pub ts: DateTime<Utc>,
    /// The thread that produced the event (see [`current_thread_number`]).
    pub thread_id: u64,
    /// The run the event belongs to.
    pub run_id: RunId,
    /// Origin category.
    pub source: EventSource,
    /// Coarse identifier, e.g. the test class or page name.
    pub group: String,
    /// Fine identifier, e.g. the test method or field name.
    pub item: String,
    /// What happened.
    pub action: EventAction,
    /// How important the event is.
    pub priority: Priority,
    /// Message key, resolved to a template when the report is rendered.
    pub description: String,
    /// Up to four rendered positional arguments.
    pub arguments: Arguments,
    /// Optional screenshot payload.
    pub screenshot: Option<Screenshot>,
}

impl EventRecord {
    /// Creates a record stamped with the current time and thread.
    pub fn new(
        run_id: RunId,
        source: EventSource,
        group: impl Into<String>,
        item: impl Into<String>,
        action: EventAction,
        priority: Priority,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            ts: Utc::now(),
            thread_id: current_thread_number(),
            run_id,
            source,
            group: group.into(),
            item: item.into(),
            action,
            priority,
            description: description.into(),
            arguments: Default::default(),
            screenshot: None,
        }
    }

    /// Renders `args` into the argument slots. Arguments past the fourth are
    /// dropped.
    pub fn with_arguments(mut self, args: &[&dyn Display]) -> Self {
        if args.len() > MAX_ARGUMENTS {
            tracing::warn!(
                description = %self.description,
                given = args.len(),
                "event carries more than {MAX_ARGUMENTS} arguments, extra ones are dropped"
            );
        }
        for (slot, arg) in self.arguments.iter_mut().zip(args) {
            *slot = Some(arg.to_string());
        }
        self
    }

    /// Attaches a screenshot, replacing any previous one.
    pub fn with_screenshot(mut self, screenshot: Option<Screenshot>) -> Self {
        self.screenshot = screenshot;
        self
    }

    /// Returns argument `index` (zero-based), if present.
    pub fn argument(&self, index: usize) -> Option<&str> {
        self.arguments.get(index).and_then(|a| a.as_deref())
    }
}
