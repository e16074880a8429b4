//! Browser sessions as a screenshot capability.

use std::sync::{Arc, PoisonError, RwLock};

use webtrail_events::Screenshot;

/// Errors a session can raise while capturing a screenshot.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// Reading or transferring the screenshot failed.
    #[error("screenshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The driver rejected the request.
    #[error("driver failed to take screenshot: {0}")]
    Driver(String),
}

/// The part of a browser session the event pipeline needs.
pub trait BrowserSession: Send + Sync {
    /// Renders the current page as PNG bytes, or `Ok(None)` if the driver
    /// cannot render images.
    fn capture_image(&self) -> Result<Option<Vec<u8>>, CaptureError>;

    /// Returns the markup of the current page, or `Ok(None)` if unavailable.
    fn capture_markup(&self) -> Result<Option<String>, CaptureError> {
        Ok(None)
    }
}

/// Takes a screenshot, preferring an image and falling back to markup.
///
/// Failures never propagate: the event is still logged, just without a
/// screenshot.
pub(crate) fn capture(session: &dyn BrowserSession) -> Option<Screenshot> {
    let attempt = match session.capture_image() {
        Ok(Some(bytes)) => return Some(Screenshot::png(bytes)),
        Ok(None) => session.capture_markup(),
        Err(e) => Err(e),
    };

    match attempt {
        Ok(Some(markup)) => Some(Screenshot::html(markup)),
        Ok(None) => {
            tracing::warn!("the current session doesn't make screenshots");
            None
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to capture screenshot");
            None
        }
    }
}

/// Per-test execution state passed explicitly to logger calls that need the
/// active browser session.
#[derive(Default)]
pub struct ExecutionContext {
    session: RwLock<Option<Arc<dyn BrowserSession>>>,
}

impl ExecutionContext {
    /// Creates a context without a session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context whose current session is `session`.
    pub fn with_session(session: Arc<dyn BrowserSession>) -> Self {
        Self {
            session: RwLock::new(Some(session)),
        }
    }

    /// Makes `session` the current session.
    pub fn set_session(&self, session: Arc<dyn BrowserSession>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    /// Removes and returns the current session.
    pub fn clear_session(&self) -> Option<Arc<dyn BrowserSession>> {
        self.session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Returns the current session, if any.
    pub fn current_session(&self) -> Option<Arc<dyn BrowserSession>> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("has_session", &self.current_session().is_some())
            .finish()
    }
}
