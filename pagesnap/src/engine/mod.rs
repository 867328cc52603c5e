//! Rendering engine abstraction.
//!
//! The browser itself is an external capability. The scheduler and pool
//! depend only on the [`RenderEngine`] trait defined here: create and close
//! sessions, match a session to a device profile, navigate, wait, query,
//! evaluate script, and capture pixels.
//!
//! [`FixtureEngine`] is a scripted in-memory implementation used by tests
//! and dry runs.

mod fixture;
mod session;

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use url::Url;

use crate::job::DeviceProfile;
use crate::selector::Locator;

pub use fixture::{
    FixtureElement, FixtureEngine, FixtureGate, FixturePage, FixtureSession, FixtureStats,
};
pub use session::{SessionConfig, DIALOG_SUPPRESSION_SCRIPT, INIT_SCRIPT, LAUNCH_ARGS};

/// Errors reported by a rendering engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The page could not be loaded.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// The engine gave up waiting on its own timeout.
    #[error("engine operation timed out: {0}")]
    Timeout(String),

    /// The requested operation is not available for this target.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Script evaluation threw.
    #[error("script error: {0}")]
    Script(String),

    /// The session is gone (crashed or closed).
    #[error("session closed: {0}")]
    SessionClosed(String),

    /// Any other engine failure.
    #[error("engine failure: {0}")]
    Internal(String),
}

/// Load milestone a navigation or wait call should reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    DomContentLoaded,
    Load,
    NetworkIdle,
}

/// What a capture call should photograph.
#[derive(Debug)]
pub enum CaptureTarget<'a, E> {
    /// The current top-level page.
    Page,
    /// The document inside a frame element; the engine switches into the
    /// frame's rendering context before capturing.
    Frame(&'a E),
    /// A single element.
    Element(&'a E),
}

/// External rendering capability.
///
/// Every operation takes an explicit timeout or is expected to be bounded by
/// the caller. Sessions are exclusively owned by whoever holds them; the
/// engine never shares a session between callers.
pub trait RenderEngine: Send + Sync + 'static {
    /// Opaque handle to one browser context/page.
    type Session: Send + Sync + 'static;
    /// Opaque handle to a located element.
    type Element: Send + Sync + 'static;

    /// Creates a session with the baseline configuration.
    fn new_session(
        &self,
        config: &SessionConfig,
    ) -> impl Future<Output = Result<Self::Session, EngineError>> + Send;

    /// Reconfigures viewport, scale factor, touch/mobile flags and user agent
    /// so the session exactly matches `profile`.
    fn configure(
        &self,
        session: &Self::Session,
        profile: &DeviceProfile,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Navigates to `url` and waits for the given milestone.
    fn navigate(
        &self,
        session: &Self::Session,
        url: &Url,
        wait: WaitStrategy,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Waits for a load milestone on the current page.
    fn wait_for(
        &self,
        session: &Self::Session,
        wait: WaitStrategy,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Returns the first visible element matching `locator`, waiting up to
    /// `timeout` for one to appear. `Ok(None)` means nothing matched.
    fn query(
        &self,
        session: &Self::Session,
        locator: &Locator,
        timeout: Duration,
    ) -> impl Future<Output = Result<Option<Self::Element>, EngineError>> + Send;

    /// Scrolls an element into the viewport.
    fn scroll_into_view(
        &self,
        session: &Self::Session,
        element: &Self::Element,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Evaluates a script in the page and returns its JSON result.
    fn evaluate(
        &self,
        session: &Self::Session,
        script: &str,
    ) -> impl Future<Output = Result<serde_json::Value, EngineError>> + Send;

    /// Captures an image of the target.
    fn capture(
        &self,
        session: &Self::Session,
        target: CaptureTarget<'_, Self::Element>,
        full_page: bool,
    ) -> impl Future<Output = Result<Bytes, EngineError>> + Send;

    /// Exports the raw pixel content of a canvas element as an image.
    ///
    /// Returns [`EngineError::Unsupported`] when the engine cannot read the
    /// canvas contents directly.
    fn capture_canvas(
        &self,
        session: &Self::Session,
        canvas: &Self::Element,
    ) -> impl Future<Output = Result<Bytes, EngineError>> + Send;

    /// Destroys a session.
    fn close(&self, session: Self::Session) -> impl Future<Output = Result<(), EngineError>> + Send;
}
