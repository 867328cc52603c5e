//! Scripted in-memory rendering engine.
//!
//! `FixtureEngine` behaves like a browser whose pages are declared up front:
//! which elements exist, how long loads take, and which operations fail.
//! Captures are deterministic byte strings derived from the page URL, the
//! session's device profile, and the capture target, so results can be
//! compared byte for byte.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use url::Url;

use super::session::DIALOG_SUPPRESSION_SCRIPT;
use super::{CaptureTarget, EngineError, RenderEngine, SessionConfig, WaitStrategy};
use crate::job::DeviceProfile;
use crate::selector::Locator;

/// Declared content and behaviour of one URL.
#[derive(Debug, Clone, Default)]
pub struct FixturePage {
    elements: Vec<Locator>,
    canvases: Vec<Locator>,
    frames: Vec<Locator>,
    navigation_failures: usize,
    load_delay: Duration,
    idle_delay: Duration,
    capture_delay: Duration,
    script_error: Option<String>,
}

impl FixturePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_element(mut self, locator: Locator) -> Self {
        self.elements.push(locator);
        self
    }

    pub fn with_canvas(mut self, locator: Locator) -> Self {
        self.canvases.push(locator);
        self
    }

    pub fn with_frame(mut self, locator: Locator) -> Self {
        self.frames.push(locator);
        self
    }

    /// The first `count` navigations to this page fail.
    pub fn with_navigation_failures(mut self, count: usize) -> Self {
        self.navigation_failures = count;
        self
    }

    /// Every navigation to this page fails.
    pub fn unreachable(self) -> Self {
        self.with_navigation_failures(usize::MAX)
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    pub fn with_idle_delay(mut self, delay: Duration) -> Self {
        self.idle_delay = delay;
        self
    }

    pub fn with_capture_delay(mut self, delay: Duration) -> Self {
        self.capture_delay = delay;
        self
    }

    /// User scripts evaluated on this page throw `message`.
    pub fn with_script_error(mut self, message: impl Into<String>) -> Self {
        self.script_error = Some(message.into());
        self
    }
}

/// Handle to a fixture session.
#[derive(Debug)]
pub struct FixtureSession {
    id: u64,
}

impl FixtureSession {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Handle to a located fixture element.
#[derive(Debug, Clone)]
pub struct FixtureElement {
    locator: Locator,
    canvas: bool,
}

/// Blocks navigation to one URL until opened.
#[derive(Debug, Clone)]
pub struct FixtureGate {
    permits: Arc<Semaphore>,
}

impl FixtureGate {
    /// Lets every pending and future navigation through.
    pub fn open(&self) {
        self.permits.add_permits(1 << 20);
    }
}

/// Counters describing how the engine has been used.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixtureStats {
    pub sessions_created: usize,
    pub sessions_closed: usize,
    pub live_sessions: usize,
    pub double_closes: usize,
    pub configure_calls: usize,
    pub navigations: usize,
    pub peak_concurrent_navigations: usize,
}

#[derive(Debug, Default)]
struct SessionState {
    profile: Option<DeviceProfile>,
    url: Option<Url>,
}

#[derive(Default)]
struct FixtureInner {
    pages: Mutex<HashMap<String, FixturePage>>,
    gates: Mutex<HashMap<String, FixtureGate>>,
    sessions: Mutex<HashMap<u64, SessionState>>,
    navigation_log: Mutex<Vec<(u64, Url)>>,
    scripts: Mutex<Vec<String>>,
    next_id: AtomicU64,
    created: AtomicUsize,
    closed: AtomicUsize,
    double_closes: AtomicUsize,
    configured: AtomicUsize,
    active_navigations: AtomicUsize,
    peak_navigations: AtomicUsize,
    canvas_export: AtomicBool,
    refuse_sessions: AtomicBool,
}

/// In-memory [`RenderEngine`] with declared pages.
#[derive(Clone, Default)]
pub struct FixtureEngine {
    inner: Arc<FixtureInner>,
}

impl FixtureEngine {
    /// Creates an engine where every URL is an empty, instantly loading page
    /// and canvas export is supported.
    pub fn new() -> Self {
        let engine = Self::default();
        engine.inner.canvas_export.store(true, Ordering::SeqCst);
        engine
    }

    /// Declares the page served at `url`.
    pub fn with_page(self, url: &str, page: FixturePage) -> Self {
        self.inner.pages.lock().insert(page_key(url), page);
        self
    }

    /// Disables raw canvas pixel export.
    pub fn without_canvas_export(self) -> Self {
        self.inner.canvas_export.store(false, Ordering::SeqCst);
        self
    }

    /// Makes `new_session` fail until called again with `false`.
    pub fn refuse_sessions(&self, refuse: bool) {
        self.inner.refuse_sessions.store(refuse, Ordering::SeqCst);
    }

    /// Returns a closed gate that holds navigations to `url` until opened.
    pub fn gate(&self, url: &str) -> FixtureGate {
        let gate = FixtureGate {
            permits: Arc::new(Semaphore::new(0)),
        };
        self.inner.gates.lock().insert(page_key(url), gate.clone());
        gate
    }

    /// URLs in the order navigation to them began.
    pub fn navigation_order(&self) -> Vec<String> {
        self.inner
            .navigation_log
            .lock()
            .iter()
            .map(|(_, url)| url.to_string())
            .collect()
    }

    /// Ids of sessions that navigated to `url`, in order.
    pub fn sessions_for(&self, url: &str) -> Vec<u64> {
        let key = page_key(url);
        self.inner
            .navigation_log
            .lock()
            .iter()
            .filter(|(_, u)| u.as_str() == key)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Whether a session is still open.
    pub fn is_live(&self, session_id: u64) -> bool {
        self.inner.sessions.lock().contains_key(&session_id)
    }

    /// Scripts evaluated so far, in order.
    pub fn evaluated_scripts(&self) -> Vec<String> {
        self.inner.scripts.lock().clone()
    }

    pub fn stats(&self) -> FixtureStats {
        FixtureStats {
            sessions_created: self.inner.created.load(Ordering::SeqCst),
            sessions_closed: self.inner.closed.load(Ordering::SeqCst),
            live_sessions: self.inner.sessions.lock().len(),
            double_closes: self.inner.double_closes.load(Ordering::SeqCst),
            configure_calls: self.inner.configured.load(Ordering::SeqCst),
            navigations: self.inner.navigation_log.lock().len(),
            peak_concurrent_navigations: self.inner.peak_navigations.load(Ordering::SeqCst),
        }
    }

    fn page(&self, url: &Url) -> FixturePage {
        self.inner
            .pages
            .lock()
            .get(url.as_str())
            .cloned()
            .unwrap_or_default()
    }

    fn current(&self, session: &FixtureSession) -> Result<(Url, DeviceProfile), EngineError> {
        let sessions = self.inner.sessions.lock();
        let state = sessions
            .get(&session.id)
            .ok_or_else(|| EngineError::SessionClosed(format!("session {}", session.id)))?;
        let url = state
            .url
            .clone()
            .ok_or_else(|| EngineError::Internal("no page loaded".to_string()))?;
        Ok((url, state.profile.clone().unwrap_or_default()))
    }

    fn ensure_live(&self, session: &FixtureSession) -> Result<(), EngineError> {
        if self.inner.sessions.lock().contains_key(&session.id) {
            Ok(())
        } else {
            Err(EngineError::SessionClosed(format!("session {}", session.id)))
        }
    }
}

fn page_key(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

/// Sleeps for `delay`, failing if it exceeds `timeout`.
async fn simulate(delay: Duration, timeout: Duration, what: &str) -> Result<(), EngineError> {
    if delay > timeout {
        tokio::time::sleep(timeout).await;
        return Err(EngineError::Timeout(format!("{} exceeded {:?}", what, timeout)));
    }
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    Ok(())
}

fn render(kind: &str, url: &Url, profile: &DeviceProfile, detail: &str) -> Bytes {
    Bytes::from(format!(
        "{}|{}|{}x{}@{}|{}|{}",
        kind,
        url,
        profile.width,
        profile.height,
        profile.device_scale_factor,
        profile.user_agent,
        detail
    ))
}

struct NavigationGuard<'a>(&'a AtomicUsize);

impl Drop for NavigationGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RenderEngine for FixtureEngine {
    type Session = FixtureSession;
    type Element = FixtureElement;

    async fn new_session(&self, config: &SessionConfig) -> Result<FixtureSession, EngineError> {
        if self.inner.refuse_sessions.load(Ordering::SeqCst) {
            return Err(EngineError::Internal("browser unavailable".to_string()));
        }
        if config.accept_downloads {
            return Err(EngineError::Unsupported("downloads".to_string()));
        }
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.inner.sessions.lock().insert(id, SessionState::default());
        self.inner.created.fetch_add(1, Ordering::SeqCst);
        Ok(FixtureSession { id })
    }

    async fn configure(
        &self,
        session: &FixtureSession,
        profile: &DeviceProfile,
    ) -> Result<(), EngineError> {
        let mut sessions = self.inner.sessions.lock();
        let state = sessions
            .get_mut(&session.id)
            .ok_or_else(|| EngineError::SessionClosed(format!("session {}", session.id)))?;
        state.profile = Some(profile.clone());
        self.inner.configured.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn navigate(
        &self,
        session: &FixtureSession,
        url: &Url,
        _wait: WaitStrategy,
        timeout: Duration,
    ) -> Result<(), EngineError> {
        self.ensure_live(session)?;
        self.inner
            .navigation_log
            .lock()
            .push((session.id, url.clone()));

        let active = self.inner.active_navigations.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak_navigations.fetch_max(active, Ordering::SeqCst);
        let _guard = NavigationGuard(&self.inner.active_navigations);

        let gate = self.inner.gates.lock().get(url.as_str()).cloned();
        if let Some(gate) = gate {
            match tokio::time::timeout(timeout, gate.permits.acquire()).await {
                Ok(Ok(_permit)) => {}
                Ok(Err(_)) => return Err(EngineError::Internal("gate closed".to_string())),
                Err(_) => {
                    return Err(EngineError::Timeout(format!("navigation exceeded {:?}", timeout)))
                }
            }
        }

        let failing = {
            let mut pages = self.inner.pages.lock();
            match pages.get_mut(url.as_str()) {
                Some(page) if page.navigation_failures > 0 => {
                    if page.navigation_failures != usize::MAX {
                        page.navigation_failures -= 1;
                    }
                    true
                }
                _ => false,
            }
        };
        if failing {
            return Err(EngineError::Navigation(format!("net::ERR_CONNECTION_REFUSED at {}", url)));
        }

        let page = self.page(url);
        simulate(page.load_delay, timeout, "navigation").await?;

        let mut sessions = self.inner.sessions.lock();
        let state = sessions
            .get_mut(&session.id)
            .ok_or_else(|| EngineError::SessionClosed(format!("session {}", session.id)))?;
        state.url = Some(url.clone());
        Ok(())
    }

    async fn wait_for(
        &self,
        session: &FixtureSession,
        wait: WaitStrategy,
        timeout: Duration,
    ) -> Result<(), EngineError> {
        let (url, _) = self.current(session)?;
        if wait == WaitStrategy::NetworkIdle {
            simulate(self.page(&url).idle_delay, timeout, "network idle").await?;
        }
        Ok(())
    }

    async fn query(
        &self,
        session: &FixtureSession,
        locator: &Locator,
        _timeout: Duration,
    ) -> Result<Option<FixtureElement>, EngineError> {
        let (url, _) = self.current(session)?;
        let page = self.page(&url);
        if page.canvases.contains(locator) {
            return Ok(Some(FixtureElement {
                locator: locator.clone(),
                canvas: true,
            }));
        }
        if page.elements.contains(locator) || page.frames.contains(locator) {
            return Ok(Some(FixtureElement {
                locator: locator.clone(),
                canvas: false,
            }));
        }
        Ok(None)
    }

    async fn scroll_into_view(
        &self,
        session: &FixtureSession,
        _element: &FixtureElement,
    ) -> Result<(), EngineError> {
        self.ensure_live(session)
    }

    async fn evaluate(
        &self,
        session: &FixtureSession,
        script: &str,
    ) -> Result<serde_json::Value, EngineError> {
        let (url, _) = self.current(session)?;
        self.inner.scripts.lock().push(script.to_string());
        if script != DIALOG_SUPPRESSION_SCRIPT {
            if let Some(message) = self.page(&url).script_error {
                return Err(EngineError::Script(message));
            }
        }
        Ok(serde_json::Value::Null)
    }

    async fn capture(
        &self,
        session: &FixtureSession,
        target: CaptureTarget<'_, FixtureElement>,
        full_page: bool,
    ) -> Result<Bytes, EngineError> {
        let (url, profile) = self.current(session)?;
        let page = self.page(&url);
        if !page.capture_delay.is_zero() {
            tokio::time::sleep(page.capture_delay).await;
        }
        let detail = match target {
            CaptureTarget::Page => format!("page full={}", full_page),
            CaptureTarget::Frame(frame) => format!("frame {:?} full={}", frame.locator, full_page),
            CaptureTarget::Element(element) => format!("element {:?}", element.locator),
        };
        Ok(render("png", &url, &profile, &detail))
    }

    async fn capture_canvas(
        &self,
        session: &FixtureSession,
        canvas: &FixtureElement,
    ) -> Result<Bytes, EngineError> {
        let (url, profile) = self.current(session)?;
        if !canvas.canvas {
            return Err(EngineError::Unsupported("element is not a canvas".to_string()));
        }
        if !self.inner.canvas_export.load(Ordering::SeqCst) {
            return Err(EngineError::Unsupported("canvas export disabled".to_string()));
        }
        Ok(render("canvas", &url, &profile, &format!("{:?}", canvas.locator)))
    }

    async fn close(&self, session: FixtureSession) -> Result<(), EngineError> {
        if self.inner.sessions.lock().remove(&session.id).is_none() {
            self.inner.double_closes.fetch_add(1, Ordering::SeqCst);
            return Err(EngineError::SessionClosed(format!("session {}", session.id)));
        }
        self.inner.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
