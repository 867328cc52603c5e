//! Canonical, immutable job specifications.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use super::device::{DeviceKind, DeviceProfile};
use crate::selector::SelectorDescriptor;

/// Default fixed wait after navigation.
pub const DEFAULT_WAIT_TIME: Duration = Duration::from_secs(1);

/// Default whole-pipeline timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// A validated screenshot request.
///
/// Built only by [`super::validate`]; the scheduler never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSpec {
    pub url: Url,
    pub device: DeviceKind,
    /// Preset values with explicit overrides already applied.
    pub profile: DeviceProfile,
    pub selector: Option<SelectorDescriptor>,
    pub full_page: bool,
    #[serde(with = "secs_f64")]
    pub wait_time: Duration,
    #[serde(with = "secs_f64")]
    pub timeout: Duration,
    pub wait_for_resources: bool,
    pub script: Option<String>,
}

impl JobSpec {
    /// Minimal page-level spec for `url` with every other field defaulted.
    pub fn for_url(url: Url) -> Self {
        Self {
            url,
            device: DeviceKind::Pc,
            profile: DeviceKind::Pc.preset(),
            selector: None,
            full_page: false,
            wait_time: DEFAULT_WAIT_TIME,
            timeout: DEFAULT_TIMEOUT,
            wait_for_resources: false,
            script: None,
        }
    }

    pub fn with_selector(mut self, selector: SelectorDescriptor) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_full_page(mut self, full_page: bool) -> Self {
        self.full_page = full_page;
        self
    }

    pub fn with_wait_for_resources(mut self, wait: bool) -> Self {
        self.wait_for_resources = wait;
        self
    }

    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }
}

/// Raw, unvalidated request fields as received from the request layer.
///
/// Every field is optional; empty strings and zero dimensions are treated
/// as absent during validation.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RawRequest {
    pub url: Option<String>,
    pub device: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(alias = "user_agent")]
    pub ua: Option<String>,
    pub element_type: Option<String>,
    pub element_name: Option<String>,
    pub element_value: Option<String>,
    pub full_page: Option<bool>,
    pub wait_time: Option<f64>,
    pub timeout: Option<f64>,
    pub wait_for_resources: Option<bool>,
    pub script: Option<String>,
}

impl RawRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }
}

mod secs_f64 {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }
}
