//! Request validation.
//!
//! Normalizes a [`RawRequest`] into a [`JobSpec`], failing fast on malformed
//! input so that no job is ever created from it.

use std::time::Duration;

use thiserror::Error;
use tracing::warn;
use url::Url;

use super::device::DeviceKind;
use super::spec::{JobSpec, RawRequest, DEFAULT_TIMEOUT, DEFAULT_WAIT_TIME};
use crate::config::MAX_JOB_DURATION_SECS;
use crate::selector::{self, ResolveError, SelectorDescriptor, SelectorKind};

/// Reasons a raw request is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("url is required")]
    MissingUrl,

    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported url scheme '{0}', expected http or https")]
    UnsupportedScheme(String),

    #[error("element_type '{0}' was given without element_value")]
    MissingElementValue(String),

    #[error("element_value was given without element_type")]
    MissingElementType,

    #[error("unsupported element_type '{0}'")]
    UnknownElementType(String),

    #[error(transparent)]
    Selector(#[from] ResolveError),

    #[error(
        "timeout must be a positive number of seconds up to {max}, got {0}",
        max = MAX_JOB_DURATION_SECS
    )]
    InvalidTimeout(f64),

    #[error(
        "wait_time must be between 0 and {max} seconds, got {0}",
        max = MAX_JOB_DURATION_SECS
    )]
    InvalidWaitTime(f64),
}

/// Validates a raw request and builds the canonical job specification.
///
/// Device preset values are applied first, then explicit width, height, and
/// user agent overrides on top. An explicit width forces a scale factor of 1.
pub fn validate(raw: &RawRequest) -> Result<JobSpec, ValidationError> {
    let url = parse_url(present(&raw.url))?;

    let device = match present(&raw.device) {
        None => DeviceKind::default(),
        Some(name) => name.parse().unwrap_or_else(|e| {
            warn!(device = name, error = %e, "Unknown device, using pc preset");
            DeviceKind::Pc
        }),
    };

    let mut profile = device.preset();
    if let Some(width) = raw.width.filter(|w| *w > 0) {
        profile.width = width;
        profile.device_scale_factor = 1.0;
    }
    if let Some(height) = raw.height.filter(|h| *h > 0) {
        profile.height = height;
    }
    if let Some(ua) = present(&raw.ua) {
        profile.user_agent = ua.to_string();
    }

    let selector = selector_descriptor(raw)?;
    selector::resolve(selector.as_ref())?;

    let timeout = match raw.timeout {
        None => DEFAULT_TIMEOUT,
        Some(secs) if secs > 0.0 => {
            bounded_duration(secs).ok_or(ValidationError::InvalidTimeout(secs))?
        }
        Some(secs) => return Err(ValidationError::InvalidTimeout(secs)),
    };
    let wait_time = match raw.wait_time {
        None => DEFAULT_WAIT_TIME,
        Some(secs) => bounded_duration(secs).ok_or(ValidationError::InvalidWaitTime(secs))?,
    };

    Ok(JobSpec {
        url,
        device,
        profile,
        selector,
        full_page: raw.full_page.unwrap_or(false),
        wait_time,
        timeout,
        wait_for_resources: raw.wait_for_resources.unwrap_or(false),
        script: present(&raw.script).map(str::to_string),
    })
}

/// Converts seconds to a duration, rejecting negative, non-finite, and
/// over-ceiling values.
fn bounded_duration(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| *d <= Duration::from_secs(MAX_JOB_DURATION_SECS))
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_url(url: Option<&str>) -> Result<Url, ValidationError> {
    let raw = url.ok_or(ValidationError::MissingUrl)?;
    let parsed = Url::parse(raw).map_err(|e| ValidationError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ValidationError::UnsupportedScheme(other.to_string())),
    }
}

fn selector_descriptor(raw: &RawRequest) -> Result<Option<SelectorDescriptor>, ValidationError> {
    match (present(&raw.element_type), present(&raw.element_value)) {
        (None, None) => Ok(None),
        (Some(kind), None) => Err(ValidationError::MissingElementValue(kind.to_string())),
        (None, Some(_)) => Err(ValidationError::MissingElementType),
        (Some(kind), Some(value)) => {
            let kind: SelectorKind = kind
                .parse()
                .map_err(|_| ValidationError::UnknownElementType(kind.to_string()))?;
            let name = if kind.requires_name() {
                present(&raw.element_name).map(str::to_string)
            } else {
                None
            };
            Ok(Some(SelectorDescriptor {
                kind,
                name,
                value: value.to_string(),
            }))
        }
    }
}
