//! Device presets and the effective emulation profile of a job.
//!
//! A job names a device class (`pc`, `phone`, `tablet`, or `custom`) which
//! supplies baseline viewport, scale factor, and user agent. Explicit
//! overrides from the request are applied on top by the validator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Desktop Chrome user agent used by the `pc` preset.
pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/98.0.4758.102 Safari/537.36";

/// iPhone Safari user agent used by the `phone` preset.
pub const PHONE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 15_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Mobile/15E148 Safari/604.1";

/// iPad Safari user agent used by the `tablet` preset.
pub const TABLET_USER_AGENT: &str = "Mozilla/5.0 (iPad; CPU OS 15_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.0 Mobile/15E148 Safari/604.1";

/// Device class requested by a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Desktop browser, 1920x1080.
    #[default]
    Pc,
    /// Phone-sized touch device, 390x844 at 3x.
    Phone,
    /// Tablet-sized touch device, 1024x1366 at 2x.
    Tablet,
    /// Desktop baseline, intended to be paired with explicit dimensions.
    Custom,
}

impl DeviceKind {
    /// Returns the baseline profile for this device class.
    pub fn preset(self) -> DeviceProfile {
        match self {
            Self::Pc | Self::Custom => DeviceProfile {
                width: 1920,
                height: 1080,
                device_scale_factor: 1.0,
                is_mobile: false,
                has_touch: false,
                user_agent: DESKTOP_USER_AGENT.to_string(),
            },
            Self::Phone => DeviceProfile {
                width: 390,
                height: 844,
                device_scale_factor: 3.0,
                is_mobile: true,
                has_touch: true,
                user_agent: PHONE_USER_AGENT.to_string(),
            },
            Self::Tablet => DeviceProfile {
                width: 1024,
                height: 1366,
                device_scale_factor: 2.0,
                is_mobile: true,
                has_touch: true,
                user_agent: TABLET_USER_AGENT.to_string(),
            },
        }
    }

    /// Returns the lowercase name of this device class.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pc => "pc",
            Self::Phone => "phone",
            Self::Tablet => "tablet",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a device name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown device '{0}'")]
pub struct UnknownDevice(pub String);

impl FromStr for DeviceKind {
    type Err = UnknownDevice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pc" => Ok(Self::Pc),
            "phone" => Ok(Self::Phone),
            "tablet" => Ok(Self::Tablet),
            "custom" => Ok(Self::Custom),
            _ => Err(UnknownDevice(s.to_string())),
        }
    }
}

/// Effective emulation parameters a rendering session must match exactly
/// before navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
    pub is_mobile: bool,
    pub has_touch: bool,
    pub user_agent: String,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        DeviceKind::Pc.preset()
    }
}
