//! Job descriptors and request validation.

mod device;
mod id;
mod spec;
mod validate;

pub use device::{
    DeviceKind, DeviceProfile, UnknownDevice, DESKTOP_USER_AGENT, PHONE_USER_AGENT,
    TABLET_USER_AGENT,
};
pub use id::JobId;
pub use spec::{JobSpec, RawRequest, DEFAULT_TIMEOUT, DEFAULT_WAIT_TIME};
pub use validate::{validate, ValidationError};
