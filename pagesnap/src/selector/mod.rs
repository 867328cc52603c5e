//! Selector resolution.
//!
//! Turns a request's selector descriptor (kind, optional name, value) into a
//! [`LocatePlan`]: which document to operate in, what to capture, and how.
//! Resolution is a pure function; the execution stage interprets the plan
//! against a rendering engine.

mod descriptor;
mod plan;
mod resolve;

pub use descriptor::{SelectorDescriptor, SelectorKind, UnknownSelectorKind};
pub use plan::{CaptureMode, FrameScope, LocatePlan, Locator, Target};
pub use resolve::{resolve, ResolveError};
