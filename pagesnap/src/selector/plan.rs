//! Engine-agnostic locate plans.

use std::fmt;

use serde::Serialize;

/// How the engine should find an element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "strategy", content = "query", rename_all = "snake_case")]
pub enum Locator {
    /// A CSS selector.
    Css(String),
    /// An XPath expression.
    XPath(String),
    /// Elements whose text content equals the value exactly.
    ExactText(String),
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(query) => write!(f, "css `{}`", query),
            Self::XPath(query) => write!(f, "xpath `{}`", query),
            Self::ExactText(text) => write!(f, "text \"{}\"", text),
        }
    }
}

/// Document the rest of the plan operates on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", content = "frame", rename_all = "snake_case")]
pub enum FrameScope {
    /// The top-level page.
    TopLevel,
    /// The document of the frame element matched by the locator.
    Frame(Locator),
}

/// What gets captured inside the scoped document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "target", content = "locator", rename_all = "snake_case")]
pub enum Target {
    /// The viewport, or the full scrollable page when the job asks for it.
    Document,
    /// A single element, the first visible match of the locator.
    Element(Locator),
}

/// How pixels are obtained for the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Standard screenshot of the target.
    Screenshot,
    /// Raw pixel export of a canvas element, falling back to a screenshot
    /// when the engine cannot export canvas contents.
    CanvasPixels,
}

/// Executable instruction derived from a selector descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocatePlan {
    pub scope: FrameScope,
    pub target: Target,
    pub capture: CaptureMode,
}

impl LocatePlan {
    /// Plan for a page-level capture with no selector.
    pub fn page() -> Self {
        Self {
            scope: FrameScope::TopLevel,
            target: Target::Document,
            capture: CaptureMode::Screenshot,
        }
    }

    /// Plan for a screenshot of one element on the top-level page.
    pub fn element(locator: Locator) -> Self {
        Self {
            scope: FrameScope::TopLevel,
            target: Target::Element(locator),
            capture: CaptureMode::Screenshot,
        }
    }

    /// Whether this plan captures the whole document rather than an element.
    pub fn is_page_level(&self) -> bool {
        matches!(self.target, Target::Document)
    }
}
