//! Declarative selector descriptors as supplied by a request.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The closed set of selector kinds a request may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorKind {
    Id,
    Class,
    Name,
    Tag,
    Css,
    Xpath,
    Text,
    Attr,
    Data,
    Canvas,
    Iframe,
}

impl SelectorKind {
    /// Every selector kind, in declaration order.
    pub const ALL: [SelectorKind; 11] = [
        Self::Id,
        Self::Class,
        Self::Name,
        Self::Tag,
        Self::Css,
        Self::Xpath,
        Self::Text,
        Self::Attr,
        Self::Data,
        Self::Canvas,
        Self::Iframe,
    ];

    /// Returns the request-level name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Class => "class",
            Self::Name => "name",
            Self::Tag => "tag",
            Self::Css => "css",
            Self::Xpath => "xpath",
            Self::Text => "text",
            Self::Attr => "attr",
            Self::Data => "data",
            Self::Canvas => "canvas",
            Self::Iframe => "iframe",
        }
    }

    /// Whether this kind needs an accompanying attribute name.
    pub fn requires_name(self) -> bool {
        matches!(self, Self::Attr | Self::Data)
    }
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an element type is outside the supported set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown element type '{0}'")]
pub struct UnknownSelectorKind(pub String);

impl FromStr for SelectorKind {
    type Err = UnknownSelectorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lowered)
            .ok_or_else(|| UnknownSelectorKind(s.to_string()))
    }
}

/// Kind, optional attribute name, and value identifying a target element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorDescriptor {
    pub kind: SelectorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub value: String,
}

impl SelectorDescriptor {
    /// Creates a descriptor without an attribute name.
    pub fn new(kind: SelectorKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            name: None,
            value: value.into(),
        }
    }

    /// Sets the attribute name used by `attr` and `data` kinds.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}
