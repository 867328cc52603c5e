//! Mapping from selector descriptors to locate plans.

use thiserror::Error;

use super::descriptor::{SelectorDescriptor, SelectorKind};
use super::plan::{CaptureMode, FrameScope, LocatePlan, Locator, Target};

/// Errors produced while resolving a selector descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// `attr` or `data` was given without an attribute name.
    #[error("element type '{0}' requires an element name")]
    MissingAttributeName(SelectorKind),

    /// The selector value is empty.
    #[error("element type '{0}' requires a non-empty element value")]
    EmptyValue(SelectorKind),
}

/// Resolves an optional selector descriptor into a locate plan.
///
/// `None` means a page-level capture. This never performs I/O.
pub fn resolve(descriptor: Option<&SelectorDescriptor>) -> Result<LocatePlan, ResolveError> {
    let Some(descriptor) = descriptor else {
        return Ok(LocatePlan::page());
    };

    let value = descriptor.value.as_str();
    if value.trim().is_empty() {
        return Err(ResolveError::EmptyValue(descriptor.kind));
    }

    let plan = match descriptor.kind {
        SelectorKind::Id | SelectorKind::Class | SelectorKind::Name => {
            LocatePlan::element(Locator::Css(attribute_selector(descriptor.kind.as_str(), value)))
        }
        SelectorKind::Tag | SelectorKind::Css => {
            LocatePlan::element(Locator::Css(value.to_string()))
        }
        SelectorKind::Xpath => LocatePlan::element(Locator::XPath(value.to_string())),
        SelectorKind::Text => LocatePlan::element(Locator::ExactText(value.to_string())),
        SelectorKind::Attr => {
            let name = attribute_name(descriptor)?;
            LocatePlan::element(Locator::Css(attribute_selector(name, value)))
        }
        SelectorKind::Data => {
            let name = attribute_name(descriptor)?;
            let attribute = format!("data-{}", name.strip_prefix("data-").unwrap_or(name));
            LocatePlan::element(Locator::Css(attribute_selector(&attribute, value)))
        }
        SelectorKind::Canvas => LocatePlan {
            scope: FrameScope::TopLevel,
            target: Target::Element(Locator::Css(value.to_string())),
            capture: CaptureMode::CanvasPixels,
        },
        SelectorKind::Iframe => LocatePlan {
            scope: FrameScope::Frame(Locator::Css(value.to_string())),
            target: Target::Document,
            capture: CaptureMode::Screenshot,
        },
    };

    Ok(plan)
}

fn attribute_name(descriptor: &SelectorDescriptor) -> Result<&str, ResolveError> {
    descriptor
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or(ResolveError::MissingAttributeName(descriptor.kind))
}

/// Builds `[attribute="value"]` with the value escaped for a quoted CSS string.
fn attribute_selector(attribute: &str, value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '"' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    format!("[{}=\"{}\"]", attribute, escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn css(kind: SelectorKind, value: &str) -> Locator {
        match resolve(Some(&SelectorDescriptor::new(kind, value))).unwrap().target {
            Target::Element(locator) => locator,
            Target::Document => panic!("expected element target"),
        }
    }

    #[test]
    fn test_absent_descriptor_is_page_level() {
        let plan = resolve(None).unwrap();
        assert!(plan.is_page_level());
        assert_eq!(plan.scope, FrameScope::TopLevel);
    }

    #[test]
    fn test_native_locators() {
        assert_eq!(css(SelectorKind::Id, "main"), Locator::Css("[id=\"main\"]".into()));
        assert_eq!(css(SelectorKind::Class, "hero"), Locator::Css("[class=\"hero\"]".into()));
        assert_eq!(css(SelectorKind::Name, "q"), Locator::Css("[name=\"q\"]".into()));
        assert_eq!(css(SelectorKind::Tag, "article"), Locator::Css("article".into()));
        assert_eq!(css(SelectorKind::Css, "#missing"), Locator::Css("#missing".into()));
        assert_eq!(css(SelectorKind::Xpath, "//div[1]"), Locator::XPath("//div[1]".into()));
        assert_eq!(css(SelectorKind::Text, "Sign in"), Locator::ExactText("Sign in".into()));
    }

    #[test]
    fn test_attr_and_data_require_name() {
        for kind in [SelectorKind::Attr, SelectorKind::Data] {
            let err = resolve(Some(&SelectorDescriptor::new(kind, "x"))).unwrap_err();
            assert_eq!(err, ResolveError::MissingAttributeName(kind));
        }
        let blank = SelectorDescriptor::new(SelectorKind::Attr, "x").with_name("  ");
        assert!(resolve(Some(&blank)).is_err());
    }

    #[test]
    fn test_attr_and_data_matchers() {
        let attr = SelectorDescriptor::new(SelectorKind::Attr, "submit").with_name("type");
        assert_eq!(
            resolve(Some(&attr)).unwrap().target,
            Target::Element(Locator::Css("[type=\"submit\"]".into()))
        );

        let data = SelectorDescriptor::new(SelectorKind::Data, "7").with_name("row");
        assert_eq!(
            resolve(Some(&data)).unwrap().target,
            Target::Element(Locator::Css("[data-row=\"7\"]".into()))
        );

        let prefixed = SelectorDescriptor::new(SelectorKind::Data, "7").with_name("data-row");
        assert_eq!(resolve(Some(&prefixed)).unwrap(), resolve(Some(&data)).unwrap());
    }

    #[test]
    fn test_quotes_are_escaped() {
        assert_eq!(
            css(SelectorKind::Id, r#"a"b\c"#),
            Locator::Css(r#"[id="a\"b\\c"]"#.into())
        );
    }

    #[test]
    fn test_canvas_is_tagged_for_pixel_capture() {
        let plan = resolve(Some(&SelectorDescriptor::new(SelectorKind::Canvas, "#chart"))).unwrap();
        assert_eq!(plan.capture, CaptureMode::CanvasPixels);
        assert_eq!(plan.target, Target::Element(Locator::Css("#chart".into())));
    }

    #[test]
    fn test_iframe_switches_scope() {
        let descriptor = SelectorDescriptor::new(SelectorKind::Iframe, "iframe.embed");
        let plan = resolve(Some(&descriptor)).unwrap();
        assert_eq!(plan.scope, FrameScope::Frame(Locator::Css("iframe.embed".into())));
        assert!(plan.is_page_level());
    }

    #[test]
    fn test_empty_value_rejected() {
        let err = resolve(Some(&SelectorDescriptor::new(SelectorKind::Css, " "))).unwrap_err();
        assert_eq!(err, ResolveError::EmptyValue(SelectorKind::Css));
    }
}
