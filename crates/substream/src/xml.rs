//! XML-specific matchers and leaf parsers.
//!
//! # Examples
//!
//! ```
//! use substream::{Splitter, XmlEvent, xml};
//!
//! let ids = Splitter::new(xml::tag("feed") / xml::attr("id"))
//!     .joined(|id| substream::Parser::pure(id.clone()))
//!     .parse_to_list();
//! let events = [
//!     XmlEvent::start("feed", []),
//!     XmlEvent::start("entry", [("id", "e1")]),
//!     XmlEvent::end("entry"),
//!     XmlEvent::end("feed"),
//! ];
//! assert_eq!(ids.parse(events).unwrap(), vec!["e1".to_string()]);
//! ```

use alloc::{
    format,
    string::{String, ToString},
};

use thiserror::Error;

use crate::{
    error::ParseError,
    event::{XmlContext, XmlEvent},
    matcher::{Matcher, extract, frame_where},
    parser::Parser,
    transformer::Transformer,
};

/// Matches a single element frame by name.
#[must_use]
pub fn tag(name: &str) -> Matcher<XmlContext, ()> {
    let expected = name.to_string();
    frame_where(name, move |frame: &XmlContext| frame.name == expected)
}

/// Matches a single element frame carrying the named attribute, yielding
/// the attribute's value.
#[must_use]
pub fn attr(name: &str) -> Matcher<XmlContext, String> {
    let expected = name.to_string();
    extract(format!("@{name}"), move |frame: &XmlContext| {
        frame.attribute(&expected).map(ToString::to_string)
    })
}

/// Concatenates every character-data run in the stream; finishes at
/// end-of-stream.
#[must_use]
pub fn text() -> Parser<XmlEvent, String> {
    Parser::fold(String::new(), |mut collected, event: &XmlEvent| {
        if let XmlEvent::Text { value, .. } = event {
            collected.push_str(value);
        }
        collected
    })
    .with_name("xml::text")
}

#[derive(Debug, Error)]
#[error("element has no attribute named {name:?}")]
struct MissingAttribute {
    name: String,
}

/// Extracts the named attribute from the first start tag in the stream.
///
/// Fails if the first start tag lacks the attribute, or if the stream ends
/// before any start tag.
#[must_use]
pub fn attribute(name: &str) -> Parser<XmlEvent, String> {
    let wanted = name.to_string();
    let missing = name.to_string();
    Transformer::identity()
        .filter_map(move |event: XmlEvent| match event {
            XmlEvent::ElemStart { attributes, .. } => Some(
                attributes
                    .iter()
                    .find(|(key, _)| *key == wanted)
                    .map(|(_, value)| value.clone()),
            ),
            _ => None,
        })
        .parse_first()
        .try_map(move |found| {
            found.ok_or_else(|| {
                ParseError::caught(MissingAttribute {
                    name: missing.clone(),
                })
            })
        })
        .with_name("xml::attribute")
}
