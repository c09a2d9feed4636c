//! JSON-specific matchers and leaf parsers.
//!
//! JSON scopes come in pairs on the context stack — a container frame
//! (`Object`/`Array`) below a member frame (`Field`/`Index`) — so each
//! matcher here consumes two frames.
//!
//! # Examples
//!
//! ```
//! use substream::{JsonEvent, Splitter, json};
//!
//! let names = Splitter::new(json::field("name"))
//!     .joined(|_| json::string_value())
//!     .parse_to_list();
//! let events = [
//!     JsonEvent::object_start(),
//!     JsonEvent::field_start("name"),
//!     JsonEvent::string("ada"),
//!     JsonEvent::field_end(),
//!     JsonEvent::object_end(),
//! ];
//! assert_eq!(names.parse(events).unwrap(), vec!["ada".to_string()]);
//! ```

use alloc::{
    format,
    string::{String, ToString},
};

use crate::{
    event::{JsonContext, JsonEvent},
    matcher::Matcher,
    parser::Parser,
    stack::StackEntry,
    transformer::Transformer,
};

/// Matches an object member by name.
#[must_use]
pub fn field(name: &str) -> Matcher<JsonContext, ()> {
    let expected = name.to_string();
    Matcher::from_fn(format!(".{name}"), move |stack: &[StackEntry<JsonContext>]| {
        match stack {
            [
                StackEntry {
                    frame: JsonContext::Object,
                    ..
                },
                StackEntry {
                    frame: JsonContext::Field(found),
                    ..
                },
                ..,
            ] if *found == expected => Some(((), 2)),
            _ => None,
        }
    })
}

/// Matches any object member, yielding its name.
#[must_use]
pub fn any_field() -> Matcher<JsonContext, String> {
    Matcher::from_fn(".*", |stack: &[StackEntry<JsonContext>]| match stack {
        [
            StackEntry {
                frame: JsonContext::Object,
                ..
            },
            StackEntry {
                frame: JsonContext::Field(found),
                ..
            },
            ..,
        ] => Some((found.clone(), 2)),
        _ => None,
    })
}

/// Matches the array element at `index`.
#[must_use]
pub fn index(index: usize) -> Matcher<JsonContext, ()> {
    Matcher::from_fn(format!("[{index}]"), move |stack: &[StackEntry<JsonContext>]| {
        match stack {
            [
                StackEntry {
                    frame: JsonContext::Array,
                    ..
                },
                StackEntry {
                    frame: JsonContext::Index(found),
                    ..
                },
                ..,
            ] if *found == index => Some(((), 2)),
            _ => None,
        }
    })
}

/// Matches any array element, yielding its index.
#[must_use]
pub fn any_index() -> Matcher<JsonContext, usize> {
    Matcher::from_fn("[*]", |stack: &[StackEntry<JsonContext>]| match stack {
        [
            StackEntry {
                frame: JsonContext::Array,
                ..
            },
            StackEntry {
                frame: JsonContext::Index(found),
                ..
            },
            ..,
        ] => Some((*found, 2)),
        _ => None,
    })
}

/// Finishes with the first string scalar in the stream.
#[must_use]
pub fn string_value() -> Parser<JsonEvent, String> {
    Transformer::identity()
        .filter_map(|event: JsonEvent| match event {
            JsonEvent::String { value, .. } => Some(value),
            _ => None,
        })
        .parse_first()
        .with_name("json::string_value")
}

/// Finishes with the first number scalar in the stream.
#[must_use]
pub fn number_value() -> Parser<JsonEvent, f64> {
    Transformer::identity()
        .filter_map(|event: JsonEvent| match event {
            JsonEvent::Number { value, .. } => Some(value),
            _ => None,
        })
        .parse_first()
        .with_name("json::number_value")
}

/// Finishes with the first boolean scalar in the stream.
#[must_use]
pub fn bool_value() -> Parser<JsonEvent, bool> {
    Transformer::identity()
        .filter_map(|event: JsonEvent| match event {
            JsonEvent::Bool { value, .. } => Some(value),
            _ => None,
        })
        .parse_first()
        .with_name("json::bool_value")
}
