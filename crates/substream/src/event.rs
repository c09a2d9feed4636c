//! The shipped event models: XML and JSON token streams.
//!
//! The engine itself is generic over any input type; these enums are the
//! two primary instantiations, each with a [`Stackable`] strategy mapping
//! its scope-opening and scope-closing events onto the context stack.
//!
//! # Examples
//!
//! ```
//! use substream::{StackEffect, Stackable, Timing, XmlEvent};
//!
//! let start = XmlEvent::start("book", [("id", "1")]);
//! assert!(matches!(
//!     start.stack_effect(),
//!     StackEffect::Push { timing: Timing::Before, .. }
//! ));
//! ```

use alloc::{
    string::{String, ToString},
    vec::Vec,
};
use core::fmt;

use crate::{
    location::Location,
    stack::{StackEffect, Stackable, Timing},
};

/// One token of an XML document stream.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    any(test, feature = "serde"),
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum XmlEvent {
    /// An element start tag.
    ElemStart {
        /// Element name.
        name: String,
        /// Attributes in document order.
        attributes: Vec<(String, String)>,
        /// Position of the tag.
        location: Location,
    },
    /// An element end tag.
    ElemEnd {
        /// Element name.
        name: String,
        /// Position of the tag.
        location: Location,
    },
    /// A run of character data.
    Text {
        /// The character data.
        value: String,
        /// Whether the run is entirely whitespace.
        is_whitespace: bool,
        /// Position of the run.
        location: Location,
    },
}

impl XmlEvent {
    /// A start tag without position information.
    #[must_use]
    pub fn start<'a>(
        name: &str,
        attributes: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        Self::ElemStart {
            name: name.to_string(),
            attributes: attributes
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            location: Location::unknown(),
        }
    }

    /// An end tag without position information.
    #[must_use]
    pub fn end(name: &str) -> Self {
        Self::ElemEnd {
            name: name.to_string(),
            location: Location::unknown(),
        }
    }

    /// A character-data run without position information.
    #[must_use]
    pub fn text(value: &str) -> Self {
        Self::Text {
            value: value.to_string(),
            is_whitespace: value.chars().all(char::is_whitespace),
            location: Location::unknown(),
        }
    }
}

/// The stack frame an open XML element contributes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    any(test, feature = "serde"),
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct XmlContext {
    /// Element name.
    pub name: String,
    /// Attributes of the start tag, in document order.
    pub attributes: Vec<(String, String)>,
}

impl XmlContext {
    /// Looks up an attribute by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

impl fmt::Display for XmlContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.name)
    }
}

impl Stackable for XmlEvent {
    type Frame = XmlContext;

    fn stack_effect(&self) -> StackEffect<XmlContext> {
        match self {
            // A start tag opens its element's scope and is itself the first
            // event of the child sub-stream.
            Self::ElemStart {
                name, attributes, ..
            } => StackEffect::Push {
                frame: XmlContext {
                    name: name.clone(),
                    attributes: attributes.clone(),
                },
                timing: Timing::Before,
            },
            // An end tag is the last event of the closing sub-stream.
            Self::ElemEnd { .. } => StackEffect::Pop {
                timing: Timing::After,
            },
            Self::Text { .. } => StackEffect::NoChange,
        }
    }

    fn location(&self) -> Location {
        match self {
            Self::ElemStart { location, .. }
            | Self::ElemEnd { location, .. }
            | Self::Text { location, .. } => *location,
        }
    }
}

/// One token of a JSON document stream.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    any(test, feature = "serde"),
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum JsonEvent {
    /// `{`
    ObjectStart {
        /// Position of the brace.
        location: Location,
    },
    /// `}`
    ObjectEnd {
        /// Position of the brace.
        location: Location,
    },
    /// `[`
    ArrayStart {
        /// Position of the bracket.
        location: Location,
    },
    /// `]`
    ArrayEnd {
        /// Position of the bracket.
        location: Location,
    },
    /// The start of an object member's value.
    FieldStart {
        /// Member name.
        name: String,
        /// Position of the name token.
        location: Location,
    },
    /// The end of an object member's value.
    FieldEnd {
        /// Position just past the value.
        location: Location,
    },
    /// The start of an array element's value.
    IndexStart {
        /// 0-based element index.
        index: usize,
        /// Position of the value.
        location: Location,
    },
    /// The end of an array element's value.
    IndexEnd {
        /// 0-based element index.
        index: usize,
        /// Position just past the value.
        location: Location,
    },
    /// A string scalar.
    String {
        /// The decoded string value.
        value: String,
        /// Position of the literal.
        location: Location,
    },
    /// A number scalar.
    Number {
        /// The numeric value.
        value: f64,
        /// Position of the literal.
        location: Location,
    },
    /// A boolean scalar.
    Bool {
        /// The boolean value.
        value: bool,
        /// Position of the literal.
        location: Location,
    },
    /// A `null` scalar.
    Null {
        /// Position of the literal.
        location: Location,
    },
}

impl JsonEvent {
    /// `{` without position information.
    #[must_use]
    pub fn object_start() -> Self {
        Self::ObjectStart {
            location: Location::unknown(),
        }
    }

    /// `}` without position information.
    #[must_use]
    pub fn object_end() -> Self {
        Self::ObjectEnd {
            location: Location::unknown(),
        }
    }

    /// `[` without position information.
    #[must_use]
    pub fn array_start() -> Self {
        Self::ArrayStart {
            location: Location::unknown(),
        }
    }

    /// `]` without position information.
    #[must_use]
    pub fn array_end() -> Self {
        Self::ArrayEnd {
            location: Location::unknown(),
        }
    }

    /// A member-value start without position information.
    #[must_use]
    pub fn field_start(name: &str) -> Self {
        Self::FieldStart {
            name: name.to_string(),
            location: Location::unknown(),
        }
    }

    /// A member-value end without position information.
    #[must_use]
    pub fn field_end() -> Self {
        Self::FieldEnd {
            location: Location::unknown(),
        }
    }

    /// An element-value start without position information.
    #[must_use]
    pub fn index_start(index: usize) -> Self {
        Self::IndexStart {
            index,
            location: Location::unknown(),
        }
    }

    /// An element-value end without position information.
    #[must_use]
    pub fn index_end(index: usize) -> Self {
        Self::IndexEnd {
            index,
            location: Location::unknown(),
        }
    }

    /// A string scalar without position information.
    #[must_use]
    pub fn string(value: &str) -> Self {
        Self::String {
            value: value.to_string(),
            location: Location::unknown(),
        }
    }

    /// A number scalar without position information.
    #[must_use]
    pub fn number(value: f64) -> Self {
        Self::Number {
            value,
            location: Location::unknown(),
        }
    }

    /// A boolean scalar without position information.
    #[must_use]
    pub fn bool(value: bool) -> Self {
        Self::Bool {
            value,
            location: Location::unknown(),
        }
    }

    /// A `null` scalar without position information.
    #[must_use]
    pub fn null() -> Self {
        Self::Null {
            location: Location::unknown(),
        }
    }
}

/// The stack frame an open JSON scope contributes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    any(test, feature = "serde"),
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum JsonContext {
    /// Inside an object.
    Object,
    /// Inside the named member of an object.
    Field(String),
    /// Inside an array.
    Array,
    /// Inside the element at the given index of an array.
    Index(usize),
}

impl fmt::Display for JsonContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => f.write_str("{}"),
            Self::Field(name) => write!(f, ".{name}"),
            Self::Array => f.write_str("[]"),
            Self::Index(index) => write!(f, "[{index}]"),
        }
    }
}

impl Stackable for JsonEvent {
    type Frame = JsonContext;

    fn stack_effect(&self) -> StackEffect<JsonContext> {
        // Every scope-opening event belongs to the child sub-stream and
        // every scope-closing event is the child's last event, mirroring
        // the XML strategy.
        match self {
            Self::ObjectStart { .. } => StackEffect::Push {
                frame: JsonContext::Object,
                timing: Timing::Before,
            },
            Self::ArrayStart { .. } => StackEffect::Push {
                frame: JsonContext::Array,
                timing: Timing::Before,
            },
            Self::FieldStart { name, .. } => StackEffect::Push {
                frame: JsonContext::Field(name.clone()),
                timing: Timing::Before,
            },
            Self::IndexStart { index, .. } => StackEffect::Push {
                frame: JsonContext::Index(*index),
                timing: Timing::Before,
            },
            Self::ObjectEnd { .. }
            | Self::ArrayEnd { .. }
            | Self::FieldEnd { .. }
            | Self::IndexEnd { .. } => StackEffect::Pop {
                timing: Timing::After,
            },
            Self::String { .. } | Self::Number { .. } | Self::Bool { .. } | Self::Null { .. } => {
                StackEffect::NoChange
            }
        }
    }

    fn location(&self) -> Location {
        match self {
            Self::ObjectStart { location }
            | Self::ObjectEnd { location }
            | Self::ArrayStart { location }
            | Self::ArrayEnd { location }
            | Self::FieldStart { location, .. }
            | Self::FieldEnd { location }
            | Self::IndexStart { location, .. }
            | Self::IndexEnd { location, .. }
            | Self::String { location, .. }
            | Self::Number { location, .. }
            | Self::Bool { location, .. }
            | Self::Null { location } => *location,
        }
    }
}
