//! Streaming, pull-based parser combinators for hierarchical event
//! streams.
//!
//! Declare *what* to extract by composing [`Parser`]s, [`Transformer`]s,
//! and [`Splitter`]s; the composition compiles to handler state machines
//! that consume the stream one event at a time, without buffering the
//! document. XML and JSON event models ship in the crate; the engine works
//! over any event type with a [`Stackable`] strategy.
//!
//! ```
//! use substream::{Splitter, XmlEvent, xml};
//!
//! let books = Splitter::new(xml::tag("library") / xml::tag("book"))
//!     .joined(|_| xml::text())
//!     .parse_to_list();
//!
//! let events = [
//!     XmlEvent::start("library", []),
//!     XmlEvent::start("book", []),
//!     XmlEvent::text("A"),
//!     XmlEvent::end("book"),
//!     XmlEvent::start("book", []),
//!     XmlEvent::text("B"),
//!     XmlEvent::end("book"),
//!     XmlEvent::end("library"),
//! ];
//! assert_eq!(books.parse(events).unwrap(), vec!["A".to_string(), "B".to_string()]);
//! ```

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

mod error;
mod event;
mod handler;
mod location;
mod parser;
mod source;
mod splitter;
mod stack;
mod transformer;

pub mod json;
pub mod matcher;
pub mod xml;

pub use error::{CallSite, ErrorKind, ParseError, TraceElement};
pub use event::{JsonContext, JsonEvent, XmlContext, XmlEvent};
pub use handler::{Emit, ParseHandler, Signal, TransformHandler};
pub use location::Location;
pub use matcher::Matcher;
pub use parser::{Expectation, Parser, ParserTuple, context_start};
pub use source::EventSource;
pub use splitter::{Splitter, split_on_match};
pub use stack::{ContextStack, ContextTrace, StackEffect, StackEntry, Stackable, Timing};
pub use transformer::{TransformIter, Transformer};

#[cfg(test)]
mod tests;
