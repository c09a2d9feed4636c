//! The source adapter capability.
//!
//! An [`EventSource`] connects a raw source to a stream of events for a
//! given event type; the stream may end or raise, exclusively. Concrete
//! tokenizers (string/file to `XmlEvent`/`JsonEvent`) live outside this
//! crate and plug in by implementing this trait; in-memory collections are
//! covered here.

use alloc::vec::Vec;

use crate::error::ParseError;

/// A finite producer of events in document order.
pub trait EventSource<Ev> {
    /// The event iterator; `Err` reports a source failure and ends the
    /// stream.
    type Events: Iterator<Item = Result<Ev, ParseError>>;

    /// Opens the source as an event stream.
    fn into_event_stream(self) -> Self::Events;
}

impl<Ev> EventSource<Ev> for Vec<Ev> {
    type Events = core::iter::Map<alloc::vec::IntoIter<Ev>, fn(Ev) -> Result<Ev, ParseError>>;

    fn into_event_stream(self) -> Self::Events {
        self.into_iter().map(Ok as fn(Ev) -> Result<Ev, ParseError>)
    }
}

impl<Ev, const N: usize> EventSource<Ev> for [Ev; N] {
    type Events = core::iter::Map<core::array::IntoIter<Ev, N>, fn(Ev) -> Result<Ev, ParseError>>;

    fn into_event_stream(self) -> Self::Events {
        self.into_iter().map(Ok as fn(Ev) -> Result<Ev, ParseError>)
    }
}
