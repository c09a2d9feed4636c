//! Context-stack tracking: how a flat event stream regains its hierarchy.
//!
//! A [`Stackable`] event type declares, per event, whether the event opens a
//! scope, closes one, or leaves the stack alone. The engine replays those
//! effects into a [`ContextStack`], which context matchers then inspect to
//! delimit sub-streams.

use alloc::vec::Vec;
use core::fmt;

use crate::{
    error::{ErrorKind, ParseError},
    location::Location,
};

/// Whether an event belongs to the scope it opens/closes or to the parent.
///
/// `Before` means the stack mutates before the event is handled, so the
/// event itself is seen inside the child scope (an XML start tag). `After`
/// means the event is handled first and the mutation follows (an XML end
/// tag, which the closing sub-stream still sees).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timing {
    /// Mutate the stack, then handle the event.
    Before,
    /// Handle the event, then mutate the stack.
    After,
}

/// How one event changes the context stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackEffect<F> {
    /// The event does not touch the stack.
    NoChange,
    /// The event opens a scope described by `frame`.
    Push {
        /// The frame pushed for the new scope.
        frame: F,
        /// Whether the event belongs to the child or the parent.
        timing: Timing,
    },
    /// The event closes the innermost scope.
    Pop {
        /// Whether the event belongs to the closing child or the parent.
        timing: Timing,
    },
}

/// Per-event-type rules for translating events into stack mutations.
///
/// Implementations must be pure: the effect of an event depends on the
/// event alone. Pops must pair with earlier pushes — a pop on an empty
/// stack surfaces as [`ErrorKind::StackUnderflow`].
pub trait Stackable {
    /// The stack frame type describing one open scope.
    type Frame;

    /// The stack mutation this event causes.
    fn stack_effect(&self) -> StackEffect<Self::Frame>;

    /// The event's position in the source, for diagnostics.
    fn location(&self) -> Location {
        Location::unknown()
    }
}

/// One open scope: the frame plus the position of the push that created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackEntry<S> {
    /// The frame describing the scope.
    pub frame: S,
    /// Where the opening event occurred.
    pub location: Location,
}

/// The running stack of open scopes at a point in the stream.
///
/// Created empty at the start of a parse, mutated only by a [`Stackable`]
/// strategy, and destroyed with its owning parse.
#[derive(Debug)]
pub struct ContextStack<S> {
    entries: Vec<StackEntry<S>>,
}

impl<S> ContextStack<S> {
    /// An empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Number of open scopes.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no scope is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The open scopes, root first.
    #[must_use]
    pub fn entries(&self) -> &[StackEntry<S>] {
        &self.entries
    }

    /// Opens a scope.
    pub fn push(&mut self, frame: S, location: Location) {
        self.entries.push(StackEntry { frame, location });
    }

    /// Closes the innermost scope.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::StackUnderflow`] if no scope is open.
    pub fn pop(&mut self) -> Result<StackEntry<S>, ParseError> {
        self.entries
            .pop()
            .ok_or_else(|| ParseError::new(ErrorKind::StackUnderflow))
    }

    /// The ordered positions of the enclosing pushes, root first.
    #[must_use]
    pub fn context_trace(&self) -> ContextTrace {
        ContextTrace(self.entries.iter().map(|entry| entry.location).collect())
    }
}

impl<S> Default for ContextStack<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// The positions of the pushes enclosing a point in the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextTrace(pub Vec<Location>);

impl fmt::Display for ContextTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for location in &self.0 {
            if !first {
                f.write_str(" > ")?;
            }
            write!(f, "{location}")?;
            first = false;
        }
        if first {
            f.write_str("<root>")?;
        }
        Ok(())
    }
}
