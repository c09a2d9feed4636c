//! The engine's failure type and its diagnostic trace.
//!
//! Failures travel through the `Result` channel only; they are never encoded
//! as ordinary output values unless a parser explicitly lifts them with
//! `attempt`. Every combinator that changes the meaning of an error appends
//! one [`TraceElement`] as the error unwinds, so a surfaced [`ParseError`]
//! reads leaf-first: the witnessing input, then the enclosing context,
//! splitter, compound branch, and finally the parse call site.

use alloc::{boxed::Box, string::String, vec::Vec};
use core::fmt;

use thiserror::Error;

use crate::location::Location;

/// The file/line at which a trace-adding combinator was constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    /// Source file of the combinator construction.
    pub file: &'static str,
    /// Line within `file`.
    pub line: u32,
}

impl CallSite {
    /// Captures the caller's file and line.
    ///
    /// Combinator constructors are annotated `#[track_caller]`, so the
    /// captured position is the user's composition site, not the crate
    /// internals.
    #[must_use]
    #[track_caller]
    pub fn capture() -> Self {
        let caller = core::panic::Location::caller();
        Self {
            file: caller.file(),
            line: caller.line(),
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One step in the diagnostic trace attached to a [`ParseError`].
///
/// Elements are ordered leaf-first: the first element names the input that
/// witnessed the failure, later elements name the combinators the error
/// passed on its way out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceElement {
    /// The source event being handled when the failure surfaced.
    InInput {
        /// Debug rendering of the event.
        input: String,
    },
    /// An event handled inside a delimited sub-stream, with its position.
    InInputContext {
        /// Debug rendering of the event.
        input: String,
        /// Position of the event in the source document.
        location: Location,
    },
    /// The error passed a splitter while a sub-parser was running.
    InSplitter {
        /// Description of the splitter's context matcher.
        matcher: String,
        /// Where the splitter was constructed.
        call_site: CallSite,
    },
    /// The error came out of one branch of a tuple/product composition.
    InCompound {
        /// Index of the failing branch.
        index: usize,
        /// Total number of branches.
        count: usize,
        /// Where the compound was constructed.
        call_site: CallSite,
    },
    /// The error crossed a top-level parse entry point.
    InParse {
        /// Name of the parser being driven.
        parser: String,
        /// Entry-point method name (`parse`, `parse_results`, ...).
        method: &'static str,
        /// Where the entry point was invoked.
        call_site: CallSite,
    },
}

impl fmt::Display for TraceElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InInput { input } => write!(f, "in input {input}"),
            Self::InInputContext { input, location } => {
                if location.is_unknown() {
                    write!(f, "in input {input} (in sub-stream)")
                } else {
                    write!(f, "in input {input} at {location}")
                }
            }
            Self::InSplitter { matcher, call_site } => {
                write!(f, "in splitter [{matcher}] constructed at {call_site}")
            }
            Self::InCompound {
                index,
                count,
                call_site,
            } => {
                write!(
                    f,
                    "in branch {index} of {count}-way compound constructed at {call_site}"
                )
            }
            Self::InParse {
                parser,
                method,
                call_site,
            } => write!(f, "in `{parser}`.{method} called at {call_site}"),
        }
    }
}

/// What went wrong, independent of where.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A `first`-style parser reached end-of-stream without any input.
    #[error("the stream ended before the first input arrived")]
    MissingFirst,

    /// An input failed an `expect_inputs` predicate.
    #[error("unexpected input {input}, still expecting {expectations:?}")]
    UnexpectedInput {
        /// Debug rendering of the offending input.
        input: String,
        /// Labels of the expectations not yet satisfied, in order.
        expectations: Vec<String>,
    },

    /// The stream ended while `expect_inputs` expectations remained.
    #[error("the stream ended with expectations remaining: {expectations:?}")]
    UnfulfilledInputs {
        /// Labels of the unsatisfied expectations, in order.
        expectations: Vec<String>,
    },

    /// Every branch of a fallback chain failed.
    #[error("every branch of the fallback chain failed ({} branches)", .errors.len())]
    FallbackChainFailure {
        /// The per-branch failures, in the order in which each branch
        /// failed (not chain order).
        errors: Vec<ParseError>,
    },

    /// A stackable strategy requested a pop while the context stack was
    /// empty. Always a programming error in the strategy.
    #[error("context stack popped while empty")]
    StackUnderflow,

    /// A non-engine error raised from user code (`eval`, `try_map`,
    /// `try_fold`, source iterators).
    #[error("{cause}")]
    Caught {
        /// The wrapped error.
        #[source]
        cause: Box<dyn core::error::Error + Send + Sync>,
    },
}

/// A parse failure: an [`ErrorKind`] plus the trace accumulated while the
/// error unwound through the handler tree.
///
/// The rendered form is a multi-line report suitable for logging:
///
/// ```text
/// the stream ended before the first input arrived
///   - in input ElemEnd { .. }
///   - in splitter [library / book] constructed at src/main.rs:14
///   - in `first`.parse called at src/main.rs:20
/// ```
#[derive(Debug)]
pub struct ParseError {
    kind: ErrorKind,
    trace: Vec<TraceElement>,
}

impl ParseError {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            trace: Vec::new(),
        }
    }

    /// Wraps a foreign error raised from user code.
    #[must_use]
    pub fn caught<E>(cause: E) -> Self
    where
        E: core::error::Error + Send + Sync + 'static,
    {
        Self::new(ErrorKind::Caught {
            cause: Box::new(cause),
        })
    }

    /// What went wrong.
    #[must_use]
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The diagnostic trace, leaf-first.
    #[must_use]
    pub fn trace(&self) -> &[TraceElement] {
        &self.trace
    }

    /// Per-branch failures of a fallback chain; empty for other kinds.
    #[must_use]
    pub fn underlying_errors(&self) -> &[ParseError] {
        match &self.kind {
            ErrorKind::FallbackChainFailure { errors } => errors,
            _ => &[],
        }
    }

    /// Remaining expectation labels of an `expect_inputs` failure; empty
    /// for other kinds.
    #[must_use]
    pub fn expectations(&self) -> &[String] {
        match &self.kind {
            ErrorKind::UnexpectedInput { expectations, .. }
            | ErrorKind::UnfulfilledInputs { expectations } => expectations,
            _ => &[],
        }
    }

    /// Debug rendering of the offending input, when the kind carries one.
    #[must_use]
    pub fn input(&self) -> Option<&str> {
        match &self.kind {
            ErrorKind::UnexpectedInput { input, .. } => Some(input),
            _ => None,
        }
    }

    /// Appends a trace element as the error unwinds outward.
    #[must_use]
    pub(crate) fn with_trace(mut self, element: TraceElement) -> Self {
        self.trace.push(element);
        self
    }

    /// Installs the leaf element naming the source event that witnessed the
    /// failure. Called once, by the outermost driver.
    #[must_use]
    pub(crate) fn with_witness(mut self, input: String) -> Self {
        self.trace.insert(0, TraceElement::InInput { input });
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for element in &self.trace {
            write!(f, "\n  - {element}")?;
        }
        Ok(())
    }
}

impl core::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        Some(&self.kind)
    }
}

// Internal contract violation: a handler was driven past completion. Kept
// out of ErrorKind so the public enum stays meaningful.
#[derive(Debug, Error)]
#[error("handler driven past completion")]
pub(crate) struct Reentered;

pub(crate) fn reentered() -> ParseError {
    ParseError::caught(Reentered)
}
