//! Composable predicates over the context stack.
//!
//! A [`Matcher`] inspects the stack from the root upward and, when
//! satisfied, yields a matched context value together with the number of
//! frames it consumed. Sequence composition threads the remaining frames
//! into the next matcher, so `tag("library") / tag("book")` matches any
//! stack whose first two frames are a `library` element containing a
//! `book` element, however deep the stream currently is.
//!
//! Matchers are monotone: once a matcher matches, pushing further frames on
//! top cannot un-match it; only popping one of the consumed frames does.
//! The splitter engine relies on this to delimit sub-streams.
//!
//! # Examples
//!
//! ```
//! use substream::{matcher::any, xml::tag, Matcher, StackEntry, Location, XmlContext};
//!
//! let matcher = tag("library") / any();
//! let stack = [
//!     StackEntry { frame: XmlContext { name: "library".into(), attributes: vec![] }, location: Location::unknown() },
//!     StackEntry { frame: XmlContext { name: "book".into(), attributes: vec![] }, location: Location::unknown() },
//! ];
//! assert_eq!(matcher.apply(&stack), Some(((), 2)));
//! ```

use alloc::{format, rc::Rc, string::String};
use core::{fmt, ops::Div};

use crate::stack::StackEntry;

type ApplyFn<S, C> = dyn Fn(&[StackEntry<S>]) -> Option<(C, usize)>;

/// A composable predicate over the context stack, yielding a matched
/// context value `C` and consuming a prefix of frames.
pub struct Matcher<S, C> {
    apply: Rc<ApplyFn<S, C>>,
    description: Rc<str>,
}

impl<S, C> Clone for Matcher<S, C> {
    fn clone(&self) -> Self {
        Self {
            apply: Rc::clone(&self.apply),
            description: Rc::clone(&self.description),
        }
    }
}

impl<S, C> fmt::Debug for Matcher<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Matcher({})", self.description)
    }
}

impl<S, C> fmt::Display for Matcher<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

impl<S: 'static, C: 'static> Matcher<S, C> {
    /// Builds a matcher from a raw function over the stack.
    ///
    /// The function receives the open scopes root-first and returns the
    /// matched value plus the number of frames consumed, or `None`. Custom
    /// matchers must preserve monotonicity: the decision may only depend
    /// on the consumed prefix.
    pub fn from_fn(
        description: impl Into<String>,
        apply: impl Fn(&[StackEntry<S>]) -> Option<(C, usize)> + 'static,
    ) -> Self {
        Self {
            apply: Rc::new(apply),
            description: Rc::from(description.into().as_str()),
        }
    }

    /// Applies the matcher to a stack, root first.
    #[must_use]
    pub fn apply(&self, stack: &[StackEntry<S>]) -> Option<(C, usize)> {
        (self.apply)(stack)
    }

    /// The human-readable description used in diagnostic traces.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Transforms the matched value.
    #[must_use]
    pub fn map<C2: 'static>(self, f: impl Fn(C) -> C2 + 'static) -> Matcher<S, C2> {
        let apply = Rc::clone(&self.apply);
        Matcher {
            apply: Rc::new(move |stack| apply(stack).map(|(c, used)| (f(c), used))),
            description: self.description,
        }
    }

    /// Alternation: `self`, or failing that, `other`.
    #[must_use]
    pub fn or(self, other: Matcher<S, C>) -> Matcher<S, C> {
        let description = format!("({} | {})", self.description, other.description);
        let left = Rc::clone(&self.apply);
        let right = Rc::clone(&other.apply);
        Matcher {
            apply: Rc::new(move |stack| left(stack).or_else(|| right(stack))),
            description: Rc::from(description.as_str()),
        }
    }

    /// Sequence composition with a unit matcher, keeping `self`'s value.
    #[must_use]
    pub fn then(self, next: Matcher<S, ()>) -> Matcher<S, C> {
        self.zip(next).map(|(c, ())| c)
    }

    /// Sequence composition producing both matched values.
    ///
    /// `self` consumes a prefix of the stack; `next` is applied to the
    /// frames that remain above it.
    #[must_use]
    pub fn zip<C2: 'static>(self, next: Matcher<S, C2>) -> Matcher<S, (C, C2)> {
        let description = format!("{} / {}", self.description, next.description);
        let head = Rc::clone(&self.apply);
        let tail = Rc::clone(&next.apply);
        Matcher {
            apply: Rc::new(move |stack| {
                let (c, used) = head(stack)?;
                let (c2, used2) = tail(&stack[used..])?;
                Some(((c, c2), used + used2))
            }),
            description: Rc::from(description.as_str()),
        }
    }
}

impl<S: 'static> Matcher<S, ()> {
    /// Sequence composition that adopts the next matcher's value.
    #[must_use]
    pub fn extracting<C2: 'static>(self, next: Matcher<S, C2>) -> Matcher<S, C2> {
        self.zip(next).map(|((), c2)| c2)
    }
}

// `a / b` reads as a context path. Only unit-valued left-hand sides compose
// this way; a valued matcher continues with `.then(..)` instead.
impl<S: 'static, C2: 'static> Div<Matcher<S, C2>> for Matcher<S, ()> {
    type Output = Matcher<S, C2>;

    fn div(self, rhs: Matcher<S, C2>) -> Matcher<S, C2> {
        self.extracting(rhs)
    }
}

/// Matches any single frame.
#[must_use]
pub fn any<S: 'static>() -> Matcher<S, ()> {
    Matcher::from_fn("*", |stack| stack.first().map(|_| ((), 1)))
}

/// Matches a single frame satisfying `predicate`.
pub fn frame_where<S: 'static>(
    description: impl Into<String>,
    predicate: impl Fn(&S) -> bool + 'static,
) -> Matcher<S, ()> {
    Matcher::from_fn(description, move |stack| {
        stack
            .first()
            .filter(|entry| predicate(&entry.frame))
            .map(|_| ((), 1))
    })
}

/// Matches a single frame from which `extract` yields a value.
pub fn extract<S: 'static, C: 'static>(
    description: impl Into<String>,
    extract: impl Fn(&S) -> Option<C> + 'static,
) -> Matcher<S, C> {
    Matcher::from_fn(description, move |stack| {
        stack
            .first()
            .and_then(|entry| extract(&entry.frame))
            .map(|c| (c, 1))
    })
}
