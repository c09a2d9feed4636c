//! The splitter engine: delimiting sub-streams by context.
//!
//! A [`Splitter`] watches the context stack reconstructed from the input
//! events. Whenever its matcher newly matches, it instantiates one fresh
//! sub-parser via the joiner, feeds it the sub-stream delimited by that
//! match, and emits the sub-parser's result downstream. At most one
//! sub-stream is open at a time; a new one cannot open until the stack
//! drops back below the previous match.
//!
//! # Examples
//!
//! ```
//! use substream::{Splitter, XmlEvent, xml};
//!
//! let titles = Splitter::new(xml::tag("library") / xml::tag("book"))
//!     .joined(|_| xml::text())
//!     .parse_to_list();
//! let events = [
//!     XmlEvent::start("library", []),
//!     XmlEvent::start("book", []),
//!     XmlEvent::text("A"),
//!     XmlEvent::end("book"),
//!     XmlEvent::end("library"),
//! ];
//! assert_eq!(titles.parse(events).unwrap(), vec!["A".to_string()]);
//! ```

use alloc::{
    boxed::Box,
    format,
    rc::Rc,
    string::ToString,
};
use core::fmt;

use crate::{
    error::{CallSite, ParseError, TraceElement},
    handler::{Emit, ParseHandler, Signal, TransformHandler},
    matcher::Matcher,
    parser::Parser,
    stack::{ContextStack, StackEffect, Stackable, Timing},
    transformer::Transformer,
};

/// A transformer factory parameterized by a context matcher: supply a
/// joiner mapping matched contexts to sub-parsers and it yields the
/// transformer that dispatches sub-streams.
pub struct Splitter<In: Stackable, C> {
    matcher: Matcher<In::Frame, C>,
    call_site: CallSite,
}

impl<In, C> Splitter<In, C>
where
    In: Stackable + fmt::Debug + 'static,
    <In as Stackable>::Frame: 'static,
    C: 'static,
{
    /// Builds a splitter from a context matcher.
    #[must_use]
    #[track_caller]
    pub fn new(matcher: Matcher<In::Frame, C>) -> Self {
        Self {
            matcher,
            call_site: CallSite::capture(),
        }
    }

    /// Supplies the joiner: one fresh sub-parser per matched context.
    #[must_use]
    pub fn joined<Out: 'static>(
        self,
        joiner: impl Fn(&C) -> Parser<In, Out> + 'static,
    ) -> Transformer<In, Out> {
        let joiner: Rc<dyn Fn(&C) -> Parser<In, Out>> = Rc::new(joiner);
        let matcher = self.matcher;
        let call_site = self.call_site;
        Transformer::new(move || {
            Box::new(SplitterHandler {
                matcher: matcher.clone(),
                joiner: Rc::clone(&joiner),
                call_site,
                stack: ContextStack::new(),
                active: None,
            })
        })
    }

    /// Like [`joined`](Splitter::joined) with a fixed sub-parser,
    /// ignoring the matched context value.
    #[must_use]
    pub fn joined_with<Out: 'static>(self, parser: Parser<In, Out>) -> Transformer<In, Out> {
        self.joined(move |_| parser.clone())
    }
}

struct ActiveSub<In, Out> {
    // Frames the matcher consumed; the sub-stream closes when the stack
    // drops below this depth.
    match_depth: usize,
    // None once the sub-parser has produced its result but the matched
    // context has not closed yet; blocks re-matching within one match.
    inner: Option<Box<dyn ParseHandler<In, Out = Out>>>,
}

struct SplitterHandler<In: Stackable, C, Out> {
    matcher: Matcher<In::Frame, C>,
    joiner: Rc<dyn Fn(&C) -> Parser<In, Out>>,
    call_site: CallSite,
    stack: ContextStack<In::Frame>,
    active: Option<ActiveSub<In, Out>>,
}

impl<In, C, Out> SplitterHandler<In, C, Out>
where
    In: Stackable + fmt::Debug + 'static,
    <In as Stackable>::Frame: 'static,
    C: 'static,
    Out: 'static,
{
    fn splitter_trace(&self) -> TraceElement {
        TraceElement::InSplitter {
            matcher: self.matcher.description().to_string(),
            call_site: self.call_site,
        }
    }

    fn tag_sub_error(&self, error: ParseError, input: &In) -> ParseError {
        error
            .with_trace(TraceElement::InInputContext {
                input: format!("{input:?}"),
                location: input.location(),
            })
            .with_trace(self.splitter_trace())
    }

    fn apply_mutation(
        &mut self,
        effect: StackEffect<In::Frame>,
        input: &In,
    ) -> Result<(), ParseError> {
        match effect {
            StackEffect::Push { frame, .. } => {
                self.stack.push(frame, input.location());
                Ok(())
            }
            StackEffect::Pop { .. } => match self.stack.pop() {
                Ok(_) => Ok(()),
                Err(error) => Err(error.with_trace(self.splitter_trace())),
            },
            StackEffect::NoChange => Ok(()),
        }
    }

    // Finalizes the open sub-stream once the stack has dropped below the
    // frames its matcher consumed.
    fn close_if_below(&mut self, out: &mut Emit<Out>) -> Result<(), ParseError> {
        let below = self
            .active
            .as_ref()
            .is_some_and(|active| self.stack.depth() < active.match_depth);
        if below {
            if let Some(active) = self.active.take() {
                if let Some(mut inner) = active.inner {
                    let result = inner
                        .finish()
                        .map_err(|error| error.with_trace(self.splitter_trace()))?;
                    out.push(result);
                }
            }
        }
        Ok(())
    }

    // Consults the matcher after a push; at most one sub-stream at a time.
    fn try_open(&mut self) {
        if self.active.is_none() {
            if let Some((context, consumed)) = self.matcher.apply(self.stack.entries()) {
                let parser = (self.joiner)(&context);
                self.active = Some(ActiveSub {
                    match_depth: consumed,
                    inner: Some(parser.new_handler()),
                });
            }
        }
    }
}

impl<In, C, Out> TransformHandler<In> for SplitterHandler<In, C, Out>
where
    In: Stackable + fmt::Debug + 'static,
    <In as Stackable>::Frame: 'static,
    C: 'static,
    Out: 'static,
{
    type Out = Out;

    fn push(&mut self, input: &In, out: &mut Emit<Out>) -> Result<Signal, ParseError> {
        let effect = input.stack_effect();
        let is_push = matches!(effect, StackEffect::Push { .. });
        let timing = match &effect {
            StackEffect::NoChange => None,
            StackEffect::Push { timing, .. } | StackEffect::Pop { timing } => Some(*timing),
        };
        let mut effect = Some(effect);

        if timing == Some(Timing::Before) {
            if let Some(effect) = effect.take() {
                self.apply_mutation(effect, input)?;
            }
            if is_push {
                // A child-side push may open a sub-stream that receives
                // this very input.
                self.try_open();
            } else {
                // A parent-side pop closes the sub-stream before the
                // input, which then stays with the parent.
                self.close_if_below(out)?;
            }
        }

        if let Some(active) = &mut self.active {
            if let Some(inner) = &mut active.inner {
                match inner.step(input) {
                    Ok(Some(result)) => {
                        active.inner = None;
                        out.push(result);
                    }
                    Ok(None) => {}
                    Err(error) => return Err(self.tag_sub_error(error, input)),
                }
            }
        }

        if timing == Some(Timing::After) {
            if let Some(effect) = effect.take() {
                self.apply_mutation(effect, input)?;
            }
            if is_push {
                // A parent-side push opens a sub-stream that starts with
                // the next input.
                self.try_open();
            } else {
                // A child-side pop: the input was the sub-stream's last.
                self.close_if_below(out)?;
            }
        }

        Ok(Signal::Continue)
    }

    fn flush(&mut self, out: &mut Emit<Out>) -> Result<(), ParseError> {
        if let Some(active) = self.active.take() {
            if let Some(mut inner) = active.inner {
                let result = inner
                    .finish()
                    .map_err(|error| error.with_trace(self.splitter_trace()))?;
                out.push(result);
            }
        }
        Ok(())
    }
}

/// A degenerate, stack-less splitter: consecutive inputs satisfying
/// `predicate` form one sub-stream, and the first non-matching input
/// closes it (without being forwarded). The joiner receives the
/// sub-stream's first input.
#[track_caller]
pub fn split_on_match<In, Out>(
    predicate: impl Fn(&In) -> bool + 'static,
    joiner: impl Fn(&In) -> Parser<In, Out> + 'static,
) -> Transformer<In, Out>
where
    In: fmt::Debug + 'static,
    Out: 'static,
{
    let predicate: Rc<dyn Fn(&In) -> bool> = Rc::new(predicate);
    let joiner: Rc<dyn Fn(&In) -> Parser<In, Out>> = Rc::new(joiner);
    let call_site = CallSite::capture();
    Transformer::new(move || {
        Box::new(SplitOnMatchHandler {
            predicate: Rc::clone(&predicate),
            joiner: Rc::clone(&joiner),
            call_site,
            active: None,
        })
    })
}

struct SplitOnMatchHandler<In, Out> {
    predicate: Rc<dyn Fn(&In) -> bool>,
    joiner: Rc<dyn Fn(&In) -> Parser<In, Out>>,
    call_site: CallSite,
    // Some(None) while a sub-parser has finished but the run of matching
    // inputs has not.
    active: Option<Option<Box<dyn ParseHandler<In, Out = Out>>>>,
}

impl<In: fmt::Debug, Out> SplitOnMatchHandler<In, Out> {
    fn splitter_trace(&self) -> TraceElement {
        TraceElement::InSplitter {
            matcher: "split_on_match".to_string(),
            call_site: self.call_site,
        }
    }

    fn close(&mut self, out: &mut Emit<Out>) -> Result<(), ParseError> {
        if let Some(slot) = self.active.take() {
            if let Some(mut inner) = slot {
                let result = inner
                    .finish()
                    .map_err(|error| error.with_trace(self.splitter_trace()))?;
                out.push(result);
            }
        }
        Ok(())
    }
}

impl<In: fmt::Debug + 'static, Out: 'static> TransformHandler<In> for SplitOnMatchHandler<In, Out> {
    type Out = Out;

    fn push(&mut self, input: &In, out: &mut Emit<Out>) -> Result<Signal, ParseError> {
        if (self.predicate)(input) {
            if self.active.is_none() {
                self.active = Some(Some((self.joiner)(input).new_handler()));
            }
            if let Some(slot) = &mut self.active {
                if let Some(inner) = slot {
                    match inner.step(input) {
                        Ok(Some(result)) => {
                            *slot = None;
                            out.push(result);
                        }
                        Ok(None) => {}
                        Err(error) => return Err(error.with_trace(self.splitter_trace())),
                    }
                }
            }
        } else {
            self.close(out)?;
        }
        Ok(Signal::Continue)
    }

    fn flush(&mut self, out: &mut Emit<Out>) -> Result<(), ParseError> {
        self.close(out)
    }
}
