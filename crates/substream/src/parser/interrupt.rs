//! Interruption: finalize a running parser when a second parser fires.

use alloc::boxed::Box;

use super::Parser;
use crate::{
    error::{ErrorKind, ParseError},
    handler::ParseHandler,
    matcher::Matcher,
    stack::{ContextStack, StackEffect, Stackable},
};

impl<In: 'static, Out: 'static> Parser<In, Out> {
    /// Runs `self` and `interrupter` in logical parallel on the same
    /// stream. The moment the interrupter produces a value, `self` is
    /// finalized as if the stream had ended; the triggering input is not
    /// forwarded to it.
    ///
    /// An interrupter failure is raised. To treat interrupter failures as
    /// "no interruption" instead, wrap the interrupter:
    /// `base.interrupted_by(interrupter.attempt().ok_only())`.
    #[must_use]
    pub fn interrupted_by<I: 'static>(self, interrupter: Parser<In, I>) -> Parser<In, Out> {
        let base = self;
        Parser::new("interrupted_by", move || {
            Box::new(InterruptedByHandler {
                base: base.new_handler(),
                interrupter: Some(interrupter.new_handler()),
            })
        })
    }

    /// Finalizes `self` just before a context matching `matcher` opens.
    ///
    /// Equivalent to [`interrupted_by`](Parser::interrupted_by) with a
    /// [`context_start`] interrupter: the push that satisfies the matcher
    /// interrupts the base and is not forwarded to it.
    #[must_use]
    pub fn before_context<C: 'static>(
        self,
        matcher: Matcher<<In as Stackable>::Frame, C>,
    ) -> Parser<In, Out>
    where
        In: Stackable,
        <In as Stackable>::Frame: 'static,
    {
        self.interrupted_by(context_start(matcher))
    }
}

/// A parser that finishes with the first matched context value the moment
/// a stack push satisfies `matcher`.
///
/// End-of-stream without a match raises [`ErrorKind::MissingFirst`].
#[must_use]
pub fn context_start<In, C>(matcher: Matcher<<In as Stackable>::Frame, C>) -> Parser<In, C>
where
    In: Stackable + 'static,
    <In as Stackable>::Frame: 'static,
    C: 'static,
{
    Parser::new("context_start", move || {
        Box::new(ContextStartHandler {
            matcher: matcher.clone(),
            stack: ContextStack::new(),
        })
    })
}

struct InterruptedByHandler<In, Out, I> {
    base: Box<dyn ParseHandler<In, Out = Out>>,
    interrupter: Option<Box<dyn ParseHandler<In, Out = I>>>,
}

impl<In, Out, I> ParseHandler<In> for InterruptedByHandler<In, Out, I> {
    type Out = Out;

    fn step(&mut self, input: &In) -> Result<Option<Out>, ParseError> {
        if let Some(interrupter) = self.interrupter.as_mut() {
            if interrupter.step(input)?.is_some() {
                self.interrupter = None;
                return self.base.finish().map(Some);
            }
        }
        self.base.step(input)
    }

    fn finish(&mut self) -> Result<Out, ParseError> {
        self.base.finish()
    }
}

struct ContextStartHandler<In: Stackable, C> {
    matcher: Matcher<In::Frame, C>,
    stack: ContextStack<In::Frame>,
}

impl<In: Stackable, C> ParseHandler<In> for ContextStartHandler<In, C>
where
    In::Frame: 'static,
    C: 'static,
{
    type Out = C;

    fn step(&mut self, input: &In) -> Result<Option<C>, ParseError> {
        match input.stack_effect() {
            // The matcher is consulted on pushes only, whichever side of
            // the input the push lands on.
            StackEffect::Push { frame, .. } => {
                self.stack.push(frame, input.location());
                Ok(self
                    .matcher
                    .apply(self.stack.entries())
                    .map(|(context, _)| context))
            }
            StackEffect::Pop { .. } => {
                self.stack.pop()?;
                Ok(None)
            }
            StackEffect::NoChange => Ok(None),
        }
    }

    fn finish(&mut self) -> Result<C, ParseError> {
        Err(ParseError::new(ErrorKind::MissingFirst))
    }
}
