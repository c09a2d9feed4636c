//! Sequential composition with replay of the captured context.
//!
//! While the first parser runs, the engine keeps the events whose stack
//! pushes are still live. When the first parser finishes, its continuation
//! is instantiated and those opening events are replayed into it in order,
//! so the continuation sees the ambient scopes before the live stream
//! resumes.

use alloc::{boxed::Box, rc::Rc, vec::Vec};

use super::Parser;
use crate::{
    error::{ErrorKind, ParseError, reentered},
    handler::{Emit, ParseHandler, Signal, TransformHandler},
    stack::{StackEffect, Stackable, Timing},
    transformer::Transformer,
};

impl<In, Out> Parser<In, Out>
where
    In: Stackable + Clone + 'static,
    Out: 'static,
{
    /// Runs `self` to completion, then builds a second parser from its
    /// result and continues on the same stream.
    ///
    /// The continuation first receives a replay of every event whose stack
    /// push is still live at the handover, in original order, then the
    /// remaining live stream. If the continuation finishes during replay,
    /// the rest of the live stream is discarded; if the stream ends while
    /// `self` is still running, the continuation is finalized right after
    /// the replay.
    #[must_use]
    pub fn followed_by<B: 'static>(
        self,
        next: impl Fn(Out) -> Parser<In, B> + 'static,
    ) -> Parser<In, B> {
        let next: Rc<dyn Fn(Out) -> Parser<In, B>> = Rc::new(next);
        let base = self;
        Parser::new("followed_by", move || {
            Box::new(FollowedByHandler {
                state: FollowState::First {
                    base: base.new_handler(),
                    next: Rc::clone(&next),
                    capture: Vec::new(),
                },
            })
        })
    }

    /// Like [`followed_by`](Parser::followed_by), but the continuation is a
    /// transformer, yielding a transformer over the whole stream.
    #[must_use]
    pub fn followed_by_stream<B: 'static>(
        self,
        next: impl Fn(Out) -> Transformer<In, B> + 'static,
    ) -> Transformer<In, B> {
        let next: Rc<dyn Fn(Out) -> Transformer<In, B>> = Rc::new(next);
        let base = self;
        Transformer::new(move || {
            Box::new(FollowedByStreamHandler {
                state: FollowStreamState::First {
                    base: base.new_handler(),
                    next: Rc::clone(&next),
                    capture: Vec::new(),
                },
            })
        })
    }
}

// Keeps `capture` mirroring the live stack: each push appends the causing
// event, each pop removes its partner.
fn track_capture<In: Stackable + Clone>(
    capture: &mut Vec<In>,
    input: &In,
    at: Timing,
) -> Result<(), ParseError> {
    match input.stack_effect() {
        StackEffect::Push { timing, .. } if timing == at => capture.push(input.clone()),
        StackEffect::Pop { timing } if timing == at => {
            if capture.pop().is_none() {
                return Err(ParseError::new(ErrorKind::StackUnderflow));
            }
        }
        _ => {}
    }
    Ok(())
}

enum FollowState<In, A, B> {
    First {
        base: Box<dyn ParseHandler<In, Out = A>>,
        next: Rc<dyn Fn(A) -> Parser<In, B>>,
        capture: Vec<In>,
    },
    Second {
        next: Box<dyn ParseHandler<In, Out = B>>,
    },
    Done,
}

struct FollowedByHandler<In, A, B> {
    state: FollowState<In, A, B>,
}

impl<In, A, B> ParseHandler<In> for FollowedByHandler<In, A, B>
where
    In: Stackable + Clone + 'static,
    A: 'static,
    B: 'static,
{
    type Out = B;

    fn step(&mut self, input: &In) -> Result<Option<B>, ParseError> {
        match &mut self.state {
            FollowState::First { .. } => {}
            FollowState::Second { next } => return next.step(input),
            FollowState::Done => return Err(reentered()),
        }
        let FollowState::First {
            mut base,
            next,
            mut capture,
        } = core::mem::replace(&mut self.state, FollowState::Done)
        else {
            return Err(reentered());
        };
        track_capture(&mut capture, input, Timing::Before)?;
        let stepped = base.step(input);
        track_capture(&mut capture, input, Timing::After)?;
        match stepped? {
            Some(value) => {
                let mut handler = (next)(value).new_handler();
                for event in &capture {
                    if let Some(result) = handler.step(event)? {
                        return Ok(Some(result));
                    }
                }
                self.state = FollowState::Second { next: handler };
                Ok(None)
            }
            None => {
                self.state = FollowState::First {
                    base,
                    next,
                    capture,
                };
                Ok(None)
            }
        }
    }

    fn finish(&mut self) -> Result<B, ParseError> {
        match core::mem::replace(&mut self.state, FollowState::Done) {
            FollowState::First {
                mut base,
                next,
                capture,
            } => {
                let value = base.finish()?;
                let mut handler = (next)(value).new_handler();
                for event in &capture {
                    if let Some(result) = handler.step(event)? {
                        return Ok(result);
                    }
                }
                handler.finish()
            }
            FollowState::Second { mut next } => next.finish(),
            FollowState::Done => Err(reentered()),
        }
    }
}

enum FollowStreamState<In, A, B> {
    First {
        base: Box<dyn ParseHandler<In, Out = A>>,
        next: Rc<dyn Fn(A) -> Transformer<In, B>>,
        capture: Vec<In>,
    },
    Second {
        next: Box<dyn TransformHandler<In, Out = B>>,
    },
    Done,
}

struct FollowedByStreamHandler<In, A, B> {
    state: FollowStreamState<In, A, B>,
}

impl<In, A, B> TransformHandler<In> for FollowedByStreamHandler<In, A, B>
where
    In: Stackable + Clone + 'static,
    A: 'static,
    B: 'static,
{
    type Out = B;

    fn push(&mut self, input: &In, out: &mut Emit<B>) -> Result<Signal, ParseError> {
        match &mut self.state {
            FollowStreamState::First { .. } => {}
            FollowStreamState::Second { next } => return next.push(input, out),
            FollowStreamState::Done => return Ok(Signal::Stop),
        }
        let FollowStreamState::First {
            mut base,
            next,
            mut capture,
        } = core::mem::replace(&mut self.state, FollowStreamState::Done)
        else {
            return Ok(Signal::Stop);
        };
        track_capture(&mut capture, input, Timing::Before)?;
        let stepped = base.step(input);
        track_capture(&mut capture, input, Timing::After)?;
        match stepped? {
            Some(value) => {
                let mut handler = (next)(value).new_handler();
                for event in &capture {
                    if handler.push(event, out)?.is_stop() {
                        return Ok(Signal::Stop);
                    }
                }
                self.state = FollowStreamState::Second { next: handler };
                Ok(Signal::Continue)
            }
            None => {
                self.state = FollowStreamState::First {
                    base,
                    next,
                    capture,
                };
                Ok(Signal::Continue)
            }
        }
    }

    fn flush(&mut self, out: &mut Emit<B>) -> Result<(), ParseError> {
        match core::mem::replace(&mut self.state, FollowStreamState::Done) {
            FollowStreamState::First {
                mut base,
                next,
                capture,
            } => {
                let value = base.finish()?;
                let mut handler = (next)(value).new_handler();
                for event in &capture {
                    if handler.push(event, out)?.is_stop() {
                        return Ok(());
                    }
                }
                handler.flush(out)
            }
            FollowStreamState::Second { mut next } => next.flush(out),
            FollowStreamState::Done => Ok(()),
        }
    }
}
