//! The `Transformer` combinator surface.
//!
//! A [`Transformer`] is a stateless factory for [`TransformHandler`]s,
//! mapping a stream of inputs to a stream of outputs. Transformers chain
//! with [`then`](Transformer::then) and terminate into a parser with
//! [`parse_with`](Transformer::parse_with), which is how a splitter's
//! sub-results become a single parsed value.
//!
//! # Examples
//!
//! ```
//! use substream::Transformer;
//!
//! let evens = Transformer::identity().filter(|n: &i64| n % 2 == 0);
//! let collected: Result<Vec<_>, _> = evens.transform([1, 2, 3, 4]).collect();
//! assert_eq!(collected.unwrap(), vec![2, 4]);
//! ```

use alloc::{boxed::Box, collections::VecDeque, format, rc::Rc, vec::Vec};
use core::fmt;

use crate::{
    error::ParseError,
    handler::{Emit, ParseHandler, Signal, TransformHandler},
    parser::Parser,
};

type MakeHandler<In, Out> = dyn Fn() -> Box<dyn TransformHandler<In, Out = Out>>;

/// A declarative recipe for turning one event stream into another.
pub struct Transformer<In, Out> {
    make: Rc<MakeHandler<In, Out>>,
}

impl<In, Out> Clone for Transformer<In, Out> {
    fn clone(&self) -> Self {
        Self {
            make: Rc::clone(&self.make),
        }
    }
}

impl<In, Out> fmt::Debug for Transformer<In, Out> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transformer")
    }
}

impl<In: Clone + 'static> Transformer<In, In> {
    /// Passes every input through unchanged.
    #[must_use]
    pub fn identity() -> Self {
        Transformer::new(|| Box::new(IdentityHandler))
    }
}

impl<In: 'static, Out: 'static> Transformer<In, Out> {
    /// Builds a transformer from a handler factory.
    ///
    /// The factory must be pure: each call returns a fresh handler with no
    /// state shared across calls.
    pub fn new(make: impl Fn() -> Box<dyn TransformHandler<In, Out = Out>> + 'static) -> Self {
        Self {
            make: Rc::new(make),
        }
    }

    /// Starts an independent transformation.
    #[must_use]
    pub fn new_handler(&self) -> Box<dyn TransformHandler<In, Out = Out>> {
        (self.make)()
    }

    fn wrap_items<B: 'static>(
        self,
        op_factory: impl Fn() -> Box<dyn FnMut(Out, &mut Emit<B>) -> Signal> + 'static,
    ) -> Transformer<In, B> {
        let base = self;
        Transformer::new(move || {
            Box::new(ItemwiseHandler {
                inner: base.new_handler(),
                scratch: Emit::new(),
                op: op_factory(),
                done: false,
            })
        })
    }

    /// Transforms each output.
    #[must_use]
    pub fn map<B: 'static>(self, f: impl Fn(Out) -> B + 'static) -> Transformer<In, B> {
        let f = Rc::new(f);
        self.wrap_items(move || {
            let f = Rc::clone(&f);
            Box::new(move |item, out| {
                out.push(f(item));
                Signal::Continue
            })
        })
    }

    /// Expands each output into zero or more outputs.
    #[must_use]
    pub fn flat_map<B: 'static, Iter>(
        self,
        f: impl Fn(Out) -> Iter + 'static,
    ) -> Transformer<In, B>
    where
        Iter: IntoIterator<Item = B>,
    {
        let f = Rc::new(f);
        self.wrap_items(move || {
            let f = Rc::clone(&f);
            Box::new(move |item, out| {
                for produced in f(item) {
                    out.push(produced);
                }
                Signal::Continue
            })
        })
    }

    /// Keeps only outputs satisfying `predicate`.
    #[must_use]
    pub fn filter(self, predicate: impl Fn(&Out) -> bool + 'static) -> Transformer<In, Out> {
        let predicate = Rc::new(predicate);
        self.wrap_items(move || {
            let predicate = Rc::clone(&predicate);
            Box::new(move |item, out| {
                if predicate(&item) {
                    out.push(item);
                }
                Signal::Continue
            })
        })
    }

    /// Filter and map in one pass.
    #[must_use]
    pub fn filter_map<B: 'static>(
        self,
        f: impl Fn(Out) -> Option<B> + 'static,
    ) -> Transformer<In, B> {
        let f = Rc::new(f);
        self.wrap_items(move || {
            let f = Rc::clone(&f);
            Box::new(move |item, out| {
                if let Some(produced) = f(item) {
                    out.push(produced);
                }
                Signal::Continue
            })
        })
    }

    /// Passes through the first `count` outputs, then terminates
    /// downstream.
    #[must_use]
    pub fn take(self, count: usize) -> Transformer<In, Out> {
        self.wrap_items(move || {
            let mut remaining = count;
            Box::new(move |item, out| {
                if remaining == 0 {
                    return Signal::Stop;
                }
                out.push(item);
                remaining -= 1;
                if remaining == 0 {
                    Signal::Stop
                } else {
                    Signal::Continue
                }
            })
        })
    }

    /// Passes outputs through while `predicate` holds, then terminates
    /// downstream; the first failing output is dropped.
    #[must_use]
    pub fn take_while(self, predicate: impl Fn(&Out) -> bool + 'static) -> Transformer<In, Out> {
        let predicate = Rc::new(predicate);
        self.wrap_items(move || {
            let predicate = Rc::clone(&predicate);
            Box::new(move |item, out| {
                if predicate(&item) {
                    out.push(item);
                    Signal::Continue
                } else {
                    Signal::Stop
                }
            })
        })
    }

    /// Discards the first `count` outputs.
    #[must_use]
    pub fn skip(self, count: usize) -> Transformer<In, Out> {
        self.wrap_items(move || {
            let mut remaining = count;
            Box::new(move |item, out| {
                if remaining > 0 {
                    remaining -= 1;
                } else {
                    out.push(item);
                }
                Signal::Continue
            })
        })
    }

    /// Discards outputs while `predicate` holds, then passes everything
    /// through.
    #[must_use]
    pub fn skip_while(self, predicate: impl Fn(&Out) -> bool + 'static) -> Transformer<In, Out> {
        let predicate = Rc::new(predicate);
        self.wrap_items(move || {
            let predicate = Rc::clone(&predicate);
            let mut skipping = true;
            Box::new(move |item, out| {
                if skipping && predicate(&item) {
                    return Signal::Continue;
                }
                skipping = false;
                out.push(item);
                Signal::Continue
            })
        })
    }

    /// Observes each output without changing the stream.
    #[must_use]
    pub fn inspect(self, f: impl Fn(&Out) + 'static) -> Transformer<In, Out> {
        let f = Rc::new(f);
        self.wrap_items(move || {
            let f = Rc::clone(&f);
            Box::new(move |item, out| {
                f(&item);
                out.push(item);
                Signal::Continue
            })
        })
    }

    /// Emits the running accumulation of `f` over the outputs.
    #[must_use]
    pub fn scan<B: Clone + 'static>(
        self,
        init: B,
        f: impl Fn(B, Out) -> B + 'static,
    ) -> Transformer<In, B> {
        let f = Rc::new(f);
        self.wrap_items(move || {
            let f = Rc::clone(&f);
            let mut accumulator = init.clone();
            Box::new(move |item, out| {
                accumulator = f(accumulator.clone(), item);
                out.push(accumulator.clone());
                Signal::Continue
            })
        })
    }

    /// Chains a second transformer over this one's outputs.
    #[must_use]
    pub fn then<B: 'static>(self, next: Transformer<Out, B>) -> Transformer<In, B> {
        let first = self;
        Transformer::new(move || {
            Box::new(ThenHandler {
                first: first.new_handler(),
                second: next.new_handler(),
                scratch: Emit::new(),
                done: false,
            })
        })
    }

    /// Feeds this transformer's outputs into a parser, yielding a parser
    /// over the original input type.
    ///
    /// The parser finishes when it produces a result, or when this
    /// transformer terminates (at which point the parser is finalized).
    #[must_use]
    pub fn parse_with<T: 'static>(self, parser: Parser<Out, T>) -> Parser<In, T> {
        let upstream = self;
        Parser::new("parse_with", move || {
            Box::new(ParseWithHandler {
                transformer: upstream.new_handler(),
                parser: parser.new_handler(),
                scratch: Emit::new(),
            })
        })
    }

    /// Collects every output into a list.
    #[must_use]
    pub fn parse_to_list(self) -> Parser<In, Vec<Out>>
    where
        Out: Clone,
    {
        self.parse_with(Parser::to_list())
    }

    /// Finishes with the first output; raises
    /// [`MissingFirst`](crate::ErrorKind::MissingFirst) if there is none.
    #[must_use]
    pub fn parse_first(self) -> Parser<In, Out>
    where
        Out: Clone,
    {
        self.parse_with(Parser::first())
    }

    /// Finishes with the first output, or `None` if there is none.
    #[must_use]
    pub fn parse_first_opt(self) -> Parser<In, Option<Out>>
    where
        Out: Clone,
    {
        self.parse_with(Parser::first_opt())
    }

    /// Folds every output into an accumulator.
    #[must_use]
    pub fn parse_fold<Acc: Clone + 'static>(
        self,
        init: Acc,
        f: impl Fn(Acc, &Out) -> Acc + 'static,
    ) -> Parser<In, Acc> {
        self.parse_with(Parser::fold(init, f))
    }

    /// Applies the transformation to an iterator, yielding an iterator of
    /// outputs (and at most one error).
    pub fn transform<I>(&self, source: I) -> TransformIter<In, Out, I::IntoIter>
    where
        I: IntoIterator<Item = In>,
        In: fmt::Debug,
    {
        TransformIter {
            handler: Some(self.new_handler()),
            source: source.into_iter(),
            queue: VecDeque::new(),
            scratch: Emit::new(),
        }
    }
}

/// Iterator adapter produced by [`Transformer::transform`].
pub struct TransformIter<In, Out, I> {
    handler: Option<Box<dyn TransformHandler<In, Out = Out>>>,
    source: I,
    queue: VecDeque<Out>,
    scratch: Emit<Out>,
}

impl<In, Out, I> Iterator for TransformIter<In, Out, I>
where
    In: fmt::Debug,
    I: Iterator<Item = In>,
{
    type Item = Result<Out, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.queue.pop_front() {
                return Some(Ok(item));
            }
            let handler = self.handler.as_mut()?;
            match self.source.next() {
                Some(input) => match handler.push(&input, &mut self.scratch) {
                    Ok(signal) => {
                        self.queue.extend(self.scratch.take());
                        if signal.is_stop() {
                            self.handler = None;
                        }
                    }
                    Err(error) => {
                        self.handler = None;
                        return Some(Err(error.with_witness(format!("{input:?}"))));
                    }
                },
                None => {
                    let mut handler = self.handler.take()?;
                    match handler.flush(&mut self.scratch) {
                        Ok(()) => self.queue.extend(self.scratch.take()),
                        Err(error) => return Some(Err(error)),
                    }
                }
            }
        }
    }
}

// ─── handlers ───────────────────────────────────────────────────────────

struct IdentityHandler;

impl<In: Clone> TransformHandler<In> for IdentityHandler {
    type Out = In;

    fn push(&mut self, input: &In, out: &mut Emit<In>) -> Result<Signal, ParseError> {
        out.push(input.clone());
        Ok(Signal::Continue)
    }

    fn flush(&mut self, _out: &mut Emit<In>) -> Result<(), ParseError> {
        Ok(())
    }
}

// Shared shell for the item-wise combinators: the `op` closure carries the
// per-handler state (counters, flags, accumulators).
struct ItemwiseHandler<In, A, B> {
    inner: Box<dyn TransformHandler<In, Out = A>>,
    scratch: Emit<A>,
    op: Box<dyn FnMut(A, &mut Emit<B>) -> Signal>,
    done: bool,
}

impl<In, A, B> TransformHandler<In> for ItemwiseHandler<In, A, B> {
    type Out = B;

    fn push(&mut self, input: &In, out: &mut Emit<B>) -> Result<Signal, ParseError> {
        if self.done {
            return Ok(Signal::Stop);
        }
        let signal = self.inner.push(input, &mut self.scratch)?;
        for item in self.scratch.take() {
            if (self.op)(item, out).is_stop() {
                self.done = true;
                return Ok(Signal::Stop);
            }
        }
        if signal.is_stop() {
            self.done = true;
        }
        Ok(signal)
    }

    fn flush(&mut self, out: &mut Emit<B>) -> Result<(), ParseError> {
        if self.done {
            return Ok(());
        }
        self.done = true;
        self.inner.flush(&mut self.scratch)?;
        for item in self.scratch.take() {
            if (self.op)(item, out).is_stop() {
                break;
            }
        }
        Ok(())
    }
}

struct ThenHandler<In, M, B> {
    first: Box<dyn TransformHandler<In, Out = M>>,
    second: Box<dyn TransformHandler<M, Out = B>>,
    scratch: Emit<M>,
    done: bool,
}

impl<In, M, B> TransformHandler<In> for ThenHandler<In, M, B> {
    type Out = B;

    fn push(&mut self, input: &In, out: &mut Emit<B>) -> Result<Signal, ParseError> {
        if self.done {
            return Ok(Signal::Stop);
        }
        let signal = self.first.push(input, &mut self.scratch)?;
        for item in self.scratch.take() {
            if self.second.push(&item, out)?.is_stop() {
                self.done = true;
                return Ok(Signal::Stop);
            }
        }
        if signal.is_stop() {
            self.done = true;
            self.second.flush(out)?;
            return Ok(Signal::Stop);
        }
        Ok(Signal::Continue)
    }

    fn flush(&mut self, out: &mut Emit<B>) -> Result<(), ParseError> {
        if self.done {
            return Ok(());
        }
        self.done = true;
        self.first.flush(&mut self.scratch)?;
        for item in self.scratch.take() {
            if self.second.push(&item, out)?.is_stop() {
                return Ok(());
            }
        }
        self.second.flush(out)
    }
}

struct ParseWithHandler<In, M, T> {
    transformer: Box<dyn TransformHandler<In, Out = M>>,
    parser: Box<dyn ParseHandler<M, Out = T>>,
    scratch: Emit<M>,
}

impl<In, M, T> ParseHandler<In> for ParseWithHandler<In, M, T> {
    type Out = T;

    fn step(&mut self, input: &In) -> Result<Option<T>, ParseError> {
        let signal = self.transformer.push(input, &mut self.scratch)?;
        for item in self.scratch.take() {
            if let Some(result) = self.parser.step(&item)? {
                return Ok(Some(result));
            }
        }
        if signal.is_stop() {
            return self.parser.finish().map(Some);
        }
        Ok(None)
    }

    fn finish(&mut self) -> Result<T, ParseError> {
        self.transformer.flush(&mut self.scratch)?;
        for item in self.scratch.take() {
            if let Some(result) = self.parser.step(&item)? {
                return Ok(result);
            }
        }
        self.parser.finish()
    }

    fn recover(&mut self, error: ParseError) -> Result<Option<T>, ParseError> {
        self.parser.recover(error)
    }
}
