//! The `Parser` combinator surface.
//!
//! A [`Parser`] is a stateless, cheap-to-clone factory for
//! [`ParseHandler`]s. Declarative composition happens on parsers; all
//! mutable state lives in the handlers a parse instantiates, so one parser
//! value can drive any number of independent parses.
//!
//! # Examples
//!
//! ```
//! use substream::Parser;
//!
//! let sum = Parser::fold(0i64, |acc, n: &i64| acc + n);
//! assert_eq!(sum.parse([1, 2, 3]).unwrap(), 6);
//! assert_eq!(sum.parse([10, 20]).unwrap(), 30);
//! ```

mod compound;
mod expect;
mod followed_by;
mod interrupt;

use alloc::{
    boxed::Box,
    format,
    rc::Rc,
    string::{String, ToString},
    vec,
    vec::Vec,
};
use core::fmt;

pub use compound::ParserTuple;
pub use expect::Expectation;
pub use interrupt::context_start;

use crate::{
    error::{CallSite, ErrorKind, ParseError, TraceElement, reentered},
    handler::ParseHandler,
    source::EventSource,
};

type MakeHandler<In, Out> = dyn Fn() -> Box<dyn ParseHandler<In, Out = Out>>;

struct ParserInner<In, Out> {
    name: Rc<str>,
    make: Box<MakeHandler<In, Out>>,
    // Present when this parser is a fallback chain; `or_else` flattens
    // through it instead of nesting.
    fallback_branches: Option<Vec<Parser<In, Out>>>,
}

/// A declarative recipe for extracting one value from an event stream.
///
/// Parsers are immutable values: every combinator returns a new parser and
/// [`new_handler`](Parser::new_handler) starts an independent parse.
pub struct Parser<In, Out> {
    inner: Rc<ParserInner<In, Out>>,
}

impl<In, Out> Clone for Parser<In, Out> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<In, Out> fmt::Debug for Parser<In, Out> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parser({})", self.inner.name)
    }
}

impl<In: 'static, Out: 'static> Parser<In, Out> {
    /// Builds a parser from a handler factory.
    ///
    /// The factory must be pure: each call returns a fresh handler with no
    /// state shared across calls. `name` appears in diagnostic traces.
    pub fn new(
        name: impl Into<String>,
        make: impl Fn() -> Box<dyn ParseHandler<In, Out = Out>> + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(ParserInner {
                name: Rc::from(name.into().as_str()),
                make: Box::new(make),
                fallback_branches: None,
            }),
        }
    }

    /// Starts an independent parse.
    #[must_use]
    pub fn new_handler(&self) -> Box<dyn ParseHandler<In, Out = Out>> {
        (self.inner.make)()
    }

    /// The name shown in diagnostic traces.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Renames the parser for diagnostic traces.
    #[must_use]
    pub fn with_name(self, name: impl Into<String>) -> Self {
        let base = self.clone();
        Self {
            inner: Rc::new(ParserInner {
                name: Rc::from(name.into().as_str()),
                make: Box::new(move || base.new_handler()),
                fallback_branches: self.inner.fallback_branches.clone(),
            }),
        }
    }

    /// A parser that finishes immediately with `value`, consuming nothing.
    #[must_use]
    pub fn pure(value: Out) -> Self
    where
        Out: Clone,
    {
        Parser::new("pure", move || {
            Box::new(PureHandler {
                value: Some(value.clone()),
            })
        })
    }

    /// A parser that finishes immediately with the outcome of `effect`.
    pub fn eval(effect: impl Fn() -> Result<Out, ParseError> + 'static) -> Self {
        let effect: Rc<dyn Fn() -> Result<Out, ParseError>> = Rc::new(effect);
        Parser::new("eval", move || {
            Box::new(EvalHandler {
                effect: Rc::clone(&effect),
                spent: false,
            })
        })
    }

    /// Defers construction, enabling recursive grammars.
    ///
    /// `build` runs once per parse, when the handler tree is instantiated,
    /// so a parser may refer to itself through a closure.
    pub fn defer(build: impl Fn() -> Parser<In, Out> + 'static) -> Self {
        Parser::new("defer", move || build().new_handler())
    }

    /// Folds every input into an accumulator; finishes at end-of-stream
    /// with the final accumulator.
    pub fn fold(init: Out, f: impl Fn(Out, &In) -> Out + 'static) -> Self
    where
        Out: Clone,
    {
        let f: Rc<dyn Fn(Out, &In) -> Out> = Rc::new(f);
        Parser::new("fold", move || {
            Box::new(FoldHandler {
                accumulator: Some(init.clone()),
                f: Rc::clone(&f),
            })
        })
    }

    /// Like [`fold`](Parser::fold), but the folding step may fail; the
    /// failure is raised through the effect channel at the offending input.
    pub fn try_fold(init: Out, f: impl Fn(Out, &In) -> Result<Out, ParseError> + 'static) -> Self
    where
        Out: Clone,
    {
        let f: Rc<dyn Fn(Out, &In) -> Result<Out, ParseError>> = Rc::new(f);
        Parser::new("try_fold", move || {
            Box::new(TryFoldHandler {
                accumulator: Some(init.clone()),
                f: Rc::clone(&f),
            })
        })
    }

    /// Transforms the result. Pulls exactly as many inputs as the base.
    #[must_use]
    pub fn map<B: 'static>(self, f: impl Fn(Out) -> B + 'static) -> Parser<In, B> {
        let f: Rc<dyn Fn(Out) -> B> = Rc::new(f);
        let base = self;
        Parser::new("map", move || {
            Box::new(MapHandler {
                inner: base.new_handler(),
                f: Rc::clone(&f),
            })
        })
    }

    /// Transforms the result fallibly; a failure is raised at the moment
    /// the base finishes, never earlier.
    #[must_use]
    pub fn try_map<B: 'static>(
        self,
        f: impl Fn(Out) -> Result<B, ParseError> + 'static,
    ) -> Parser<In, B> {
        let f: Rc<dyn Fn(Out) -> Result<B, ParseError>> = Rc::new(f);
        let base = self;
        Parser::new("try_map", move || {
            Box::new(TryMapHandler {
                inner: base.new_handler(),
                f: Rc::clone(&f),
            })
        })
    }

    /// Fallback: runs `self` and `other` in logical parallel on the same
    /// inputs; the first branch to finish with success wins, ties going to
    /// the earlier branch in the chain.
    ///
    /// Chains flatten: `a.or_else(b).or_else(c)` is a single three-way
    /// chain, not a nested pair. A branch that fails is discarded while any
    /// other branch survives; when every branch has failed, the parse
    /// raises [`ErrorKind::FallbackChainFailure`] carrying the underlying
    /// errors in the order in which each branch failed.
    #[must_use]
    pub fn or_else(self, other: Parser<In, Out>) -> Parser<In, Out> {
        let mut branches = self.into_fallback_branches();
        branches.extend(other.into_fallback_branches());
        let handler_branches = branches.clone();
        Parser {
            inner: Rc::new(ParserInner {
                name: Rc::from("or_else"),
                make: Box::new(move || {
                    Box::new(OrElseHandler {
                        branches: handler_branches
                            .iter()
                            .map(|branch| Some(branch.new_handler()))
                            .collect(),
                        failures: Vec::new(),
                    })
                }),
                fallback_branches: Some(branches),
            }),
        }
    }

    fn into_fallback_branches(self) -> Vec<Parser<In, Out>> {
        match &self.inner.fallback_branches {
            Some(branches) => branches.clone(),
            None => vec![self],
        }
    }

    /// Lifts failure into the success channel: the result becomes
    /// `Result<Out, ParseError>`, and a failing base finishes the parse
    /// with `Err` instead of raising.
    #[must_use]
    pub fn attempt(self) -> Parser<In, Result<Out, ParseError>> {
        let base = self;
        Parser::new("attempt", move || {
            Box::new(AttemptHandler {
                inner: Some(base.new_handler()),
            })
        })
    }

    /// Drives this parser over a finite event source.
    ///
    /// # Errors
    ///
    /// The single [`ParseError`] raised by the handler tree, tagged with
    /// this call site.
    #[track_caller]
    pub fn parse<I>(&self, source: I) -> Result<Out, ParseError>
    where
        I: IntoIterator<Item = In>,
        In: fmt::Debug,
    {
        let call_site = CallSite::capture();
        self.run(source.into_iter().map(Ok), "parse", call_site)
    }

    /// Drives this parser over a source that may itself fail.
    ///
    /// Source errors are routed through [`ParseHandler::recover`], so an
    /// [`attempt`](Parser::attempt) wrapper can observe them.
    ///
    /// # Errors
    ///
    /// The single [`ParseError`] raised by the handler tree or the source.
    #[track_caller]
    pub fn parse_results<I, E>(&self, source: I) -> Result<Out, ParseError>
    where
        I: IntoIterator<Item = Result<In, E>>,
        E: core::error::Error + Send + Sync + 'static,
        In: fmt::Debug,
    {
        let call_site = CallSite::capture();
        self.run(
            source
                .into_iter()
                .map(|item| item.map_err(ParseError::caught)),
            "parse_results",
            call_site,
        )
    }

    /// Drives this parser over an [`EventSource`] adapter.
    ///
    /// # Errors
    ///
    /// The single [`ParseError`] raised by the handler tree or the source.
    #[track_caller]
    pub fn parse_stream<Src>(&self, source: Src) -> Result<Out, ParseError>
    where
        Src: EventSource<In>,
        In: fmt::Debug,
    {
        let call_site = CallSite::capture();
        self.run(source.into_event_stream(), "parse_stream", call_site)
    }

    fn run<I>(
        &self,
        source: I,
        method: &'static str,
        call_site: CallSite,
    ) -> Result<Out, ParseError>
    where
        I: Iterator<Item = Result<In, ParseError>>,
        In: fmt::Debug,
    {
        let mut handler = self.new_handler();
        for item in source {
            match item {
                Ok(input) => match handler.step(&input) {
                    Ok(Some(result)) => return Ok(result),
                    Ok(None) => {}
                    Err(error) => {
                        let error = error.with_witness(format!("{input:?}"));
                        return Err(self.tag_entry(error, method, call_site));
                    }
                },
                Err(source_error) => match handler.recover(source_error) {
                    Ok(Some(result)) => return Ok(result),
                    Ok(None) => {}
                    Err(error) => return Err(self.tag_entry(error, method, call_site)),
                },
            }
        }
        handler
            .finish()
            .map_err(|error| self.tag_entry(error, method, call_site))
    }

    fn tag_entry(
        &self,
        error: ParseError,
        method: &'static str,
        call_site: CallSite,
    ) -> ParseError {
        error.with_trace(TraceElement::InParse {
            parser: self.inner.name.to_string(),
            method,
            call_site,
        })
    }
}

impl<In: Clone + 'static> Parser<In, In> {
    /// Finishes with the first input; end-of-stream before any input
    /// raises [`ErrorKind::MissingFirst`].
    #[must_use]
    pub fn first() -> Parser<In, In> {
        Parser::new("first", || Box::new(FirstHandler))
    }

    /// Finishes with `Some(first input)`, or `None` at end-of-stream.
    #[must_use]
    pub fn first_opt() -> Parser<In, Option<In>> {
        Parser::new("first_opt", || Box::new(FirstOptHandler))
    }

    /// Buffers every input; finishes at end-of-stream with the list.
    #[must_use]
    pub fn to_list() -> Parser<In, Vec<In>> {
        Parser::new("to_list", || Box::new(ToListHandler { buffer: Vec::new() }))
    }
}

impl<In: 'static, Out: 'static> Parser<In, Result<Out, ParseError>> {
    /// Inverse of [`attempt`](Parser::attempt): a success of `Err(e)`
    /// re-raises `e` through the effect channel.
    ///
    /// `p.attempt().rethrow()` is observationally equal to `p`.
    #[must_use]
    pub fn rethrow(self) -> Parser<In, Out> {
        let base = self;
        Parser::new("rethrow", move || {
            Box::new(RethrowHandler {
                inner: base.new_handler(),
            })
        })
    }

    /// Discards a captured failure instead of re-raising it: on a success
    /// of `Err(_)` the parser stalls and never finishes.
    ///
    /// This is the adapter that turns `attempt` into interrupter-failure
    /// suppression: an `interrupted_by(i.attempt().ok_only())` interrupter
    /// that fails simply never fires.
    #[must_use]
    pub fn ok_only(self) -> Parser<In, Out> {
        let base = self;
        Parser::new("ok_only", move || {
            Box::new(OkOnlyHandler {
                inner: Some(base.new_handler()),
                stalled: None,
            })
        })
    }
}

impl<In: 'static, Out: 'static, E> Parser<In, Result<Out, E>>
where
    E: core::error::Error + Send + Sync + 'static,
{
    /// Unwraps a `Result`-shaped success: `Ok` becomes the plain result,
    /// `Err` is wrapped in [`ErrorKind::Caught`] and raised.
    #[must_use]
    pub fn unwrap_safe(self) -> Parser<In, Out> {
        let base = self;
        Parser::new("unwrap_safe", move || {
            Box::new(UnwrapSafeHandler {
                inner: base.new_handler(),
            })
        })
    }
}

// ─── primitive handlers ─────────────────────────────────────────────────

struct PureHandler<Out> {
    value: Option<Out>,
}

impl<In, Out> ParseHandler<In> for PureHandler<Out> {
    type Out = Out;

    fn step(&mut self, _input: &In) -> Result<Option<Out>, ParseError> {
        match self.value.take() {
            Some(value) => Ok(Some(value)),
            None => Err(reentered()),
        }
    }

    fn finish(&mut self) -> Result<Out, ParseError> {
        self.value.take().ok_or_else(reentered)
    }
}

struct EvalHandler<Out> {
    effect: Rc<dyn Fn() -> Result<Out, ParseError>>,
    spent: bool,
}

impl<Out> EvalHandler<Out> {
    fn evaluate(&mut self) -> Result<Out, ParseError> {
        if self.spent {
            return Err(reentered());
        }
        self.spent = true;
        (self.effect)()
    }
}

impl<In, Out> ParseHandler<In> for EvalHandler<Out> {
    type Out = Out;

    fn step(&mut self, _input: &In) -> Result<Option<Out>, ParseError> {
        self.evaluate().map(Some)
    }

    fn finish(&mut self) -> Result<Out, ParseError> {
        self.evaluate()
    }
}

struct FirstHandler;

impl<In: Clone> ParseHandler<In> for FirstHandler {
    type Out = In;

    fn step(&mut self, input: &In) -> Result<Option<In>, ParseError> {
        Ok(Some(input.clone()))
    }

    fn finish(&mut self) -> Result<In, ParseError> {
        Err(ParseError::new(ErrorKind::MissingFirst))
    }
}

struct FirstOptHandler;

impl<In: Clone> ParseHandler<In> for FirstOptHandler {
    type Out = Option<In>;

    fn step(&mut self, input: &In) -> Result<Option<Option<In>>, ParseError> {
        Ok(Some(Some(input.clone())))
    }

    fn finish(&mut self) -> Result<Option<In>, ParseError> {
        Ok(None)
    }
}

struct ToListHandler<In> {
    buffer: Vec<In>,
}

impl<In: Clone> ParseHandler<In> for ToListHandler<In> {
    type Out = Vec<In>;

    fn step(&mut self, input: &In) -> Result<Option<Vec<In>>, ParseError> {
        self.buffer.push(input.clone());
        Ok(None)
    }

    fn finish(&mut self) -> Result<Vec<In>, ParseError> {
        Ok(core::mem::take(&mut self.buffer))
    }
}

struct FoldHandler<In, Out> {
    accumulator: Option<Out>,
    f: Rc<dyn Fn(Out, &In) -> Out>,
}

impl<In, Out> ParseHandler<In> for FoldHandler<In, Out> {
    type Out = Out;

    fn step(&mut self, input: &In) -> Result<Option<Out>, ParseError> {
        let accumulator = self.accumulator.take().ok_or_else(reentered)?;
        self.accumulator = Some((self.f)(accumulator, input));
        Ok(None)
    }

    fn finish(&mut self) -> Result<Out, ParseError> {
        self.accumulator.take().ok_or_else(reentered)
    }
}

struct TryFoldHandler<In, Out> {
    accumulator: Option<Out>,
    f: Rc<dyn Fn(Out, &In) -> Result<Out, ParseError>>,
}

impl<In, Out> ParseHandler<In> for TryFoldHandler<In, Out> {
    type Out = Out;

    fn step(&mut self, input: &In) -> Result<Option<Out>, ParseError> {
        let accumulator = self.accumulator.take().ok_or_else(reentered)?;
        self.accumulator = Some((self.f)(accumulator, input)?);
        Ok(None)
    }

    fn finish(&mut self) -> Result<Out, ParseError> {
        self.accumulator.take().ok_or_else(reentered)
    }
}

// ─── combinator handlers ────────────────────────────────────────────────

struct MapHandler<In, A, B> {
    inner: Box<dyn ParseHandler<In, Out = A>>,
    f: Rc<dyn Fn(A) -> B>,
}

impl<In, A, B> ParseHandler<In> for MapHandler<In, A, B> {
    type Out = B;

    fn step(&mut self, input: &In) -> Result<Option<B>, ParseError> {
        Ok(self.inner.step(input)?.map(|a| (self.f)(a)))
    }

    fn finish(&mut self) -> Result<B, ParseError> {
        self.inner.finish().map(|a| (self.f)(a))
    }

    fn recover(&mut self, error: ParseError) -> Result<Option<B>, ParseError> {
        Ok(self.inner.recover(error)?.map(|a| (self.f)(a)))
    }
}

struct TryMapHandler<In, A, B> {
    inner: Box<dyn ParseHandler<In, Out = A>>,
    f: Rc<dyn Fn(A) -> Result<B, ParseError>>,
}

impl<In, A, B> ParseHandler<In> for TryMapHandler<In, A, B> {
    type Out = B;

    fn step(&mut self, input: &In) -> Result<Option<B>, ParseError> {
        match self.inner.step(input)? {
            Some(a) => (self.f)(a).map(Some),
            None => Ok(None),
        }
    }

    fn finish(&mut self) -> Result<B, ParseError> {
        (self.f)(self.inner.finish()?)
    }

    fn recover(&mut self, error: ParseError) -> Result<Option<B>, ParseError> {
        match self.inner.recover(error)? {
            Some(a) => (self.f)(a).map(Some),
            None => Ok(None),
        }
    }
}

struct OrElseHandler<In, Out> {
    branches: Vec<Option<Box<dyn ParseHandler<In, Out = Out>>>>,
    failures: Vec<ParseError>,
}

impl<In, Out> OrElseHandler<In, Out> {
    fn chain_failure(&mut self) -> ParseError {
        ParseError::new(ErrorKind::FallbackChainFailure {
            errors: core::mem::take(&mut self.failures),
        })
    }
}

impl<In, Out> ParseHandler<In> for OrElseHandler<In, Out> {
    type Out = Out;

    fn step(&mut self, input: &In) -> Result<Option<Out>, ParseError> {
        let mut any_live = false;
        for slot in &mut self.branches {
            if let Some(handler) = slot {
                match handler.step(input) {
                    Ok(Some(result)) => return Ok(Some(result)),
                    Ok(None) => any_live = true,
                    Err(failure) => {
                        self.failures.push(failure);
                        *slot = None;
                    }
                }
            }
        }
        if any_live {
            Ok(None)
        } else {
            Err(self.chain_failure())
        }
    }

    fn finish(&mut self) -> Result<Out, ParseError> {
        for slot in &mut self.branches {
            if let Some(handler) = slot {
                let outcome = handler.finish();
                *slot = None;
                match outcome {
                    Ok(result) => return Ok(result),
                    Err(failure) => self.failures.push(failure),
                }
            }
        }
        Err(self.chain_failure())
    }
}

struct AttemptHandler<In, Out> {
    inner: Option<Box<dyn ParseHandler<In, Out = Out>>>,
}

impl<In, Out> ParseHandler<In> for AttemptHandler<In, Out> {
    type Out = Result<Out, ParseError>;

    fn step(&mut self, input: &In) -> Result<Option<Self::Out>, ParseError> {
        let inner = self.inner.as_mut().ok_or_else(reentered)?;
        match inner.step(input) {
            Ok(result) => Ok(result.map(Ok)),
            Err(failure) => {
                self.inner = None;
                Ok(Some(Err(failure)))
            }
        }
    }

    fn finish(&mut self) -> Result<Self::Out, ParseError> {
        let mut inner = self.inner.take().ok_or_else(reentered)?;
        match inner.finish() {
            Ok(result) => Ok(Ok(result)),
            Err(failure) => Ok(Err(failure)),
        }
    }

    fn recover(&mut self, error: ParseError) -> Result<Option<Self::Out>, ParseError> {
        match self.inner.as_mut() {
            Some(inner) => match inner.recover(error) {
                Ok(result) => Ok(result.map(Ok)),
                Err(failure) => {
                    self.inner = None;
                    Ok(Some(Err(failure)))
                }
            },
            None => Err(error),
        }
    }
}

struct RethrowHandler<In, Out> {
    inner: Box<dyn ParseHandler<In, Out = Result<Out, ParseError>>>,
}

impl<In, Out> ParseHandler<In> for RethrowHandler<In, Out> {
    type Out = Out;

    fn step(&mut self, input: &In) -> Result<Option<Out>, ParseError> {
        match self.inner.step(input)? {
            Some(Ok(result)) => Ok(Some(result)),
            Some(Err(failure)) => Err(failure),
            None => Ok(None),
        }
    }

    fn finish(&mut self) -> Result<Out, ParseError> {
        self.inner.finish()?
    }
}

struct UnwrapSafeHandler<In, Out, E> {
    inner: Box<dyn ParseHandler<In, Out = Result<Out, E>>>,
}

impl<In, Out, E> ParseHandler<In> for UnwrapSafeHandler<In, Out, E>
where
    E: core::error::Error + Send + Sync + 'static,
{
    type Out = Out;

    fn step(&mut self, input: &In) -> Result<Option<Out>, ParseError> {
        match self.inner.step(input)? {
            Some(Ok(result)) => Ok(Some(result)),
            Some(Err(cause)) => Err(ParseError::caught(cause)),
            None => Ok(None),
        }
    }

    fn finish(&mut self) -> Result<Out, ParseError> {
        self.inner.finish()?.map_err(ParseError::caught)
    }
}

struct OkOnlyHandler<In, Out> {
    inner: Option<Box<dyn ParseHandler<In, Out = Result<Out, ParseError>>>>,
    stalled: Option<ParseError>,
}

impl<In, Out> ParseHandler<In> for OkOnlyHandler<In, Out> {
    type Out = Out;

    fn step(&mut self, input: &In) -> Result<Option<Out>, ParseError> {
        if let Some(inner) = self.inner.as_mut() {
            match inner.step(input)? {
                Some(Ok(result)) => return Ok(Some(result)),
                Some(Err(failure)) => {
                    self.stalled = Some(failure);
                    self.inner = None;
                }
                None => {}
            }
        }
        Ok(None)
    }

    fn finish(&mut self) -> Result<Out, ParseError> {
        match self.inner.take() {
            Some(mut inner) => inner.finish()?,
            None => Err(self.stalled.take().unwrap_or_else(reentered)),
        }
    }
}
