//! Ordered guards on the first inputs of a stream.

use alloc::{boxed::Box, format, rc::Rc, string::String, vec::Vec};
use core::fmt;

use super::Parser;
use crate::{
    error::{ErrorKind, ParseError},
    handler::ParseHandler,
};

/// One labeled predicate in an [`expect_inputs`](Parser::expect_inputs)
/// guard sequence.
pub struct Expectation<In> {
    label: String,
    predicate: Box<dyn Fn(&In) -> bool>,
}

impl<In> Expectation<In> {
    /// Builds an expectation. The label names the expectation in errors.
    pub fn new(label: impl Into<String>, predicate: impl Fn(&In) -> bool + 'static) -> Self {
        Self {
            label: label.into(),
            predicate: Box::new(predicate),
        }
    }

    /// The label shown in diagnostics.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl<In> fmt::Debug for Expectation<In> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expectation({})", self.label)
    }
}

impl<In: 'static, Out: 'static> Parser<In, Out> {
    /// Guards the stream's first inputs with ordered expectations.
    ///
    /// Each incoming input must satisfy the next expectation in order; a
    /// violation raises [`ErrorKind::UnexpectedInput`] naming the input and
    /// the expectations not yet satisfied, and end-of-stream with
    /// expectations remaining raises [`ErrorKind::UnfulfilledInputs`].
    /// Matching inputs are forwarded to the base parser unchanged.
    #[must_use]
    pub fn expect_inputs(self, expectations: Vec<Expectation<In>>) -> Parser<In, Out>
    where
        In: fmt::Debug,
    {
        let expectations = Rc::new(expectations);
        let base = self;
        Parser::new("expect_inputs", move || {
            Box::new(ExpectInputsHandler {
                expectations: Rc::clone(&expectations),
                next: 0,
                inner: base.new_handler(),
            })
        })
    }
}

struct ExpectInputsHandler<In, Out> {
    expectations: Rc<Vec<Expectation<In>>>,
    next: usize,
    inner: Box<dyn ParseHandler<In, Out = Out>>,
}

impl<In, Out> ExpectInputsHandler<In, Out> {
    fn remaining_labels(&self) -> Vec<String> {
        self.expectations[self.next..]
            .iter()
            .map(|expectation| expectation.label.clone())
            .collect()
    }
}

impl<In: fmt::Debug, Out> ParseHandler<In> for ExpectInputsHandler<In, Out> {
    type Out = Out;

    fn step(&mut self, input: &In) -> Result<Option<Out>, ParseError> {
        if let Some(expectation) = self.expectations.get(self.next) {
            if !(expectation.predicate)(input) {
                return Err(ParseError::new(ErrorKind::UnexpectedInput {
                    input: format!("{input:?}"),
                    expectations: self.remaining_labels(),
                }));
            }
            self.next += 1;
        }
        self.inner.step(input)
    }

    fn finish(&mut self) -> Result<Out, ParseError> {
        if self.next < self.expectations.len() {
            return Err(ParseError::new(ErrorKind::UnfulfilledInputs {
                expectations: self.remaining_labels(),
            }));
        }
        self.inner.finish()
    }
}
