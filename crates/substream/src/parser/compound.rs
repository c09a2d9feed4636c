//! Tuple/product composition: several parsers sharing one stream.
//!
//! Every branch sees every input; the compound finishes once all branches
//! have finished. A branch failure propagates immediately, tagged with the
//! branch's position so the trace names which leg of the product failed.

use alloc::boxed::Box;

use super::Parser;
use crate::{
    error::{CallSite, ParseError, TraceElement, reentered},
    handler::ParseHandler,
};

fn step_branch<In, T>(
    handler: &mut Option<Box<dyn ParseHandler<In, Out = T>>>,
    result: &mut Option<T>,
    input: &In,
    index: usize,
    count: usize,
    call_site: CallSite,
) -> Result<(), ParseError> {
    if let Some(active) = handler {
        match active.step(input) {
            Ok(Some(value)) => {
                *result = Some(value);
                *handler = None;
            }
            Ok(None) => {}
            Err(error) => {
                return Err(error.with_trace(TraceElement::InCompound {
                    index,
                    count,
                    call_site,
                }));
            }
        }
    }
    Ok(())
}

fn finish_branch<In, T>(
    handler: &mut Option<Box<dyn ParseHandler<In, Out = T>>>,
    result: &mut Option<T>,
    index: usize,
    count: usize,
    call_site: CallSite,
) -> Result<(), ParseError> {
    if let Some(active) = handler {
        let outcome = active.finish();
        *handler = None;
        match outcome {
            Ok(value) => *result = Some(value),
            Err(error) => {
                return Err(error.with_trace(TraceElement::InCompound {
                    index,
                    count,
                    call_site,
                }));
            }
        }
    }
    Ok(())
}

/// Tuples of parsers over a common input type, composable into a single
/// parser producing the tuple of results.
///
/// Implemented for arities 2 through 5.
///
/// # Examples
///
/// ```
/// use substream::{Parser, ParserTuple};
///
/// let both = (Parser::first(), Parser::to_list()).tupled();
/// assert_eq!(both.parse([1, 2, 3]).unwrap(), (1, vec![1, 2, 3]));
/// ```
pub trait ParserTuple<In>: Sized {
    /// The tuple of branch results.
    type Out;

    #[doc(hidden)]
    fn tupled_at(self, call_site: CallSite) -> Parser<In, Self::Out>;

    /// Composes the branches into one parser finishing when all branches
    /// have finished.
    #[track_caller]
    fn tupled(self) -> Parser<In, Self::Out> {
        self.tupled_at(CallSite::capture())
    }
}

impl<In: 'static, Out: 'static> Parser<In, Out> {
    /// Pair product: runs both parsers on the same stream and finishes
    /// with both results once both have finished.
    #[track_caller]
    #[must_use]
    pub fn and<B: 'static>(self, other: Parser<In, B>) -> Parser<In, (Out, B)> {
        (self, other).tupled_at(CallSite::capture())
    }
}

macro_rules! impl_parser_tuple {
    ($Handler:ident, $count:expr, $(($idx:tt, $P:ident, $p:ident, $h:ident, $r:ident, $v:ident)),+) => {
        struct $Handler<In, $($P),+> {
            call_site: CallSite,
            $( $h: Option<Box<dyn ParseHandler<In, Out = $P>>>, )+
            $( $r: Option<$P>, )+
        }

        impl<In: 'static, $($P: 'static),+> $Handler<In, $($P),+> {
            fn take_output(&mut self) -> Option<($($P,)+)> {
                if $( self.$r.is_some() )&&+ {
                    match ($( self.$r.take(), )+) {
                        ($( Some($v), )+) => Some(($($v,)+)),
                        _ => None,
                    }
                } else {
                    None
                }
            }
        }

        impl<In: 'static, $($P: 'static),+> ParseHandler<In> for $Handler<In, $($P),+> {
            type Out = ($($P,)+);

            fn step(&mut self, input: &In) -> Result<Option<Self::Out>, ParseError> {
                $( step_branch(&mut self.$h, &mut self.$r, input, $idx, $count, self.call_site)?; )+
                Ok(self.take_output())
            }

            fn finish(&mut self) -> Result<Self::Out, ParseError> {
                $( finish_branch(&mut self.$h, &mut self.$r, $idx, $count, self.call_site)?; )+
                self.take_output().ok_or_else(reentered)
            }
        }

        impl<In: 'static, $($P: 'static),+> ParserTuple<In> for ($( Parser<In, $P>, )+) {
            type Out = ($($P,)+);

            fn tupled_at(self, call_site: CallSite) -> Parser<In, Self::Out> {
                let ($($p,)+) = self;
                Parser::new("tupled", move || {
                    Box::new($Handler {
                        call_site,
                        $( $h: Some($p.new_handler()), )+
                        $( $r: None, )+
                    })
                })
            }
        }
    };
}

impl_parser_tuple!(Tuple2Handler, 2, (0, P0, p0, h0, r0, v0), (1, P1, p1, h1, r1, v1));
impl_parser_tuple!(
    Tuple3Handler,
    3,
    (0, P0, p0, h0, r0, v0),
    (1, P1, p1, h1, r1, v1),
    (2, P2, p2, h2, r2, v2)
);
impl_parser_tuple!(
    Tuple4Handler,
    4,
    (0, P0, p0, h0, r0, v0),
    (1, P1, p1, h1, r1, v1),
    (2, P2, p2, h2, r2, v2),
    (3, P3, p3, h3, r3, v3)
);
impl_parser_tuple!(
    Tuple5Handler,
    5,
    (0, P0, p0, h0, r0, v0),
    (1, P1, p1, h1, r1, v1),
    (2, P2, p2, h2, r2, v2),
    (3, P3, p3, h3, r3, v3),
    (4, P4, p4, h4, r4, v4)
);
