use alloc::{rc::Rc, string::String, vec::Vec};
use core::cell::Cell;

use quickcheck::QuickCheck;

use crate::{ErrorKind, Parser};

use super::quickcheck_iterations;

struct Counting<I> {
    inner: I,
    count: Rc<Cell<usize>>,
}

impl<I: Iterator> Iterator for Counting<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<I::Item> {
        let item = self.inner.next();
        if item.is_some() {
            self.count.set(self.count.get() + 1);
        }
        item
    }
}

fn consumed<Out: 'static>(parser: &Parser<i32, Out>, inputs: &[i32]) -> usize {
    let count = Rc::new(Cell::new(0));
    let source = Counting {
        inner: inputs.to_vec().into_iter(),
        count: Rc::clone(&count),
    };
    let _ = parser.parse(source);
    count.get()
}

/// Property: `map` never changes how many inputs a parser pulls.
#[test]
fn map_preserves_pull_count() {
    fn prop(inputs: Vec<i32>) -> bool {
        let first = Parser::<i32, i32>::first();
        let first_mapped = Parser::<i32, i32>::first().map(|n| n + 1);
        let list = Parser::<i32, i32>::to_list();
        let list_mapped = Parser::<i32, i32>::to_list().map(|items| items.len());

        consumed(&first, &inputs) == consumed(&first_mapped, &inputs)
            && consumed(&list, &inputs) == consumed(&list_mapped, &inputs)
    }

    QuickCheck::new()
        .tests(quickcheck_iterations())
        .quickcheck(prop as fn(Vec<i32>) -> bool);
}

/// Property: `attempt` then `rethrow` is observationally the identity.
#[test]
fn attempt_rethrow_roundtrip() {
    fn prop(inputs: Vec<i32>) -> bool {
        let direct = Parser::<i32, i32>::first().parse(inputs.clone());
        let round = Parser::<i32, i32>::first()
            .attempt()
            .rethrow()
            .parse(inputs);

        match (direct, round) {
            (Ok(a), Ok(b)) => a == b,
            (Err(a), Err(b)) => {
                matches!(a.kind(), ErrorKind::MissingFirst)
                    && matches!(b.kind(), ErrorKind::MissingFirst)
            }
            _ => false,
        }
    }

    QuickCheck::new()
        .tests(quickcheck_iterations())
        .quickcheck(prop as fn(Vec<i32>) -> bool);
}

/// Property: the fallback chain yields the earliest successful branch.
#[test]
fn or_else_picks_first_success() {
    fn prop(inputs: Vec<i32>) -> bool {
        let eager = Parser::<i32, i32>::first_opt().map(|_| String::from("x"));
        let patient = Parser::<i32, i32>::to_list().map(|_| String::from("y"));
        let tie_to_left = eager.or_else(patient).parse(inputs.clone());

        // A failing left branch hands the win to the right branch.
        let failing = Parser::<i32, i32>::first().map(|_| String::from("x"));
        let fallback = Parser::<i32, i32>::to_list().map(|_| String::from("y"));
        let after_failure = failing.or_else(fallback).parse(inputs.clone());

        let expected = if inputs.is_empty() { "y" } else { "x" };
        tie_to_left.ok().as_deref() == Some("x") && after_failure.ok().as_deref() == Some(expected)
    }

    QuickCheck::new()
        .tests(quickcheck_iterations())
        .quickcheck(prop as fn(Vec<i32>) -> bool);
}
