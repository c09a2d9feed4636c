use alloc::{boxed::Box, rc::Rc, vec::Vec};
use core::cell::Cell;

use quickcheck::QuickCheck;

use crate::{ParseError, ParseHandler, Parser, Splitter, XmlEvent, matcher};

use super::quickcheck_iterations;

// A sub-parser that records how many of its handlers are live at once.
// Handlers only retire through `finish`, which the splitter owes every
// sub-stream it opens.
fn probe_parser(live: Rc<Cell<usize>>, peak: Rc<Cell<usize>>) -> Parser<XmlEvent, ()> {
    Parser::new("probe", move || {
        live.set(live.get() + 1);
        peak.set(peak.get().max(live.get()));
        Box::new(ProbeHandler {
            live: Rc::clone(&live),
        })
    })
}

struct ProbeHandler {
    live: Rc<Cell<usize>>,
}

impl ParseHandler<XmlEvent> for ProbeHandler {
    type Out = ();

    fn step(&mut self, _input: &XmlEvent) -> Result<Option<()>, ParseError> {
        Ok(None)
    }

    fn finish(&mut self) -> Result<(), ParseError> {
        self.live.set(self.live.get() - 1);
        Ok(())
    }
}

// Derives a well-formed-enough event stream from raw bytes: pops never
// outnumber pushes, trailing scopes may stay open.
fn derive_events(ops: &[u8]) -> Vec<XmlEvent> {
    let mut events = Vec::new();
    let mut depth = 0usize;
    for op in ops {
        match op % 3 {
            0 => {
                events.push(XmlEvent::start("n", []));
                depth += 1;
            }
            1 if depth > 0 => {
                events.push(XmlEvent::end("n"));
                depth -= 1;
            }
            _ => events.push(XmlEvent::text("t")),
        }
    }
    events
}

fn expected_sub_streams(events: &[XmlEvent]) -> usize {
    let mut depth = 0usize;
    let mut opened = 0usize;
    for event in events {
        match event {
            XmlEvent::ElemStart { .. } => {
                depth += 1;
                if depth == 1 {
                    opened += 1;
                }
            }
            XmlEvent::ElemEnd { .. } => depth -= 1,
            XmlEvent::Text { .. } => {}
        }
    }
    opened
}

/// Property: at any point during a parse, at most one sub-handler is live,
/// and the splitter opens exactly one sub-stream per match.
#[test]
fn splitter_exclusivity() {
    fn prop(ops: Vec<u8>) -> bool {
        let events = derive_events(&ops);
        let expected = expected_sub_streams(&events);

        let live = Rc::new(Cell::new(0));
        let peak = Rc::new(Cell::new(0));
        let probe = probe_parser(Rc::clone(&live), Rc::clone(&peak));

        let results = Splitter::new(matcher::any())
            .joined(move |_| probe.clone())
            .parse_to_list()
            .parse(events);

        match results {
            Ok(results) => {
                results.len() == expected && peak.get() <= 1 && live.get() == 0
            }
            Err(_) => false,
        }
    }

    QuickCheck::new()
        .tests(quickcheck_iterations())
        .quickcheck(prop as fn(Vec<u8>) -> bool);
}
