//! End-to-end scenarios driving the public combinator surface.

use std::{cell::Cell, fmt, rc::Rc};

use substream::{
    ErrorKind, Expectation, JsonEvent, Parser, ParserTuple, Splitter, StackEffect, Stackable,
    Timing, TraceElement, Transformer, XmlEvent, json, matcher, split_on_match, xml,
};

#[derive(Debug, Clone)]
struct Boom(&'static str);

impl fmt::Display for Boom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "boom: {}", self.0)
    }
}

impl std::error::Error for Boom {}

fn booklist_events() -> Vec<XmlEvent> {
    vec![
        XmlEvent::start("library", []),
        XmlEvent::text("\n  "),
        XmlEvent::start("book", []),
        XmlEvent::text("A"),
        XmlEvent::end("book"),
        XmlEvent::text("\n  "),
        XmlEvent::start("book", []),
        XmlEvent::text("B"),
        XmlEvent::end("book"),
        XmlEvent::text("\n"),
        XmlEvent::end("library"),
    ]
}

#[test]
fn booklist() {
    let titles = Splitter::new(xml::tag("library") / xml::tag("book"))
        .joined(|_| xml::text())
        .parse_to_list();
    assert_eq!(titles.parse(booklist_events()).unwrap(), vec!["A", "B"]);
}

#[test]
fn booklist_runs_one_sub_parser_per_book() {
    let instantiated = Rc::new(Cell::new(0usize));
    let seen = Rc::clone(&instantiated);
    let titles = Splitter::new(xml::tag("library") / xml::tag("book"))
        .joined(move |_| {
            seen.set(seen.get() + 1);
            xml::text()
        })
        .parse_to_list();

    assert_eq!(titles.parse(booklist_events()).unwrap(), vec!["A", "B"]);
    assert_eq!(instantiated.get(), 2);
}

#[test]
fn or_else_first_input_wins() {
    let eager = Parser::<i32, i32>::first_opt().map(|_| "x");
    let patient = Parser::<i32, i32>::to_list().map(|_| "y");
    assert_eq!(eager.or_else(patient).parse([1, 2, 3]).unwrap(), "x");
}

#[test]
fn or_else_ties_go_left_at_end() {
    let left = Parser::<i32, i32>::first_opt().map(|_| "x");
    let right = Parser::<i32, i32>::to_list().map(|_| "y");
    assert_eq!(left.or_else(right).parse([]).unwrap(), "x");
}

#[test]
fn or_else_falls_back_when_left_fails_at_end() {
    let left = Parser::<i32, i32>::first().map(|_| "x");
    let right = Parser::<i32, i32>::to_list().map(|_| "y");
    assert_eq!(left.or_else(right).parse([]).unwrap(), "y");
}

#[test]
fn or_else_aggregates_failures_in_failure_order() {
    // The right branch fails on the first input, the left branch on the
    // second, so the aggregate lists the right branch's error first.
    let fails_second = Parser::try_fold((), |(), n: &i32| {
        if *n == 2 {
            Err(substream::ParseError::caught(Boom("left")))
        } else {
            Ok(())
        }
    });
    let fails_first = Parser::try_fold((), |(), n: &i32| {
        if *n == 1 {
            Err(substream::ParseError::caught(Boom("right")))
        } else {
            Ok(())
        }
    });

    let error = fails_second
        .or_else(fails_first)
        .parse([1, 2, 3])
        .unwrap_err();

    let ErrorKind::FallbackChainFailure { errors } = error.kind() else {
        panic!("expected a fallback chain failure, got {error}");
    };
    let messages: Vec<String> = errors.iter().map(|e| e.kind().to_string()).collect();
    assert_eq!(messages, vec!["boom: right", "boom: left"]);
}

fn echo_expectations() -> Vec<Expectation<i32>> {
    vec![
        Expectation::new("1", |n: &i32| *n == 1),
        Expectation::new("even", |n: &i32| n % 2 == 0),
        Expectation::new("3", |n: &i32| *n == 3),
    ]
}

#[test]
fn expect_inputs_passes_matching_stream_through() {
    let echo = Parser::<i32, i32>::to_list().expect_inputs(echo_expectations());
    assert_eq!(echo.parse([1, 2, 3]).unwrap(), vec![1, 2, 3]);
}

#[test]
fn expect_inputs_rejects_mismatch() {
    let echo = Parser::<i32, i32>::to_list().expect_inputs(echo_expectations());
    let error = echo.parse([1, 7, 3]).unwrap_err();
    let ErrorKind::UnexpectedInput {
        input,
        expectations,
    } = error.kind()
    else {
        panic!("expected UnexpectedInput, got {error}");
    };
    assert_eq!(input, "7");
    assert_eq!(expectations, &["even", "3"]);
}

#[test]
fn expect_inputs_reports_unfulfilled_expectations() {
    let echo = Parser::<i32, i32>::to_list().expect_inputs(echo_expectations());
    let error = echo.parse([1]).unwrap_err();
    let ErrorKind::UnfulfilledInputs { expectations } = error.kind() else {
        panic!("expected UnfulfilledInputs, got {error}");
    };
    assert_eq!(expectations, &["even", "3"]);
}

#[test]
fn interrupted_by_finalizes_base_and_drops_trigger() {
    let stop_on_zero = Transformer::identity()
        .filter(|n: &i32| *n == 0)
        .parse_first();
    let collected = Parser::<i32, i32>::to_list().interrupted_by(stop_on_zero);
    assert_eq!(collected.parse([3, 2, 1, 0, 5, 4]).unwrap(), vec![3, 2, 1]);
}

#[test]
fn interrupter_failure_is_raised() {
    let exploding = Parser::<i32, ()>::try_fold((), |(), n| {
        if *n == 1 {
            Err(substream::ParseError::caught(Boom("interrupter")))
        } else {
            Ok(())
        }
    });
    let error = Parser::<i32, i32>::to_list()
        .interrupted_by(exploding)
        .parse([1, 2])
        .unwrap_err();
    assert!(matches!(error.kind(), ErrorKind::Caught { .. }));
}

#[test]
fn interrupter_failure_suppressed_by_attempt() {
    let exploding = Parser::<i32, ()>::try_fold((), |(), n| {
        if *n == 1 {
            Err(substream::ParseError::caught(Boom("interrupter")))
        } else {
            Ok(())
        }
    });
    let collected = Parser::<i32, i32>::to_list()
        .interrupted_by(exploding.attempt().ok_only())
        .parse([1, 2, 3])
        .unwrap();
    assert_eq!(collected, vec![1, 2, 3]);
}

// Integer tokens with a stack discipline: positive multiples of ten open a
// scope, negative values close one.
#[derive(Debug, Clone, PartialEq)]
struct Tok(i64);

impl Stackable for Tok {
    type Frame = i64;

    fn stack_effect(&self) -> StackEffect<i64> {
        if self.0 > 0 && self.0 % 10 == 0 {
            StackEffect::Push {
                frame: self.0,
                timing: Timing::Before,
            }
        } else if self.0 < 0 {
            StackEffect::Pop {
                timing: Timing::Before,
            }
        } else {
            StackEffect::NoChange
        }
    }
}

fn toks(values: &[i64]) -> Vec<Tok> {
    values.iter().copied().map(Tok).collect()
}

#[test]
fn followed_by_replays_open_scopes() {
    let until_42 = Transformer::identity()
        .filter(|t: &Tok| t.0 == 42)
        .parse_first();
    let then_rest = until_42.followed_by(|_| Parser::to_list());

    let input = toks(&[10, 20, -20, -10, 10, 11, 20, 21, 30, 31, 40, -40, 42, 1, 2, 3]);
    let replayed: Vec<i64> = then_rest
        .parse(input)
        .unwrap()
        .into_iter()
        .map(|t| t.0)
        .collect();
    assert_eq!(replayed, vec![10, 20, 30, 1, 2, 3]);
}

#[test]
fn followed_by_stream_replays_open_scopes() {
    let until_42 = Transformer::identity()
        .filter(|t: &Tok| t.0 == 42)
        .parse_first();
    let rest = until_42
        .followed_by_stream(|_| Transformer::identity())
        .parse_to_list();

    let input = toks(&[10, 20, -20, -10, 10, 11, 20, 21, 30, 31, 40, -40, 42, 1, 2, 3]);
    let replayed: Vec<i64> = rest.parse(input).unwrap().into_iter().map(|t| t.0).collect();
    assert_eq!(replayed, vec![10, 20, 30, 1, 2, 3]);
}

#[test]
fn followed_by_propagates_base_failure_at_end() {
    let whole = Transformer::identity()
        .filter(|t: &Tok| t.0 == 42)
        .parse_first()
        .followed_by(|_| Parser::to_list());
    let error = whole.parse(toks(&[1, 2, 3])).unwrap_err();
    assert!(matches!(error.kind(), ErrorKind::MissingFirst));
}

#[test]
fn followed_by_finalizes_continuation_after_replay_at_end() {
    let whole = Transformer::identity()
        .filter(|t: &Tok| t.0 == 42)
        .parse_first_opt()
        .followed_by(|_| Parser::to_list());
    // The stream ends while the base is still running; the continuation
    // sees only the replay of the scope still open.
    let replayed: Vec<i64> = whole
        .parse(toks(&[10, 1, 2]))
        .unwrap()
        .into_iter()
        .map(|t| t.0)
        .collect();
    assert_eq!(replayed, vec![10]);
}

#[test]
fn before_context_stops_before_matching_push() {
    let collected = Parser::<XmlEvent, XmlEvent>::to_list()
        .before_context(xml::tag("stop"));
    let events = vec![
        XmlEvent::start("a", []),
        XmlEvent::text("body"),
        XmlEvent::end("a"),
        XmlEvent::start("stop", []),
        XmlEvent::text("ignored"),
    ];
    let prefix = collected.parse(events).unwrap();
    assert_eq!(
        prefix,
        vec![
            XmlEvent::start("a", []),
            XmlEvent::text("body"),
            XmlEvent::end("a")
        ]
    );
}

// Push-after variant of the integer tokens: the opening event stays with
// the parent scope.
#[derive(Debug, Clone, PartialEq)]
struct LateTok(i64);

impl Stackable for LateTok {
    type Frame = i64;

    fn stack_effect(&self) -> StackEffect<i64> {
        if self.0 > 0 && self.0 % 10 == 0 {
            StackEffect::Push {
                frame: self.0,
                timing: Timing::After,
            }
        } else if self.0 < 0 {
            StackEffect::Pop {
                timing: Timing::After,
            }
        } else {
            StackEffect::NoChange
        }
    }
}

#[test]
fn before_context_fires_on_push_after_strategies_too() {
    let frame_is_ten = matcher::frame_where("10", |frame: &i64| *frame == 10);
    let collected = Parser::<LateTok, LateTok>::to_list().before_context(frame_is_ten);
    let prefix = collected
        .parse([LateTok(1), LateTok(2), LateTok(10), LateTok(3)])
        .unwrap();
    let values: Vec<i64> = prefix.into_iter().map(|t| t.0).collect();
    assert_eq!(values, vec![1, 2]);
}

#[test]
fn tuple_product_finishes_when_all_branches_finish() {
    let combined = (
        Parser::<i32, i32>::first(),
        Parser::<i32, i32>::to_list(),
        Parser::fold(0i32, |acc, n: &i32| acc + n),
    )
        .tupled();
    let (head, all, total) = combined.parse([1, 2, 3]).unwrap();
    assert_eq!(head, 1);
    assert_eq!(all, vec![1, 2, 3]);
    assert_eq!(total, 6);
}

#[test]
fn and_pairs_results() {
    let paired = Parser::<i32, i32>::first().and(Parser::fold(0i32, |acc, n: &i32| acc + n));
    assert_eq!(paired.parse([4, 5]).unwrap(), (4, 9));
}

#[test]
fn compound_branch_failures_carry_branch_position() {
    let failing = Parser::<i32, ()>::try_fold((), |(), _| {
        Err(substream::ParseError::caught(Boom("branch")))
    });
    let error = (Parser::<i32, i32>::to_list(), failing)
        .tupled()
        .parse([1])
        .unwrap_err();
    assert!(error.trace().iter().any(|element| matches!(
        element,
        TraceElement::InCompound { index: 1, count: 2, .. }
    )));
}

#[test]
fn unwrap_safe_raises_foreign_errors() {
    let ok = Parser::<i32, Result<i32, Boom>>::pure(Ok(7)).unwrap_safe();
    assert_eq!(ok.parse([0]).unwrap(), 7);

    let bad = Parser::<i32, Result<i32, Boom>>::pure(Err(Boom("wrapped"))).unwrap_safe();
    let error = bad.parse([0]).unwrap_err();
    assert!(matches!(error.kind(), ErrorKind::Caught { .. }));
}

#[test]
fn source_errors_route_through_recover() {
    let plain = Parser::<i32, i32>::to_list();
    let failing_source: Vec<Result<i32, Boom>> = vec![Ok(1), Err(Boom("source")), Ok(2)];
    let error = plain.parse_results(failing_source).unwrap_err();
    assert!(matches!(error.kind(), ErrorKind::Caught { .. }));

    let recovering = Parser::<i32, i32>::to_list().attempt();
    let failing_source: Vec<Result<i32, Boom>> = vec![Ok(1), Err(Boom("source")), Ok(2)];
    let captured = recovering.parse_results(failing_source).unwrap();
    assert!(captured.is_err());
}

#[test]
fn splitter_failure_traces_leaf_to_call_site() {
    let exploding = Splitter::new(xml::tag("library") / xml::tag("book"))
        .joined(|_| Parser::<XmlEvent, ()>::eval(|| Err(substream::ParseError::caught(Boom("sub")))));
    let error = (exploding.parse_to_list(), Parser::<XmlEvent, XmlEvent>::to_list())
        .tupled()
        .parse(booklist_events())
        .unwrap_err();

    let shape: Vec<&'static str> = error
        .trace()
        .iter()
        .map(|element| match element {
            TraceElement::InInput { .. } => "input",
            TraceElement::InInputContext { .. } => "input-context",
            TraceElement::InSplitter { .. } => "splitter",
            TraceElement::InCompound { .. } => "compound",
            TraceElement::InParse { .. } => "parse",
        })
        .collect();
    assert_eq!(
        shape,
        vec!["input", "input-context", "splitter", "compound", "parse"]
    );
}

#[test]
fn pop_on_empty_stack_is_a_parse_failure() {
    let titles = Splitter::new(xml::tag("library") / xml::tag("book"))
        .joined(|_| xml::text())
        .parse_to_list();
    let error = titles.parse(vec![XmlEvent::end("library")]).unwrap_err();
    assert!(matches!(error.kind(), ErrorKind::StackUnderflow));
}

#[test]
fn matcher_alternation_matches_either_branch() {
    let either = xml::tag("library") / xml::tag("book").or(xml::tag("magazine"));
    let texts = Splitter::new(either).joined(|_| xml::text()).parse_to_list();
    let events = vec![
        XmlEvent::start("library", []),
        XmlEvent::start("book", []),
        XmlEvent::text("A"),
        XmlEvent::end("book"),
        XmlEvent::start("magazine", []),
        XmlEvent::text("M"),
        XmlEvent::end("magazine"),
        XmlEvent::end("library"),
    ];
    assert_eq!(texts.parse(events).unwrap(), vec!["A", "M"]);
}

#[test]
fn attr_matcher_extracts_context_values() {
    let ids = Splitter::new(xml::tag("feed") / xml::attr("id"))
        .joined(|id| Parser::pure(id.clone()))
        .parse_to_list();
    let events = vec![
        XmlEvent::start("feed", []),
        XmlEvent::start("entry", [("id", "e1")]),
        XmlEvent::end("entry"),
        XmlEvent::start("entry", [("id", "e2")]),
        XmlEvent::end("entry"),
        XmlEvent::end("feed"),
    ];
    assert_eq!(ids.parse(events).unwrap(), vec!["e1", "e2"]);
}

#[test]
fn xml_attribute_parser_reads_first_start_tag() {
    let events = vec![
        XmlEvent::start("entry", [("id", "e9")]),
        XmlEvent::end("entry"),
    ];
    assert_eq!(xml::attribute("id").parse(events.clone()).unwrap(), "e9");
    assert!(matches!(
        xml::attribute("missing").parse(events).unwrap_err().kind(),
        ErrorKind::Caught { .. }
    ));
}

fn json_array_events() -> Vec<JsonEvent> {
    vec![
        JsonEvent::object_start(),
        JsonEvent::field_start("names"),
        JsonEvent::array_start(),
        JsonEvent::index_start(0),
        JsonEvent::string("ada"),
        JsonEvent::index_end(0),
        JsonEvent::index_start(1),
        JsonEvent::string("brian"),
        JsonEvent::index_end(1),
        JsonEvent::array_end(),
        JsonEvent::field_end(),
        JsonEvent::object_end(),
    ]
}

#[test]
fn json_field_and_index_matchers_compose() {
    let names = Splitter::new(json::field("names") / json::any_index())
        .joined(|_| json::string_value())
        .parse_to_list();
    assert_eq!(names.parse(json_array_events()).unwrap(), vec!["ada", "brian"]);
}

#[test]
fn json_index_matcher_selects_one_element() {
    let second = Splitter::new(json::field("names") / json::index(1))
        .joined(|_| json::string_value())
        .parse_first();
    assert_eq!(second.parse(json_array_events()).unwrap(), "brian");
}

#[test]
fn split_on_match_groups_consecutive_matches() {
    let groups = split_on_match(|n: &i32| *n > 0, |_| Parser::to_list()).parse_to_list();
    assert_eq!(
        groups.parse([1, 2, -1, 3, 4]).unwrap(),
        vec![vec![1, 2], vec![3, 4]]
    );
}

#[test]
fn transformer_take_stops_the_stream() {
    let doubled = Transformer::identity().map(|n: i32| n * 2).take(2);
    let collected: Result<Vec<_>, _> = doubled.transform([1, 2, 3, 4]).collect();
    assert_eq!(collected.unwrap(), vec![2, 4]);
}

#[test]
fn transformer_scan_emits_running_totals() {
    let totals = Transformer::identity().scan(0i32, |acc, n: i32| acc + n);
    let collected: Result<Vec<_>, _> = totals.transform([1, 2, 3]).collect();
    assert_eq!(collected.unwrap(), vec![1, 3, 6]);
}

#[test]
fn transformer_chains_preserve_order() {
    let pipeline = Transformer::identity()
        .filter(|n: &i32| n % 2 == 1)
        .then(Transformer::identity().map(|n: i32| n * 10))
        .skip(1);
    let collected: Result<Vec<_>, _> = pipeline.transform([1, 2, 3, 4, 5]).collect();
    assert_eq!(collected.unwrap(), vec![30, 50]);
}

#[test]
fn transformer_skip_while_and_take_while() {
    let middle = Transformer::identity()
        .skip_while(|n: &i32| *n < 3)
        .take_while(|n: &i32| *n < 5);
    let collected: Result<Vec<_>, _> = middle.transform([1, 2, 3, 4, 5, 6]).collect();
    assert_eq!(collected.unwrap(), vec![3, 4]);
}

#[test]
fn transformer_flat_map_expands_items() {
    let repeated = Transformer::identity().flat_map(|n: i32| vec![n; n as usize]);
    let collected: Result<Vec<_>, _> = repeated.transform([1, 2]).collect();
    assert_eq!(collected.unwrap(), vec![1, 2, 2]);
}

#[test]
fn transformer_inspect_observes_without_changing() {
    let seen = Rc::new(Cell::new(0));
    let counter = Rc::clone(&seen);
    let observed = Transformer::identity().inspect(move |_: &i32| counter.set(counter.get() + 1));
    let collected: Result<Vec<_>, _> = observed.transform([1, 2, 3]).collect();
    assert_eq!(collected.unwrap(), vec![1, 2, 3]);
    assert_eq!(seen.get(), 3);
}

// Recursive grammar through lazy construction: the depth of a subtree is
// one more than the deepest child subtree.
fn subtree_depth() -> Parser<XmlEvent, usize> {
    Splitter::new(matcher::any() / matcher::any())
        .joined(|_| Parser::defer(subtree_depth))
        .parse_fold(0usize, |deepest, child| deepest.max(*child))
        .map(|deepest| deepest + 1)
}

#[test]
fn recursive_parsers_via_defer() {
    let events = vec![
        XmlEvent::start("a", []),
        XmlEvent::start("b", []),
        XmlEvent::start("c", []),
        XmlEvent::end("c"),
        XmlEvent::end("b"),
        XmlEvent::start("b2", []),
        XmlEvent::end("b2"),
        XmlEvent::end("a"),
    ];
    assert_eq!(subtree_depth().parse(events).unwrap(), 3);
}

#[test]
fn parse_stream_accepts_event_source_adapters() {
    let total = Parser::fold(0i32, |acc, n: &i32| acc + n);
    assert_eq!(total.parse_stream(vec![1, 2, 3]).unwrap(), 6);
    assert_eq!(total.parse_stream([4, 5]).unwrap(), 9);
}

#[test]
fn pure_and_eval_finish_immediately() {
    assert_eq!(Parser::<i32, &str>::pure("ready").parse([1, 2]).unwrap(), "ready");
    assert_eq!(Parser::<i32, &str>::pure("ready").parse([]).unwrap(), "ready");
    assert_eq!(
        Parser::<i32, i32>::eval(|| Ok(5)).parse([9]).unwrap(),
        5
    );
    assert!(
        Parser::<i32, i32>::eval(|| Err(substream::ParseError::caught(Boom("eval"))))
            .parse([9])
            .is_err()
    );
}

#[test]
fn try_map_raises_exactly_when_the_base_finishes() {
    let failing: Parser<i32, i32> = Parser::<i32, i32>::first()
        .try_map(|_| Err(substream::ParseError::caught(Boom("mapped"))));
    let error = failing.parse([1, 2, 3]).unwrap_err();
    assert!(matches!(error.kind(), ErrorKind::Caught { .. }));
    // The failure surfaces at the input that finished the base parser.
    assert!(matches!(
        error.trace().first(),
        Some(TraceElement::InInput { input }) if input == "1"
    ));
}

#[test]
fn error_display_renders_kind_and_trace() {
    let echo = Parser::<i32, i32>::to_list().expect_inputs(echo_expectations());
    let error = echo.parse([1, 7, 3]).unwrap_err();
    let rendered = error.to_string();
    assert!(rendered.contains("unexpected input 7"));
    assert!(rendered.contains("in input 7"));
    assert!(rendered.contains(".parse called at"));
}
