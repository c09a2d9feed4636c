use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use substream::{Splitter, XmlEvent, xml};

fn booklist_events(books: usize) -> Vec<XmlEvent> {
    let mut events = Vec::with_capacity(books * 3 + 2);
    events.push(XmlEvent::start("library", []));
    for index in 0..books {
        events.push(XmlEvent::start("book", []));
        events.push(XmlEvent::text(&format!("title {index}")));
        events.push(XmlEvent::end("book"));
    }
    events.push(XmlEvent::end("library"));
    events
}

fn bench_booklist(c: &mut Criterion) {
    let parser = Splitter::new(xml::tag("library") / xml::tag("book"))
        .joined(|_| xml::text())
        .parse_to_list();

    for books in [100usize, 1_000] {
        let events = booklist_events(books);
        c.bench_function(&format!("split_{books}_books"), |b| {
            b.iter(|| {
                let titles = parser.parse(black_box(events.clone())).unwrap();
                black_box(titles)
            });
        });
    }
}

criterion_group!(benches, bench_booklist);
criterion_main!(benches);
