//! Scoped observations against a real provider.

mod common;

use std::panic::{self, AssertUnwindSafe};

use common::{MemoryExporter, attr, client_with, flush, span};
use hirelight_observe::{ObservationExt, ObservationKind, current_trace_id};
use opentelemetry::trace::{SpanKind, Status};

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("model refused: {0}")]
struct Refused(String);

#[test]
fn nested_observations_close_in_reverse_order_when_innermost_fails() {
    let exporter = MemoryExporter::named("memory");
    let client = client_with(&[&exporter]);

    client.trace("screen").user_id("recruiter-7").run(|trace| {
        client.span("retrieve").run(|_| {
            client.generation("summarise").model("gpt-4o").run(|generation| {
                generation.input("resume text");
                generation.error(&Refused("policy".into()));
            });
        });
        trace.tags(["screening"]);
    });
    flush(&client);

    let spans = exporter.finished();
    let names: Vec<_> = spans.iter().map(|s| s.name.as_ref()).collect();
    assert_eq!(names, ["summarise", "retrieve", "screen"]);

    let trace = span(&spans, "screen");
    let retrieve = span(&spans, "retrieve");
    let generation = span(&spans, "summarise");
    assert_eq!(trace.span_kind, SpanKind::Server);
    assert_eq!(retrieve.parent_span_id, trace.span_context.span_id());
    assert_eq!(generation.parent_span_id, retrieve.span_context.span_id());
    assert_eq!(
        generation.span_context.trace_id(),
        trace.span_context.trace_id()
    );
    assert!(generation.end_time <= retrieve.end_time);
    assert!(retrieve.end_time <= trace.end_time);

    assert_eq!(attr(generation, "error.type").as_deref(), Some("Refused"));
    assert!(matches!(generation.status, Status::Error { .. }));
    assert!(!matches!(trace.status, Status::Error { .. }));
    assert_eq!(current_trace_id(), None);
}

#[test]
fn failure_propagated_from_generation_closes_inside_out() {
    let exporter = MemoryExporter::named("memory");
    let client = client_with(&[&exporter]);

    let result: Result<String, Refused> = client.trace("t").run(|_| {
        client.span("s").run(|_| {
            client
                .observe("g")
                .as_type(ObservationKind::Generation)
                .call("resume text", |_| Err(Refused("policy".into())))
        })
    });
    assert_eq!(result, Err(Refused("policy".into())));
    flush(&client);

    let spans = exporter.finished();
    let names: Vec<_> = spans.iter().map(|s| s.name.as_ref()).collect();
    assert_eq!(names, ["g", "s", "t"]);
    assert!(matches!(span(&spans, "g").status, Status::Error { .. }));
    assert_eq!(span(&spans, "g").parent_span_id, span(&spans, "s").span_context.span_id());
}

#[test]
fn panic_in_generation_closes_inside_out() {
    let exporter = MemoryExporter::named("memory");
    let client = client_with(&[&exporter]);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        client.trace("t").run(|_| {
            client.span("s").run(|_| {
                client.generation("g").run(|_| panic!("provider crashed"));
            });
        });
    }));
    assert!(outcome.is_err());
    flush(&client);

    let spans = exporter.finished();
    let names: Vec<_> = spans.iter().map(|s| s.name.as_ref()).collect();
    assert_eq!(names, ["g", "s", "t"]);
    assert!(spans.iter().all(|s| matches!(s.status, Status::Error { .. })));
}

#[test]
fn panic_inside_span_marks_every_open_observation() {
    let exporter = MemoryExporter::named("memory");
    let client = client_with(&[&exporter]);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        client.trace("request").run(|_| {
            client.span("parse").run(|_| panic!("malformed resume"));
        });
    }));
    assert!(outcome.is_err());
    assert_eq!(current_trace_id(), None);
    flush(&client);

    let spans = exporter.finished();
    assert_eq!(spans.len(), 2);
    for s in &spans {
        assert_eq!(attr(s, "error.type").as_deref(), Some("panic"));
        assert!(matches!(s.status, Status::Error { .. }));
    }
}

#[test]
fn one_span_reaches_every_exporter() {
    let primary = MemoryExporter::named("primary");
    let secondary = MemoryExporter::named("secondary");
    let client = client_with(&[&primary, &secondary]);

    client.span("fan_out").run(|_| {});
    flush(&client);

    assert_eq!(
        client.get_exporter_status().configured,
        ["primary", "secondary"]
    );
    let first = primary.finished();
    let second = secondary.finished();
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(first[0].span_context, second[0].span_context);
}

#[test]
fn observe_returns_the_original_error() {
    let exporter = MemoryExporter::named("memory");
    let client = client_with(&[&exporter]);

    let classify = client
        .observe("classify")
        .as_type(ObservationKind::Generation)
        .wrap(|text: String| -> Result<String, Refused> { Err(Refused(text)) });
    assert_eq!(classify("cv".into()), Err(Refused("cv".into())));
    flush(&client);

    let spans = exporter.finished();
    let s = span(&spans, "classify");
    assert_eq!(attr(s, "input").as_deref(), Some("\"cv\""));
    assert_eq!(attr(s, "error.message").as_deref(), Some("model refused: cv"));
    assert_eq!(attr(s, "observation.type").as_deref(), Some("generation"));
}
