//! Span capture helpers for unit tests.

use opentelemetry_sdk::trace::{
    BatchSpanProcessor, InMemorySpanExporter, SdkTracerProvider, SpanData,
};

use crate::error::ExporterError;
use crate::exporters::Exporter;

/// Exporter that keeps finished spans in memory.
#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryExporter {
    spans: InMemorySpanExporter,
}

impl MemoryExporter {
    pub(crate) fn finished(&self) -> Vec<SpanData> {
        self.spans.get_finished_spans().unwrap_or_default()
    }
}

impl Exporter for MemoryExporter {
    fn name(&self) -> &str {
        "memory"
    }

    fn create_span_processor(&self) -> Result<BatchSpanProcessor, ExporterError> {
        Ok(BatchSpanProcessor::builder(self.spans.clone()).build())
    }
}

/// A provider that exports synchronously into the returned exporter.
pub(crate) fn recording_tracer() -> (SdkTracerProvider, InMemorySpanExporter) {
    let exporter = InMemorySpanExporter::default();
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    (provider, exporter)
}

/// String form of an attribute on a finished span.
pub(crate) fn attr(span: &SpanData, key: &str) -> Option<String> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.as_str().into_owned())
}

/// Attributes of the first event called `name`.
pub(crate) fn event_attr(span: &SpanData, name: &str, key: &str) -> Option<String> {
    span.events
        .events
        .iter()
        .find(|event| event.name == name)
        .and_then(|event| event.attributes.iter().find(|kv| kv.key.as_str() == key))
        .map(|kv| kv.value.as_str().into_owned())
}
