//! Shared helpers for hirelight-observe integration tests.
//!
//! Note: some helpers may appear unused because each test file compiles
//! this module separately.

use std::collections::HashMap;
use std::time::Duration;

use hirelight_observe::{ClientConfig, Exporter, ExporterError, ObservabilityClient};
use opentelemetry_sdk::trace::{BatchSpanProcessor, InMemorySpanExporter, SpanData};

/// Keeps every exported span in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryExporter {
    name: String,
    spans: InMemorySpanExporter,
}

impl MemoryExporter {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            spans: InMemorySpanExporter::default(),
        }
    }

    pub fn finished(&self) -> Vec<SpanData> {
        self.spans.get_finished_spans().unwrap_or_default()
    }
}

impl Exporter for MemoryExporter {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_span_processor(&self) -> Result<BatchSpanProcessor, ExporterError> {
        Ok(BatchSpanProcessor::builder(self.spans.clone()).build())
    }
}

/// A client with an empty environment exporting into `exporters`.
#[allow(dead_code)]
pub fn client_with(exporters: &[&MemoryExporter]) -> ObservabilityClient {
    let client = ObservabilityClient::with_env(HashMap::<String, String>::new());
    client.init_with_exporters(
        ClientConfig::new("integration"),
        exporters
            .iter()
            .map(|e| Box::new((*e).clone()) as Box<dyn Exporter>)
            .collect(),
    );
    client
}

#[allow(dead_code)]
pub fn flush(client: &ObservabilityClient) {
    client
        .try_flush(Duration::from_secs(5))
        .expect("flush should finish");
}

#[allow(dead_code)]
pub fn attr(span: &SpanData, key: &str) -> Option<String> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.as_str().into_owned())
}

#[allow(dead_code)]
pub fn span<'a>(spans: &'a [SpanData], name: &str) -> &'a SpanData {
    spans
        .iter()
        .find(|s| s.name == name)
        .unwrap_or_else(|| panic!("no span named {name}"))
}
