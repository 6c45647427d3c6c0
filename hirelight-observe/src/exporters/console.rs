use opentelemetry_sdk::trace::BatchSpanProcessor;

use super::Exporter;
use crate::error::ExporterError;

pub(super) const NAME: &str = "console";

/// Pretty-prints finished spans to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleExporter;

impl Exporter for ConsoleExporter {
    fn name(&self) -> &str {
        NAME
    }

    fn create_span_processor(&self) -> Result<BatchSpanProcessor, ExporterError> {
        Ok(BatchSpanProcessor::builder(opentelemetry_stdout::SpanExporter::default()).build())
    }
}
