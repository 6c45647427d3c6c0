//! Core observability types.

use opentelemetry::trace::SpanKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 128-bit trace identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TraceId(pub [u8; 16]);

/// A 64-bit span identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanId(pub [u8; 8]);

impl TraceId {
    /// Convert to a 32-character lowercase hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }
}

impl From<opentelemetry::trace::TraceId> for TraceId {
    fn from(id: opentelemetry::trace::TraceId) -> Self {
        Self(id.to_bytes())
    }
}

impl From<TraceId> for opentelemetry::trace::TraceId {
    fn from(id: TraceId) -> Self {
        opentelemetry::trace::TraceId::from_bytes(id.0)
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl SpanId {
    /// Convert to a 16-character lowercase hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        to_hex(&self.0)
    }
}

impl From<opentelemetry::trace::SpanId> for SpanId {
    fn from(id: opentelemetry::trace::SpanId) -> Self {
        Self(id.to_bytes())
    }
}

impl From<SpanId> for opentelemetry::trace::SpanId {
    fn from(id: SpanId) -> Self {
        opentelemetry::trace::SpanId::from_bytes(id.0)
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut acc, b| {
            use fmt::Write;
            let _ = write!(acc, "{b:02x}");
            acc
        })
}

/// What an instrumented function is recorded as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationKind {
    /// A regular child span.
    #[default]
    Span,
    /// A span marked as an LLM generation.
    Generation,
    /// A root span for a top-level unit of work.
    Trace,
}

impl ObservationKind {
    /// Only traces are server spans; everything else is internal.
    #[must_use]
    pub fn span_kind(self) -> SpanKind {
        match self {
            Self::Trace => SpanKind::Server,
            Self::Span | Self::Generation => SpanKind::Internal,
        }
    }
}

/// Severity attached to events and observation updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl EventLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Warnings and errors flip the span status to error.
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Warning | Self::Error)
    }
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a score is attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreTarget {
    /// The current span.
    #[default]
    Observation,
    /// The whole trace, recorded on the current span under a distinct prefix.
    Trace,
}

impl ScoreTarget {
    /// Attribute prefix, also the event name for context-level scores.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Observation => crate::semconv::score::OBSERVATION_PREFIX,
            Self::Trace => crate::semconv::score::TRACE_PREFIX,
        }
    }

    /// Event name for scores recorded through the client.
    #[must_use]
    pub fn event_name(self) -> &'static str {
        match self {
            Self::Observation => crate::semconv::score::OBSERVATION_EVENT,
            Self::Trace => crate::semconv::score::TRACE_EVENT,
        }
    }
}

/// A numeric or categorical judgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreValue {
    Numeric(f64),
    Text(String),
}

impl fmt::Display for ScoreValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<f64> for ScoreValue {
    fn from(v: f64) -> Self {
        Self::Numeric(v)
    }
}

impl From<i64> for ScoreValue {
    fn from(v: i64) -> Self {
        Self::Numeric(v as f64)
    }
}

impl From<&str> for ScoreValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ScoreValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Token counts for one LLM call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: Option<i64>,
    #[serde(default)]
    pub completion_tokens: Option<i64>,
    #[serde(default)]
    pub total_tokens: Option<i64>,
}

impl TokenUsage {
    pub fn new(prompt_tokens: i64, completion_tokens: i64) -> Self {
        Self {
            prompt_tokens: Some(prompt_tokens),
            completion_tokens: Some(completion_tokens),
            total_tokens: Some(prompt_tokens + completion_tokens),
        }
    }

    /// Total as reported, else prompt + completion when either is known.
    #[must_use]
    pub fn resolved_total(&self) -> Option<i64> {
        self.total_tokens.or_else(|| {
            if self.prompt_tokens.is_none() && self.completion_tokens.is_none() {
                None
            } else {
                Some(self.prompt_tokens.unwrap_or(0) + self.completion_tokens.unwrap_or(0))
            }
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prompt_tokens.is_none() && self.completion_tokens.is_none() && self.total_tokens.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_id_display() {
        let id = TraceId([0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]);
        assert_eq!(id.to_string(), "000102030405060708090a0b0c0d0e0f");
    }

    #[test]
    fn span_id_display() {
        let id = SpanId([0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(id.to_string(), "0001020304050607");
    }

    #[test]
    fn ids_convert_from_opentelemetry() {
        let otel = opentelemetry::trace::TraceId::from_bytes([7; 16]);
        let id = TraceId::from(otel);
        assert_eq!(opentelemetry::trace::TraceId::from(id), otel);
    }

    #[test]
    fn only_traces_are_server_spans() {
        assert_eq!(ObservationKind::Trace.span_kind(), SpanKind::Server);
        assert_eq!(ObservationKind::Span.span_kind(), SpanKind::Internal);
        assert_eq!(ObservationKind::Generation.span_kind(), SpanKind::Internal);
    }

    #[test]
    fn score_prefixes_differ_by_target() {
        assert_ne!(
            ScoreTarget::Observation.prefix(),
            ScoreTarget::Trace.prefix()
        );
    }

    #[test]
    fn usage_total_is_derived_when_missing() {
        let usage = TokenUsage {
            prompt_tokens: Some(10),
            completion_tokens: None,
            total_tokens: None,
        };
        assert_eq!(usage.resolved_total(), Some(10));
        assert_eq!(TokenUsage::default().resolved_total(), None);
    }

    #[test]
    fn score_value_displays_plainly() {
        assert_eq!(ScoreValue::from(0.5).to_string(), "0.5");
        assert_eq!(ScoreValue::from("pass").to_string(), "pass");
    }
}
