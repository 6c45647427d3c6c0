//! Helpers that act on whatever observation is active on this thread.
//!
//! All of them are no-ops when no valid span is current.

use opentelemetry::trace::{SpanContext, Status, TraceContextExt};
use opentelemetry::{Context, KeyValue};
use serde::Serialize;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::Observation;
use crate::semconv::{self, gen_ai, observation};
use crate::types::{EventLevel, ScoreTarget, ScoreValue, SpanId, TraceId};
use crate::value::{json_to_text, string_array};

/// The active span context: the attached observation, else the current
/// `tracing` span when it is bridged through the client's layer.
fn current_span_context() -> Option<SpanContext> {
    let from_otel = Context::current().span().span_context().clone();
    if from_otel.is_valid() {
        return Some(from_otel);
    }
    let from_tracing = tracing::Span::current()
        .context()
        .span()
        .span_context()
        .clone();
    from_tracing.is_valid().then_some(from_tracing)
}

pub fn current_trace_id() -> Option<TraceId> {
    current_span_context().map(|cx| cx.trace_id().into())
}

pub fn current_observation_id() -> Option<SpanId> {
    current_span_context().map(|cx| cx.span_id().into())
}

/// Identifiers an LLM gateway needs to nest its own records under ours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceMetadata {
    pub existing_trace_id: String,
    pub parent_observation_id: String,
}

pub fn trace_metadata() -> Option<TraceMetadata> {
    current_span_context().map(|cx| TraceMetadata {
        existing_trace_id: TraceId::from(cx.trace_id()).to_hex(),
        parent_observation_id: SpanId::from(cx.span_id()).to_hex(),
    })
}

/// Changes applied by [`update_current_observation`].
#[derive(Debug, Clone, Default)]
pub struct ObservationUpdate {
    pub name: Option<String>,
    pub input: Option<serde_json::Value>,
    pub output: Option<serde_json::Value>,
    pub level: Option<EventLevel>,
    pub status_message: Option<String>,
    pub metadata: Vec<(String, serde_json::Value)>,
    pub attributes: Vec<(String, serde_json::Value)>,
}

impl ObservationUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn input(mut self, input: impl Into<serde_json::Value>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn output(mut self, output: impl Into<serde_json::Value>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn level(mut self, level: EventLevel) -> Self {
        self.level = Some(level);
        self
    }

    pub fn status_message(mut self, message: impl Into<String>) -> Self {
        self.status_message = Some(message.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }
}

/// Rename, annotate or re-level the active observation.
///
/// Warning and error levels set an error status (the status message, else
/// `Level: <level>`); other levels set ok. A status message without a level
/// also sets ok.
pub fn update_current_observation(update: ObservationUpdate) {
    let Some(obs) = Observation::current() else {
        return;
    };

    if let Some(name) = update.name {
        obs.set(KeyValue::new(observation::NAME, name.clone()));
        obs.set(KeyValue::new(observation::SPAN_NAME, name.clone()));
        obs.update_name(name);
    }
    if let Some(input) = update.input {
        let text = json_to_text(input);
        obs.set(KeyValue::new(gen_ai::PROMPT, text.clone()));
        obs.set(KeyValue::new(observation::INPUT, text));
    }
    if let Some(output) = update.output {
        let text = json_to_text(output);
        obs.set(KeyValue::new(gen_ai::COMPLETION, text.clone()));
        obs.set(KeyValue::new(observation::OUTPUT, text));
    }
    if let Some(level) = update.level {
        let label = level.as_str().to_ascii_uppercase();
        obs.set(KeyValue::new(observation::LEVEL, label.clone()));
        if level.is_failure() {
            let description = update
                .status_message
                .clone()
                .unwrap_or_else(|| format!("Level: {label}"));
            obs.set_status(Status::error(description));
        } else {
            obs.set_status(Status::Ok);
        }
    }
    if let Some(message) = update.status_message {
        obs.set(KeyValue::new(observation::STATUS_MESSAGE, message));
        if update.level.is_none() {
            obs.set_status(Status::Ok);
        }
    }
    obs.set_json(Some(observation::METADATA_PREFIX), update.metadata);
    obs.set_json(None, update.attributes);
}

/// Changes applied by [`update_current_trace`].
#[derive(Debug, Clone, Default)]
pub struct TraceUpdate {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub tags: Vec<String>,
    pub metadata: Vec<(String, serde_json::Value)>,
    pub attributes: Vec<(String, serde_json::Value)>,
    /// Marks the span failed with this message, without changing status.
    pub error: Option<String>,
    pub status: Option<Status>,
}

impl TraceUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }
}

pub fn update_current_trace(update: TraceUpdate) {
    let Some(obs) = Observation::current() else {
        return;
    };

    if let Some(user_id) = update.user_id {
        obs.set(KeyValue::new(semconv::trace::USER_ID, user_id));
    }
    if let Some(session_id) = update.session_id {
        obs.set(KeyValue::new(semconv::trace::SESSION_ID, session_id));
    }
    if !update.tags.is_empty() {
        obs.set(KeyValue::new(semconv::trace::TAGS, string_array(update.tags)));
    }
    obs.set_json(Some(observation::METADATA_PREFIX), update.metadata);
    obs.set_json(None, update.attributes);
    if let Some(message) = update.error {
        obs.set(KeyValue::new(semconv::error::FLAG, true));
        obs.set(KeyValue::new(semconv::error::MESSAGE, message));
    }
    if let Some(status) = update.status {
        obs.set_status(status);
    }
}

pub fn score_current_observation(name: &str, value: impl Into<ScoreValue>, comment: Option<&str>) {
    if let Some(obs) = Observation::current() {
        obs.add_score(ScoreTarget::Observation, name, &value.into(), comment);
    }
}

pub fn score_current_trace(name: &str, value: impl Into<ScoreValue>, comment: Option<&str>) {
    if let Some(obs) = Observation::current() {
        let mut event = obs.set_score(ScoreTarget::Trace, name, &value.into(), comment);
        event.push(KeyValue::new("level", "trace"));
        obs.add_event(ScoreTarget::Trace.prefix(), event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{attr, event_attr, recording_tracer};
    use opentelemetry::trace::{Tracer, TracerProvider as _};

    #[test]
    fn helpers_are_noops_without_span() {
        assert_eq!(current_trace_id(), None);
        assert_eq!(trace_metadata(), None);
        update_current_observation(ObservationUpdate::new().name("ignored"));
        score_current_trace("x", 1.0, None);
    }

    #[test]
    fn trace_metadata_matches_active_span() {
        let (provider, _exporter) = recording_tracer();
        let tracer = provider.tracer("test");
        let cx = Context::current().with_span(tracer.start("op"));
        let _attached = cx.clone().attach();

        let metadata = trace_metadata().unwrap();
        let span_cx = cx.span().span_context().clone();
        assert_eq!(metadata.existing_trace_id, span_cx.trace_id().to_string());
        assert_eq!(metadata.parent_observation_id, span_cx.span_id().to_string());
        assert_eq!(
            current_observation_id().map(|id| id.to_hex()),
            Some(span_cx.span_id().to_string())
        );
    }

    #[test]
    fn warning_level_sets_error_status() {
        let (provider, exporter) = recording_tracer();
        let tracer = provider.tracer("test");
        let cx = Context::current().with_span(tracer.start("op"));
        {
            let _attached = cx.clone().attach();
            update_current_observation(
                ObservationUpdate::new()
                    .name("renamed")
                    .level(EventLevel::Warning)
                    .metadata("rows", 10),
            );
        }
        cx.span().end();

        let spans = exporter.get_finished_spans().unwrap();
        let span = &spans[0];
        assert_eq!(span.name, "renamed");
        assert_eq!(attr(span, observation::LEVEL).as_deref(), Some("WARNING"));
        assert_eq!(attr(span, "metadata.rows").as_deref(), Some("10"));
        assert_eq!(
            span.status,
            Status::Error {
                description: "Level: WARNING".into()
            }
        );
    }

    #[test]
    fn trace_update_sets_identity_and_error() {
        let (provider, exporter) = recording_tracer();
        let tracer = provider.tracer("test");
        let cx = Context::current().with_span(tracer.start("op"));
        {
            let _attached = cx.clone().attach();
            update_current_trace(
                TraceUpdate::new()
                    .user_id("u-1")
                    .session_id("s-1")
                    .tags(["a", "b"])
                    .error("upstream timeout"),
            );
        }
        cx.span().end();

        let spans = exporter.get_finished_spans().unwrap();
        let span = &spans[0];
        assert_eq!(attr(span, "user.id").as_deref(), Some("u-1"));
        assert_eq!(attr(span, "session.id").as_deref(), Some("s-1"));
        assert_eq!(attr(span, "error.message").as_deref(), Some("upstream timeout"));
        assert!(attr(span, "tags").is_some());
    }

    #[test]
    fn trace_score_event_carries_level() {
        let (provider, exporter) = recording_tracer();
        let tracer = provider.tracer("test");
        let cx = Context::current().with_span(tracer.start("op"));
        {
            let _attached = cx.clone().attach();
            score_current_observation("fit", 0.5, None);
            score_current_trace("fit", 0.8, Some("panel"));
        }
        cx.span().end();

        let spans = exporter.get_finished_spans().unwrap();
        let span = &spans[0];
        assert_eq!(event_attr(span, "score", "value").as_deref(), Some("0.5"));
        assert_eq!(event_attr(span, "score", "level"), None);
        assert_eq!(event_attr(span, "trace_score", "level").as_deref(), Some("trace"));
        assert_eq!(event_attr(span, "trace_score", "comment").as_deref(), Some("panel"));
    }
}
