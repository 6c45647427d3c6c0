//! Context objects handed to callers inside a scoped observation.
//!
//! Every context wraps an OpenTelemetry [`Context`] carrying the span it
//! writes to. Setters only touch span attributes and events; ending the span
//! belongs to the guard that created the context.

mod current;
mod generation;
mod span;
mod trace;

use std::backtrace::{Backtrace, BacktraceStatus};
use std::borrow::Cow;

use opentelemetry::trace::{Status, TraceContextExt};
use opentelemetry::{Context, Key, KeyValue, Value};

use crate::semconv;
use crate::types::{ScoreTarget, ScoreValue, SpanId, TraceId};
use crate::value::{json_to_value, short_type_name};

pub use current::{
    ObservationUpdate, TraceMetadata, TraceUpdate, current_observation_id, current_trace_id,
    score_current_observation, score_current_trace, trace_metadata, update_current_observation,
    update_current_trace,
};
pub use generation::GenerationContext;
pub use span::SpanContext;
pub use trace::TraceContext;

/// A span-carrying context: the shared base of every observation.
#[derive(Debug, Clone)]
pub struct Observation {
    cx: Context,
}

impl Observation {
    pub(crate) fn new(cx: Context) -> Self {
        Self { cx }
    }

    /// The thread's active observation, if a valid span is current.
    pub(crate) fn current() -> Option<Self> {
        let cx = Context::current();
        cx.span()
            .span_context()
            .is_valid()
            .then(|| Self::new(cx))
    }

    /// The underlying context, for propagating across threads or futures.
    pub fn context(&self) -> &Context {
        &self.cx
    }

    pub fn trace_id(&self) -> TraceId {
        self.cx.span().span_context().trace_id().into()
    }

    pub fn observation_id(&self) -> SpanId {
        self.cx.span().span_context().span_id().into()
    }

    pub fn is_recording(&self) -> bool {
        self.cx.span().is_recording()
    }

    pub(crate) fn set(&self, kv: KeyValue) {
        self.cx.span().set_attribute(kv);
    }

    /// Set JSON-shaped values, skipping nulls, optionally under `prefix.`.
    pub(crate) fn set_json<I, K, V>(&self, prefix: Option<&str>, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<serde_json::Value>,
    {
        let span = self.cx.span();
        for (key, value) in entries {
            let Some(value) = json_to_value(value.into()) else {
                continue;
            };
            let key = match prefix {
                Some(prefix) => format!("{prefix}.{}", key.as_ref()),
                None => key.as_ref().to_string(),
            };
            span.set_attribute(KeyValue::new(key, value));
        }
    }

    pub(crate) fn add_event(&self, name: impl Into<Cow<'static, str>>, attributes: Vec<KeyValue>) {
        self.cx.span().add_event(name, attributes);
    }

    pub(crate) fn set_status(&self, status: Status) {
        self.cx.span().set_status(status);
    }

    pub(crate) fn update_name(&self, name: String) {
        self.cx.span().update_name(name);
    }

    /// Error flag, type and message, an `exception` event, and error status.
    pub(crate) fn record_failure(&self, error_type: &str, message: &str) {
        let span = self.cx.span();
        span.set_attribute(KeyValue::new(semconv::error::FLAG, true));
        span.set_attribute(KeyValue::new(semconv::error::TYPE, error_type.to_string()));
        span.set_attribute(KeyValue::new(semconv::error::MESSAGE, message.to_string()));

        let mut event = vec![
            KeyValue::new(semconv::error::EXCEPTION_TYPE, error_type.to_string()),
            KeyValue::new(semconv::error::EXCEPTION_MESSAGE, message.to_string()),
        ];
        let backtrace = Backtrace::capture();
        if backtrace.status() == BacktraceStatus::Captured {
            event.push(KeyValue::new(
                semconv::error::EXCEPTION_STACKTRACE,
                backtrace.to_string(),
            ));
        }
        span.add_event(semconv::error::EXCEPTION_EVENT, event);
        span.set_status(Status::error(message.to_string()));
    }

    pub(crate) fn mark_panicked(&self) {
        self.record_failure("panic", "observation dropped while panicking");
    }

    /// Score attributes under the target's prefix. Returns the attributes
    /// of the matching score event for the caller to name and attach.
    pub(crate) fn set_score(
        &self,
        target: ScoreTarget,
        name: &str,
        value: &ScoreValue,
        comment: Option<&str>,
    ) -> Vec<KeyValue> {
        let prefix = target.prefix();
        let value = value.to_string();
        self.set(KeyValue::new(
            semconv::score::value_key(prefix, name),
            value.clone(),
        ));
        if let Some(comment) = comment.filter(|c| !c.is_empty()) {
            self.set(KeyValue::new(
                semconv::score::comment_key(prefix, name),
                comment.to_string(),
            ));
        }

        vec![
            KeyValue::new("name", name.to_string()),
            KeyValue::new("value", value),
            KeyValue::new("comment", comment.unwrap_or_default().to_string()),
        ]
    }

    /// Score attributes plus an event named after the prefix.
    pub(crate) fn add_score(
        &self,
        target: ScoreTarget,
        name: &str,
        value: &ScoreValue,
        comment: Option<&str>,
    ) {
        let event = self.set_score(target, name, value, comment);
        self.add_event(target.prefix(), event);
    }

    pub(crate) fn end(&self) {
        self.cx.span().end();
    }
}

impl AsRef<Observation> for Observation {
    fn as_ref(&self) -> &Observation {
        self
    }
}

/// Chainable setters shared by every context type.
pub trait ObservationExt: AsRef<Observation> {
    fn set_attribute(&self, key: impl Into<Key>, value: impl Into<Value>) -> &Self {
        self.as_ref().set(KeyValue::new(key, value));
        self
    }

    /// Set several attributes at once. Nulls are skipped and structured
    /// values are stored as JSON text.
    fn attributes<I, K, V>(&self, entries: I) -> &Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<serde_json::Value>,
    {
        self.as_ref().set_json(None, entries);
        self
    }

    /// Set attributes under the `metadata.` prefix.
    fn metadata<I, K, V>(&self, entries: I) -> &Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<serde_json::Value>,
    {
        self.as_ref()
            .set_json(Some(semconv::observation::METADATA_PREFIX), entries);
        self
    }

    /// Record `err` and mark the observation as failed.
    fn error<E: std::error::Error + ?Sized>(&self, err: &E) -> &Self {
        self.as_ref()
            .record_failure(short_type_name::<E>(), &err.to_string());
        self
    }

    fn event(&self, name: impl Into<String>, attributes: Vec<KeyValue>) -> &Self {
        self.as_ref().add_event(name.into(), attributes);
        self
    }
}

impl<T: AsRef<Observation> + ?Sized> ObservationExt for T {}
