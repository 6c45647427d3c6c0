use std::ops::Deref;

use opentelemetry::KeyValue;

use super::Observation;
use crate::semconv;
use crate::types::{ScoreTarget, ScoreValue};
use crate::value::string_array;

/// Handle to a root span.
#[derive(Debug, Clone)]
pub struct TraceContext {
    inner: Observation,
}

impl TraceContext {
    pub(crate) fn new(inner: Observation) -> Self {
        Self { inner }
    }

    pub fn tags<I, S>(&self, tags: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner
            .set(KeyValue::new(semconv::trace::TAGS, string_array(tags)));
        self
    }

    pub fn user(&self, user_id: impl Into<String>) -> &Self {
        self.inner
            .set(KeyValue::new(semconv::trace::USER_ID, user_id.into()));
        self
    }

    pub fn session(&self, session_id: impl Into<String>) -> &Self {
        self.inner
            .set(KeyValue::new(semconv::trace::SESSION_ID, session_id.into()));
        self
    }

    /// Score the whole trace.
    pub fn score(&self, name: &str, value: impl Into<ScoreValue>, comment: Option<&str>) -> &Self {
        self.inner
            .add_score(ScoreTarget::Trace, name, &value.into(), comment);
        self
    }
}

impl Deref for TraceContext {
    type Target = Observation;

    fn deref(&self) -> &Observation {
        &self.inner
    }
}

impl AsRef<Observation> for TraceContext {
    fn as_ref(&self) -> &Observation {
        &self.inner
    }
}
