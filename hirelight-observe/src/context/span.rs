use std::ops::Deref;

use super::Observation;
use crate::types::{ScoreTarget, ScoreValue};

/// Handle to a child span.
#[derive(Debug, Clone)]
pub struct SpanContext {
    inner: Observation,
}

impl SpanContext {
    pub(crate) fn new(inner: Observation) -> Self {
        Self { inner }
    }

    /// Score this observation.
    pub fn score(&self, name: &str, value: impl Into<ScoreValue>, comment: Option<&str>) -> &Self {
        self.inner
            .add_score(ScoreTarget::Observation, name, &value.into(), comment);
        self
    }
}

impl Deref for SpanContext {
    type Target = Observation;

    fn deref(&self) -> &Observation {
        &self.inner
    }
}

impl AsRef<Observation> for SpanContext {
    fn as_ref(&self) -> &Observation {
        &self.inner
    }
}
