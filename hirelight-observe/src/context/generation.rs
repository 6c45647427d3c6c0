use std::ops::Deref;

use opentelemetry::KeyValue;

use super::Observation;
use crate::semconv::gen_ai;
use crate::types::{ScoreTarget, ScoreValue, TokenUsage};
use crate::value::json_to_text;

/// Handle to a span recording one LLM call.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    inner: Observation,
}

impl GenerationContext {
    pub(crate) fn new(inner: Observation) -> Self {
        Self { inner }
    }

    /// Prompt sent to the model. Strings are stored verbatim, anything else
    /// as JSON.
    pub fn input(&self, content: impl Into<serde_json::Value>) -> &Self {
        self.inner
            .set(KeyValue::new(gen_ai::PROMPT, json_to_text(content.into())));
        self
    }

    pub fn output(&self, content: impl Into<serde_json::Value>) -> &Self {
        self.inner
            .set(KeyValue::new(gen_ai::COMPLETION, json_to_text(content.into())));
        self
    }

    pub fn model(&self, model: impl Into<String>) -> &Self {
        self.inner
            .set(KeyValue::new(gen_ai::REQUEST_MODEL, model.into()));
        self
    }

    /// Record whichever token counts are known.
    pub fn usage(&self, usage: TokenUsage) -> &Self {
        let counts = [
            (gen_ai::USAGE_PROMPT_TOKENS, usage.prompt_tokens),
            (gen_ai::USAGE_COMPLETION_TOKENS, usage.completion_tokens),
            (gen_ai::USAGE_TOTAL_TOKENS, usage.total_tokens),
        ];
        for (key, count) in counts {
            if let Some(count) = count {
                self.inner.set(KeyValue::new(key, count));
            }
        }
        self
    }

    pub fn score(&self, name: &str, value: impl Into<ScoreValue>, comment: Option<&str>) -> &Self {
        self.inner
            .add_score(ScoreTarget::Observation, name, &value.into(), comment);
        self
    }
}

impl Deref for GenerationContext {
    type Target = Observation;

    fn deref(&self) -> &Observation {
        &self.inner
    }
}

impl AsRef<Observation> for GenerationContext {
    fn as_ref(&self) -> &Observation {
        &self.inner
    }
}
