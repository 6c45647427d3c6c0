//! Callback adapters for LLM frameworks.
//!
//! The adapters translate framework lifecycle callbacks into spans on the
//! client's provider. Open spans are kept in a mutex-guarded map keyed by
//! the framework's run or call id and are ended exactly once.

mod langchain;
mod litellm;
pub mod messages;

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

use opentelemetry::KeyValue;

use crate::context::Observation;
use crate::semconv::gen_ai;
use crate::types::TokenUsage;
use crate::value::short_type_name;

pub use langchain::{
    AgentAction, AgentFinish, Generation, LangchainCallbackHandler, LlmOutput, LlmResult, Serialized,
};
pub use litellm::{CallOutcome, CallRequest, LiteLlmCallbackHandler, OptionalParams};

/// Default cap on captured free text.
const MAX_TEXT_CHARS: usize = 1000;
/// Cap on agent action logs.
const MAX_AGENT_LOG_CHARS: usize = 500;
/// Cap on each streamed delta.
const MAX_STREAM_DELTA_CHARS: usize = 512;

/// An error reported by a framework callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackError {
    pub kind: String,
    pub message: String,
}

impl CallbackError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Placeholder for failures reported without an error value.
    pub fn unknown() -> Self {
        Self::new("Unknown", "Unknown")
    }
}

impl<E: std::error::Error + ?Sized> From<&E> for CallbackError {
    fn from(err: &E) -> Self {
        Self::new(short_type_name::<E>(), err.to_string())
    }
}

/// Known token counts, deriving the total when it is missing.
fn set_usage(obs: &Observation, usage: TokenUsage) {
    let counts = [
        (gen_ai::USAGE_PROMPT_TOKENS, usage.prompt_tokens),
        (gen_ai::USAGE_COMPLETION_TOKENS, usage.completion_tokens),
        (gen_ai::USAGE_TOTAL_TOKENS, usage.resolved_total()),
    ];
    for (key, count) in counts.into_iter().filter_map(|(k, c)| c.map(|c| (k, c))) {
        obs.set(KeyValue::new(key, count));
    }
}

/// Open observations keyed by run or call id.
#[derive(Debug)]
struct OpenSpans<K, V = Observation> {
    inner: Mutex<HashMap<K, V>>,
}

impl<K, V> Default for OpenSpans<K, V> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash, V: Clone> OpenSpans<K, V> {
    fn lock(&self) -> MutexGuard<'_, HashMap<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, key: K, value: V) {
        self.lock().insert(key, value);
    }

    fn get(&self, key: &K) -> Option<V> {
        self.lock().get(key).cloned()
    }

    /// Removing is how a span claims its single `end`.
    fn remove(&self, key: &K) -> Option<V> {
        self.lock().remove(key)
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}
