use std::collections::BTreeSet;

use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer, TracerProvider as _};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::trace::SdkTracer;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::messages::{ChatMessage, ChoiceContent, ModelResponse};
use super::{CallbackError, MAX_STREAM_DELTA_CHARS, OpenSpans, set_usage};
use crate::client::ObservabilityClient;
use crate::context::Observation;
use crate::semconv::{gen_ai, llm, observation};
use crate::value::{string_array, truncate};

const TRACER_NAME: &str = "litellm";

/// Sampling parameters forwarded to the provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionalParams {
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
    pub top_p: Option<f64>,
}

/// What the gateway knows about a call before it is sent.
///
/// Top-level sampling parameters win over their `optional_params` copies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    pub model: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub api_base: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
    pub top_p: Option<f64>,
    pub stream: Option<bool>,
    pub user: Option<String>,
    #[serde(default)]
    pub optional_params: OptionalParams,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl CallRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            ..Self::default()
        }
    }

    /// `embedding`, `chat` or `completion`.
    pub fn operation(&self) -> &'static str {
        let embeddings = self
            .api_base
            .as_deref()
            .is_some_and(|base| base.ends_with("/embeddings"));
        if embeddings {
            "embedding"
        } else if self.messages.is_empty() {
            "completion"
        } else {
            "chat"
        }
    }
}

/// Gateway bookkeeping reported alongside a successful response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallOutcome {
    pub response_cost: Option<f64>,
    pub cache_hit: Option<bool>,
    /// The reassembled response when the call was streamed.
    pub complete_streaming_response: Option<ModelResponse>,
}

#[derive(Debug, Clone)]
struct ActiveCall {
    obs: Observation,
    model: String,
}

/// Turns LiteLLM gateway callbacks into one client span per call.
///
/// The span opens in [`log_pre_api_call`](Self::log_pre_api_call) and is
/// ended by whichever of success or failure arrives first; later callbacks
/// for the same call id are ignored.
#[derive(Debug)]
pub struct LiteLlmCallbackHandler {
    tracer: SdkTracer,
    trace_content: bool,
    metadata_allowlist: BTreeSet<String>,
    calls: OpenSpans<String, ActiveCall>,
}

impl LiteLlmCallbackHandler {
    pub fn new(client: &ObservabilityClient) -> Self {
        Self::with_tracer(client.provider().tracer(TRACER_NAME))
    }

    pub fn with_tracer(tracer: SdkTracer) -> Self {
        Self {
            tracer,
            trace_content: true,
            metadata_allowlist: BTreeSet::new(),
            calls: OpenSpans::default(),
        }
    }

    /// Whether messages, completions and stream deltas are captured.
    #[must_use]
    pub fn trace_content(mut self, enabled: bool) -> Self {
        self.trace_content = enabled;
        self
    }

    /// Request metadata keys copied onto the span. Nothing is copied by
    /// default.
    #[must_use]
    pub fn metadata_allowlist<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata_allowlist = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn open_calls(&self) -> usize {
        self.calls.len()
    }

    pub fn log_pre_api_call(&self, call_id: &str, request: &CallRequest) {
        let op = request.operation();
        let parent = Context::current();
        let span = self
            .tracer
            .span_builder(format!("litellm.{op}"))
            .with_kind(SpanKind::Client)
            .with_attributes([
                KeyValue::new(observation::TYPE, observation::GENERATION),
                KeyValue::new(gen_ai::REQUEST_MODEL, request.model.clone()),
                KeyValue::new(gen_ai::OPERATION_NAME, op),
            ])
            .start_with_context(&self.tracer, &parent);
        let obs = Observation::new(parent.with_span(span));

        let optional = &request.optional_params;
        if let Some(temperature) = request.temperature.or(optional.temperature) {
            obs.set(KeyValue::new(gen_ai::REQUEST_TEMPERATURE, temperature));
        }
        if let Some(max_tokens) = request.max_tokens.or(optional.max_tokens) {
            obs.set(KeyValue::new(gen_ai::REQUEST_MAX_TOKENS, max_tokens));
        }
        if let Some(top_p) = request.top_p.or(optional.top_p) {
            obs.set(KeyValue::new(gen_ai::REQUEST_TOP_P, top_p));
        }
        if let Some(stream) = request.stream {
            obs.set(KeyValue::new(gen_ai::REQUEST_STREAM, stream));
        }
        if let Some(user) = &request.user {
            obs.set(KeyValue::new(gen_ai::REQUEST_USER, user.clone()));
        }
        obs.set_json(
            Some(observation::METADATA_PREFIX),
            self.metadata_allowlist
                .iter()
                .filter_map(|key| request.metadata.get(key).map(|v| (key, v.clone()))),
        );
        if self.trace_content {
            set_prompts(&obs, &request.messages);
        }

        self.calls.insert(
            call_id.to_string(),
            ActiveCall {
                obs,
                model: request.model.clone(),
            },
        );
    }

    pub fn log_post_api_call(&self, call_id: &str) {
        if let Some(call) = self.calls.get(&call_id.to_string()) {
            call.obs.add_event(llm::RESPONSE_RECEIVED_EVENT, Vec::new());
        }
    }

    pub fn log_success_event(&self, call_id: &str, response: &ModelResponse, outcome: &CallOutcome) {
        let Some(ActiveCall { obs, model }) = self.calls.remove(&call_id.to_string()) else {
            debug!(call_id, "success for unknown call");
            return;
        };

        if let Some(res_model) = response.model.as_ref().filter(|m| **m != model) {
            obs.set(KeyValue::new(gen_ai::RESPONSE_MODEL, res_model.clone()));
        }
        if let Some(id) = &response.id {
            obs.set(KeyValue::new(gen_ai::RESPONSE_ID, id.clone()));
        }
        if let Some(reason) = response.choices.first().and_then(|c| c.finish_reason.clone()) {
            obs.set(KeyValue::new(
                gen_ai::RESPONSE_FINISH_REASONS,
                string_array([reason]),
            ));
        }
        if self.trace_content {
            let full = outcome.complete_streaming_response.as_ref().unwrap_or(response);
            set_completions(&obs, full);
        }
        if let Some(usage) = response.usage.filter(|usage| !usage.is_empty()) {
            set_usage(&obs, usage);
        }
        if let Some(cost) = outcome.response_cost {
            obs.set(KeyValue::new(llm::TOTAL_COST, cost));
        }
        if let Some(cache_hit) = outcome.cache_hit {
            obs.set(KeyValue::new(llm::CACHE_HIT, cache_hit));
        }
        obs.set_status(Status::Ok);
        obs.end();
    }

    pub fn log_failure_event(&self, call_id: &str, error: impl Into<CallbackError>) {
        if let Some(call) = self.calls.remove(&call_id.to_string()) {
            let error = error.into();
            call.obs.record_failure(&error.kind, &error.message);
            call.obs.end();
        }
    }

    /// Record one streamed chunk's text.
    pub fn log_stream_event(&self, call_id: &str, chunk: &ModelResponse) {
        if !self.trace_content {
            return;
        }
        let Some(call) = self.calls.get(&call_id.to_string()) else {
            return;
        };
        if let Some(text) = chunk.choices.first().and_then(|c| c.delta_text()) {
            call.obs.add_event(
                gen_ai::STREAM_DELTA_EVENT,
                vec![KeyValue::new(
                    "content",
                    truncate(&text, MAX_STREAM_DELTA_CHARS),
                )],
            );
        }
    }
}

fn set_prompts(obs: &Observation, messages: &[ChatMessage]) {
    for (i, message) in messages.iter().enumerate() {
        if message.is_empty() {
            continue;
        }
        let role = message.role.as_deref().unwrap_or("user");
        obs.set(KeyValue::new(gen_ai::prompt_role(i), role.to_string()));
        obs.set(KeyValue::new(gen_ai::prompt_content(i), message.text()));
        set_calls(obs, &format!("gen_ai.prompt.{i}"), message);
        if let Some(name) = &message.name {
            obs.set(KeyValue::new(format!("gen_ai.prompt.{i}.name"), name.clone()));
        }
    }
}

fn set_completions(obs: &Observation, response: &ModelResponse) {
    for (i, choice) in response.choices.iter().enumerate() {
        match choice.content() {
            Some(ChoiceContent::Message(message)) => {
                let role = message.role.as_deref().unwrap_or("assistant");
                obs.set(KeyValue::new(gen_ai::completion_role(i), role.to_string()));
                obs.set(KeyValue::new(gen_ai::completion_content(i), message.text()));
                set_calls(obs, &format!("gen_ai.completion.{i}"), message);
            }
            Some(ChoiceContent::Text(text)) => {
                obs.set(KeyValue::new(gen_ai::completion_role(i), "assistant"));
                obs.set(KeyValue::new(gen_ai::completion_content(i), text.to_string()));
            }
            None => {}
        }
    }
}

/// Function and tool calls carried by a message, under `prefix`.
fn set_calls(obs: &Observation, prefix: &str, message: &ChatMessage) {
    if let Some(call) = &message.function_call {
        obs.set(KeyValue::new(
            format!("{prefix}.function_call.name"),
            call.name.clone(),
        ));
        obs.set(KeyValue::new(
            format!("{prefix}.function_call.arguments"),
            call.arguments_text(),
        ));
    }
    for (j, tool) in message.tool_calls.iter().flatten().enumerate() {
        let tool_prefix = format!("{prefix}.tool_call.{j}");
        obs.set(KeyValue::new(format!("{tool_prefix}.id"), tool.id.clone()));
        obs.set(KeyValue::new(format!("{tool_prefix}.type"), tool.kind.clone()));
        if let Some(function) = &tool.function {
            obs.set(KeyValue::new(
                format!("{tool_prefix}.function.name"),
                function.name.clone(),
            ));
            obs.set(KeyValue::new(
                format!("{tool_prefix}.function.arguments"),
                function.arguments_text(),
            ));
        }
    }
}
