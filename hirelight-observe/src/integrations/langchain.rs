use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer, TracerProvider as _};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::trace::SdkTracer;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::{CallbackError, MAX_AGENT_LOG_CHARS, MAX_TEXT_CHARS, OpenSpans, set_usage};
use crate::client::ObservabilityClient;
use crate::context::Observation;
use crate::semconv::{gen_ai, observation};
use crate::types::TokenUsage;
use crate::value::{json_to_text, truncate};

const TRACER_NAME: &str = "langchain";
const UNKNOWN: &str = "unknown";

/// Identity of the component that fired a callback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Serialized {
    /// Import path as a list of segments, or a single identifier.
    #[serde(default)]
    pub id: serde_json::Value,
    #[serde(default)]
    pub name: Option<String>,
}

impl Serialized {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// First id segment, else the id itself, else the name.
    pub fn model_name(&self) -> String {
        match &self.id {
            serde_json::Value::Array(segments) => segments
                .first()
                .map(|s| json_to_text(s.clone()))
                .unwrap_or_else(|| UNKNOWN.to_string()),
            serde_json::Value::Null | serde_json::Value::Bool(false) => self.display_name(),
            serde_json::Value::String(s) if s.is_empty() => self.display_name(),
            other => json_to_text(other.clone()),
        }
    }

    fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| UNKNOWN.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmOutput {
    #[serde(default)]
    pub token_usage: Option<TokenUsage>,
}

/// Output of one LLM run: a batch of generations per prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmResult {
    #[serde(default)]
    pub generations: Vec<Vec<Generation>>,
    #[serde(default)]
    pub llm_output: Option<LlmOutput>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentAction {
    pub tool: String,
    #[serde(default)]
    pub tool_input: serde_json::Value,
    #[serde(default)]
    pub log: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentFinish {
    #[serde(default)]
    pub return_values: serde_json::Value,
    #[serde(default)]
    pub log: String,
}

/// Turns LangChain callbacks into spans.
///
/// Each LLM run becomes a generation span named `langchain.llm.<run id>`.
/// Chain, tool and agent callbacks do not open spans of their own; they are
/// recorded as events on whatever span is current when they fire.
#[derive(Debug)]
pub struct LangchainCallbackHandler {
    tracer: SdkTracer,
    trace_content: bool,
    runs: OpenSpans<Uuid>,
}

impl LangchainCallbackHandler {
    pub fn new(client: &ObservabilityClient) -> Self {
        Self::with_tracer(client.provider().tracer(TRACER_NAME))
    }

    pub fn with_tracer(tracer: SdkTracer) -> Self {
        Self {
            tracer,
            trace_content: true,
            runs: OpenSpans::default(),
        }
    }

    /// Whether prompts and completions are captured. On by default.
    #[must_use]
    pub fn trace_content(mut self, enabled: bool) -> Self {
        self.trace_content = enabled;
        self
    }

    /// Number of LLM runs started but not yet ended.
    pub fn open_runs(&self) -> usize {
        self.runs.len()
    }

    pub fn on_llm_start(&self, serialized: &Serialized, prompts: &[String], run_id: Uuid) {
        let parent = Context::current();
        let span = self
            .tracer
            .span_builder(format!("langchain.llm.{run_id}"))
            .with_kind(SpanKind::Internal)
            .with_attributes([
                KeyValue::new(observation::TYPE, observation::GENERATION),
                KeyValue::new(gen_ai::REQUEST_MODEL, serialized.model_name()),
                KeyValue::new(gen_ai::OPERATION_NAME, "chat"),
            ])
            .start_with_context(&self.tracer, &parent);
        let obs = Observation::new(parent.with_span(span));

        if self.trace_content {
            for (i, prompt) in prompts.iter().enumerate() {
                obs.set(KeyValue::new(gen_ai::prompt_role(i), "user"));
                obs.set(KeyValue::new(gen_ai::prompt_content(i), prompt.clone()));
            }
        }
        self.runs.insert(run_id, obs);
    }

    pub fn on_llm_end(&self, response: &LlmResult, run_id: Uuid) {
        let Some(obs) = self.runs.remove(&run_id) else {
            debug!(%run_id, "llm end for unknown run");
            return;
        };

        if self.trace_content {
            let texts = response.generations.iter().flatten().map(|g| &g.text);
            for (i, text) in texts.enumerate() {
                obs.set(KeyValue::new(gen_ai::completion_role(i), "assistant"));
                obs.set(KeyValue::new(gen_ai::completion_content(i), text.clone()));
            }
        }
        if let Some(usage) = response
            .llm_output
            .as_ref()
            .and_then(|output| output.token_usage)
            .filter(|usage| !usage.is_empty())
        {
            set_usage(&obs, usage);
        }
        obs.set_status(Status::Ok);
        obs.end();
    }

    pub fn on_llm_error(&self, error: impl Into<CallbackError>, run_id: Uuid) {
        if let Some(obs) = self.runs.remove(&run_id) {
            let error = error.into();
            obs.record_failure(&error.kind, &error.message);
            obs.end();
        }
    }

    pub fn on_chain_start(&self, serialized: &Serialized, inputs: &serde_json::Value, run_id: Uuid) {
        current_event(
            "chain_start",
            run_id,
            vec![
                KeyValue::new("name", serialized.display_name()),
                KeyValue::new("inputs", clip(inputs)),
            ],
        );
    }

    pub fn on_chain_end(&self, outputs: &serde_json::Value, run_id: Uuid) {
        current_event("chain_end", run_id, vec![KeyValue::new("outputs", clip(outputs))]);
    }

    pub fn on_chain_error(&self, error: impl Into<CallbackError>, run_id: Uuid) {
        error_event("chain_error", run_id, error.into());
    }

    pub fn on_tool_start(&self, serialized: &Serialized, input: &str, run_id: Uuid) {
        current_event(
            "tool_start",
            run_id,
            vec![
                KeyValue::new("name", serialized.display_name()),
                KeyValue::new("input", truncate(input, MAX_TEXT_CHARS)),
            ],
        );
    }

    pub fn on_tool_end(&self, output: &str, run_id: Uuid) {
        current_event(
            "tool_end",
            run_id,
            vec![KeyValue::new("output", truncate(output, MAX_TEXT_CHARS))],
        );
    }

    pub fn on_tool_error(&self, error: impl Into<CallbackError>, run_id: Uuid) {
        error_event("tool_error", run_id, error.into());
    }

    pub fn on_agent_action(&self, action: &AgentAction, run_id: Uuid) {
        current_event(
            "agent_action",
            run_id,
            vec![
                KeyValue::new("tool", action.tool.clone()),
                KeyValue::new("log", truncate(&action.log, MAX_AGENT_LOG_CHARS)),
            ],
        );
    }

    pub fn on_agent_finish(&self, finish: &AgentFinish, run_id: Uuid) {
        current_event(
            "agent_finish",
            run_id,
            vec![KeyValue::new("return_values", clip(&finish.return_values))],
        );
    }
}

fn clip(value: &serde_json::Value) -> String {
    truncate(&json_to_text(value.clone()), MAX_TEXT_CHARS)
}

fn current_event(name: &'static str, run_id: Uuid, mut attributes: Vec<KeyValue>) {
    if let Some(obs) = Observation::current() {
        attributes.push(KeyValue::new("run_id", run_id.to_string()));
        obs.add_event(name, attributes);
    }
}

fn error_event(name: &'static str, run_id: Uuid, error: CallbackError) {
    current_event(
        name,
        run_id,
        vec![
            KeyValue::new("type", error.kind),
            KeyValue::new("message", error.message),
        ],
    );
}
