//! Attribute names used on spans and events.
//!
//! GenAI keys follow the OpenTelemetry `gen_ai.*` conventions so hosted
//! backends render generations natively. Everything else is the vocabulary
//! the client and the integration adapters share.

pub mod gen_ai {
    pub const SYSTEM: &str = "gen_ai.system";
    pub const OPERATION_NAME: &str = "gen_ai.operation.name";
    pub const REQUEST_MODEL: &str = "gen_ai.request.model";
    pub const REQUEST_TEMPERATURE: &str = "gen_ai.request.temperature";
    pub const REQUEST_TOP_P: &str = "gen_ai.request.top_p";
    pub const REQUEST_MAX_TOKENS: &str = "gen_ai.request.max_tokens";
    pub const REQUEST_STREAM: &str = "gen_ai.request.stream";
    pub const REQUEST_USER: &str = "gen_ai.request.user";
    pub const RESPONSE_MODEL: &str = "gen_ai.response.model";
    pub const RESPONSE_ID: &str = "gen_ai.response.id";
    pub const RESPONSE_FINISH_REASONS: &str = "gen_ai.response.finish_reasons";
    pub const USAGE_PROMPT_TOKENS: &str = "gen_ai.usage.prompt_tokens";
    pub const USAGE_COMPLETION_TOKENS: &str = "gen_ai.usage.completion_tokens";
    pub const USAGE_TOTAL_TOKENS: &str = "gen_ai.usage.total_tokens";
    /// Whole prompt as one string, set by generation contexts.
    pub const PROMPT: &str = "gen_ai.prompt";
    /// Whole completion as one string, set by generation contexts.
    pub const COMPLETION: &str = "gen_ai.completion";
    pub const STREAM_DELTA_EVENT: &str = "gen_ai.stream.delta";

    pub fn prompt_role(i: usize) -> String {
        format!("gen_ai.prompt.{i}.role")
    }

    pub fn prompt_content(i: usize) -> String {
        format!("gen_ai.prompt.{i}.content")
    }

    pub fn completion_role(i: usize) -> String {
        format!("gen_ai.completion.{i}.role")
    }

    pub fn completion_content(i: usize) -> String {
        format!("gen_ai.completion.{i}.content")
    }
}

pub mod error {
    pub const FLAG: &str = "error";
    pub const TYPE: &str = "error.type";
    pub const MESSAGE: &str = "error.message";
    pub const EXCEPTION_EVENT: &str = "exception";
    pub const EXCEPTION_TYPE: &str = "exception.type";
    pub const EXCEPTION_MESSAGE: &str = "exception.message";
    pub const EXCEPTION_STACKTRACE: &str = "exception.stacktrace";
}

pub mod llm {
    pub const TOTAL_COST: &str = "llm.usage.total_cost";
    pub const CACHE_HIT: &str = "llm.cache_hit";
    pub const RESPONSE_RECEIVED_EVENT: &str = "llm.response_received";
}

pub mod observation {
    pub const TYPE: &str = "observation.type";
    pub const GENERATION: &str = "generation";
    pub const NAME: &str = "observation.name";
    pub const SPAN_NAME: &str = "span.name";
    pub const INPUT: &str = "observation.input";
    pub const OUTPUT: &str = "observation.output";
    pub const LEVEL: &str = "observation.level";
    pub const STATUS_MESSAGE: &str = "observation.status_message";
    /// Serialized arguments captured by `observe`.
    pub const CAPTURED_INPUT: &str = "input";
    /// Serialized return value captured by `observe`.
    pub const CAPTURED_OUTPUT: &str = "output";
    pub const METADATA_PREFIX: &str = "metadata";
}

pub mod trace {
    pub const USER_ID: &str = "user.id";
    pub const SESSION_ID: &str = "session.id";
    pub const TAGS: &str = "tags";
}

pub mod score {
    pub const OBSERVATION_PREFIX: &str = "score";
    pub const TRACE_PREFIX: &str = "trace_score";

    /// Event names for scores recorded through the client.
    pub const OBSERVATION_EVENT: &str = "observation_score";
    pub const TRACE_EVENT: &str = "trace_score";

    pub fn value_key(prefix: &str, name: &str) -> String {
        format!("{prefix}.{name}.value")
    }

    pub fn comment_key(prefix: &str, name: &str) -> String {
        format!("{prefix}.{name}.comment")
    }
}

pub mod resource {
    pub const DEPLOYMENT_ENVIRONMENT: &str = "deployment.environment";
    pub const SERVICE_VERSION: &str = "service.version";
}
