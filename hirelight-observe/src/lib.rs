//! Observability and tracing infrastructure for hirelight.
//!
//! This crate provides OpenTelemetry-based tracing with support for:
//! - Scoped traces, spans and LLM generations with automatic nesting
//! - Pluggable exporters (console, Datadog, Honeycomb, Langfuse, OTLP, New Relic)
//!   selected from the environment
//! - Function instrumentation via [`ObservabilityClient::observe`]
//! - Callback adapters for LangChain and LiteLLM
//! - Integration with the `tracing` ecosystem
//!
//! ```no_run
//! use hirelight_observe::{ClientConfig, ObservationExt, obs};
//!
//! obs().init(ClientConfig::new("screening").with_environment("staging"));
//!
//! obs().trace("screen_candidate").user_id("recruiter-7").run(|trace| {
//!     trace.metadata([("candidate", "c-42")]);
//!     obs().generation("summarise").model("gpt-4o").run(|generation| {
//!         generation.input("Summarise this resume").output("Senior engineer");
//!     });
//! });
//!
//! obs().flush(hirelight_observe::DEFAULT_FLUSH_TIMEOUT);
//! ```

use std::sync::OnceLock;

pub mod client;
pub mod config;
pub mod context;
pub mod env;
pub mod error;
pub mod exporters;
pub mod integrations;
pub mod logging;
pub mod observe;
pub mod semconv;
pub mod types;
mod value;

#[cfg(test)]
mod testing;

pub use client::{
    DEFAULT_FLUSH_TIMEOUT, EventBuilder, ExporterStatus, GenerationBuilder, GenerationGuard,
    ObservabilityClient, ObservationGuard, SpanBuilder, SpanGuard, TRACER_NAME, TraceBuilder,
    TraceGuard,
};
pub use config::ClientConfig;
pub use context::{
    GenerationContext, Observation, ObservationExt, ObservationUpdate, SpanContext, TraceContext,
    TraceMetadata, TraceUpdate, current_observation_id, current_trace_id,
    score_current_observation, score_current_trace, trace_metadata, update_current_observation,
    update_current_trace,
};
pub use env::{Env, ProcessEnv};
pub use error::{ExporterError, ObserveError, Result};
pub use exporters::{
    Exporter, check_exporter_availability, detect_exporters, exporter_info, exporter_names,
    get_exporter,
};
pub use integrations::{CallbackError, LangchainCallbackHandler, LiteLlmCallbackHandler};
pub use logging::{LogFormat, init_logging};
pub use observe::Observe;
pub use types::{
    EventLevel, ObservationKind, ScoreTarget, ScoreValue, SpanId, TokenUsage,
    TraceId,
};

static CLIENT: OnceLock<ObservabilityClient> = OnceLock::new();

/// The process-wide client, reading the process environment.
///
/// It initialises itself with defaults on first use unless [`init`]
/// was called before.
///
/// [`init`]: ObservabilityClient::init
pub fn obs() -> &'static ObservabilityClient {
    CLIENT.get_or_init(ObservabilityClient::new)
}
