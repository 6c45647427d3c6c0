//! The observability client: tracer provider ownership and scoped spans.

use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::{Arc, OnceLock, mpsc};
use std::time::Duration;

use opentelemetry::trace::{SpanKind, TraceContextExt, Tracer, TracerProvider as _};
use opentelemetry::{Context, ContextGuard, Key, KeyValue, Value, global};
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::context::{GenerationContext, Observation, SpanContext, TraceContext};
use crate::env::{Env, ProcessEnv};
use crate::error::{ObserveError, Result};
use crate::exporters::{self, Exporter};
use crate::observe::Observe;
use crate::semconv;
use crate::types::{EventLevel, ObservationKind, ScoreTarget, ScoreValue};
use crate::value::{json_to_value, string_array};

/// Instrumentation scope name for spans created by the client.
pub const TRACER_NAME: &str = "hirelight-observe";

pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(30);

struct Pipeline {
    provider: SdkTracerProvider,
    tracer: SdkTracer,
    exporters: Vec<String>,
    flusher: Option<Flusher>,
}

type FlushReply = mpsc::Sender<OTelSdkResult>;

/// Background thread running `force_flush` so callers can stop waiting
/// after a timeout. Requests queue behind a flush that is still running.
struct Flusher {
    requests: mpsc::Sender<FlushReply>,
}

impl Flusher {
    fn spawn(provider: SdkTracerProvider) -> std::io::Result<Self> {
        let (requests, inbox) = mpsc::channel::<FlushReply>();
        std::thread::Builder::new()
            .name("hirelight-observe-flush".to_string())
            .spawn(move || {
                for reply in inbox {
                    let _ = reply.send(provider.force_flush());
                }
            })?;
        Ok(Self { requests })
    }

    fn request(&self) -> Option<mpsc::Receiver<OTelSdkResult>> {
        let (reply, rx) = mpsc::channel();
        self.requests.send(reply).ok().map(|()| rx)
    }
}

/// Owns one tracer provider and the exporters attached to it.
///
/// Most code uses the process-wide instance from [`crate::obs`]. Tests and
/// embedders can construct their own with [`ObservabilityClient::with_env`].
pub struct ObservabilityClient {
    env: Arc<dyn Env>,
    pipeline: OnceLock<Pipeline>,
}

impl Default for ObservabilityClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ObservabilityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservabilityClient")
            .field("initialized", &self.is_initialized())
            .field("exporters", &self.configured_exporters())
            .finish()
    }
}

impl ObservabilityClient {
    /// A client reading the process environment.
    pub fn new() -> Self {
        Self::with_env(ProcessEnv)
    }

    pub fn with_env(env: impl Env + 'static) -> Self {
        Self {
            env: Arc::new(env),
            pipeline: OnceLock::new(),
        }
    }

    /// Build the provider from `config`. Later calls return immediately.
    pub fn init(&self, config: ClientConfig) -> &Self {
        self.pipeline.get_or_init(|| self.build_pipeline(config, None));
        self
    }

    /// Like [`init`](Self::init) with caller-constructed exporters instead
    /// of names.
    pub fn init_with_exporters(
        &self,
        config: ClientConfig,
        exporters: Vec<Box<dyn Exporter>>,
    ) -> &Self {
        self.pipeline
            .get_or_init(|| self.build_pipeline(config, Some(exporters)));
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.pipeline.get().is_some()
    }

    fn pipeline(&self) -> &Pipeline {
        self.pipeline.get_or_init(|| {
            let config = ClientConfig::default().apply_env(self.env.as_ref());
            self.build_pipeline(config, None)
        })
    }

    fn build_pipeline(
        &self,
        config: ClientConfig,
        exporters: Option<Vec<Box<dyn Exporter>>>,
    ) -> Pipeline {
        let exporters = exporters.unwrap_or_else(|| self.resolve_exporters(&config));

        let mut builder = SdkTracerProvider::builder().with_resource(config.resource());
        let mut attached = Vec::with_capacity(exporters.len());
        for exporter in exporters {
            match exporter.create_span_processor() {
                Ok(processor) => {
                    builder = builder.with_span_processor(processor);
                    attached.push(exporter.name().to_string());
                }
                Err(e) => warn!(exporter = exporter.name(), error = %e, "failed to set up exporter"),
            }
        }
        if attached.is_empty() {
            warn!("no exporters attached, spans will not be exported");
        }

        let provider = builder.build();
        global::set_tracer_provider(provider.clone());
        let tracer = provider.tracer(TRACER_NAME);
        let flusher = Flusher::spawn(provider.clone())
            .inspect_err(|e| warn!(error = %e, "flush worker unavailable, flushing inline"))
            .ok();
        info!(
            app = %config.app_name,
            exporters = ?attached,
            "observability initialized"
        );

        Pipeline {
            provider,
            tracer,
            exporters: attached,
            flusher,
        }
    }

    fn resolve_exporters(&self, config: &ClientConfig) -> Vec<Box<dyn Exporter>> {
        let names = config
            .exporters
            .clone()
            .unwrap_or_else(|| exporters::detect_exporters(self.env.as_ref()));
        names
            .iter()
            .filter_map(|name| match exporters::get_exporter(name, self.env.as_ref()) {
                Ok(exporter) => Some(exporter),
                Err(e) => {
                    warn!(exporter = %name, error = %e, "failed to construct exporter");
                    None
                }
            })
            .collect()
    }

    fn configured_exporters(&self) -> Vec<String> {
        self.pipeline
            .get()
            .map(|p| p.exporters.clone())
            .unwrap_or_default()
    }

    /// The client's tracer, initialising with defaults if needed.
    pub fn tracer(&self) -> SdkTracer {
        self.pipeline().tracer.clone()
    }

    pub fn provider(&self) -> SdkTracerProvider {
        self.pipeline().provider.clone()
    }

    /// Start a span as a child of the thread's current context.
    pub(crate) fn start_observation(
        &self,
        name: String,
        kind: SpanKind,
        attributes: Vec<KeyValue>,
    ) -> Observation {
        let tracer = &self.pipeline().tracer;
        let parent = Context::current();
        let span = tracer
            .span_builder(name)
            .with_kind(kind)
            .with_attributes(attributes)
            .start_with_context(tracer, &parent);
        Observation::new(parent.with_span(span))
    }

    /// Start and attach a bare observation of `kind`.
    pub(crate) fn enter(
        &self,
        name: String,
        kind: ObservationKind,
        mut attributes: Vec<KeyValue>,
    ) -> RawGuard {
        if kind == ObservationKind::Generation {
            attributes.push(KeyValue::new(
                semconv::observation::TYPE,
                semconv::observation::GENERATION,
            ));
        }
        ObservationGuard::enter(self.start_observation(name, kind.span_kind(), attributes))
    }

    /// Open a root span. Nested traces become children of the active span.
    pub fn trace(&self, name: impl Into<String>) -> TraceBuilder<'_> {
        TraceBuilder {
            client: self,
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    /// Open a child span of the active span.
    pub fn span(&self, name: impl Into<String>) -> SpanBuilder<'_> {
        SpanBuilder {
            client: self,
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    /// Open a span marked as an LLM generation. An empty name becomes
    /// `generation`.
    pub fn generation(&self, name: impl Into<String>) -> GenerationBuilder<'_> {
        let name = name.into();
        GenerationBuilder {
            client: self,
            name: if name.is_empty() {
                "generation".to_string()
            } else {
                name
            },
            attributes: vec![KeyValue::new(
                semconv::observation::TYPE,
                semconv::observation::GENERATION,
            )],
        }
    }

    /// Add an event to the active span.
    pub fn event(&self, name: impl Into<String>) -> EventBuilder<'_> {
        EventBuilder {
            client: self,
            name: name.into(),
            level: EventLevel::Info,
            attributes: Vec::new(),
        }
    }

    /// Score the active span, or the whole trace with [`ScoreTarget::Trace`].
    pub fn score(
        &self,
        name: &str,
        value: impl Into<ScoreValue>,
        comment: Option<&str>,
        target: ScoreTarget,
    ) {
        self.pipeline();
        if let Some(obs) = Observation::current() {
            let event = obs.set_score(target, name, &value.into(), comment);
            obs.add_event(target.event_name(), event);
        }
    }

    /// Push buffered spans out, waiting at most `timeout`. Failures are
    /// logged, never returned.
    pub fn flush(&self, timeout: Duration) {
        if let Err(e) = self.try_flush(timeout) {
            warn!(error = %e, "flush failed");
        }
    }

    pub fn try_flush(&self, timeout: Duration) -> Result<()> {
        let pipeline = self.pipeline();
        let Some(rx) = pipeline.flusher.as_ref().and_then(Flusher::request) else {
            return pipeline
                .provider
                .force_flush()
                .map_err(|e| ObserveError::Flush(e.to_string()));
        };
        match rx.recv_timeout(timeout) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ObserveError::Flush(e.to_string())),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(ObserveError::FlushTimeout(timeout)),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(ObserveError::Flush("flush worker exited".to_string()))
            }
        }
    }

    /// Flush and stop every exporter. A client that was never initialised
    /// has nothing to shut down.
    pub fn shutdown(&self) -> Result<()> {
        let Some(pipeline) = self.pipeline.get() else {
            return Ok(());
        };
        debug!("shutting down tracer provider");
        pipeline
            .provider
            .shutdown()
            .map_err(|e| ObserveError::Shutdown(e.to_string()))
    }

    pub fn get_exporter_status(&self) -> ExporterStatus {
        let ready = exporters::check_exporter_availability(self.env.as_ref());
        ExporterStatus {
            configured: self.configured_exporters(),
            available: ready.keys().map(|name| name.to_string()).collect(),
            ready: ready
                .into_iter()
                .map(|(name, ok)| (name.to_string(), ok))
                .collect(),
        }
    }

    /// Function-level instrumentation bound to this client.
    pub fn observe(&self, name: impl Into<String>) -> Observe<'_> {
        Observe::new(self, name.into())
    }

    /// A `tracing` layer that sends spans through this client's exporters.
    pub fn tracing_layer<S>(&self) -> tracing_opentelemetry::OpenTelemetryLayer<S, SdkTracer>
    where
        S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
    {
        tracing_opentelemetry::layer().with_tracer(self.tracer())
    }
}

/// Which exporters are attached, registered, and fully configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExporterStatus {
    pub configured: Vec<String>,
    pub available: Vec<String>,
    pub ready: BTreeMap<String, bool>,
}

/// Keeps a span current for its lifetime and ends it on drop.
///
/// Dropping during a panic records the span as failed first.
#[must_use = "the span ends as soon as the guard is dropped"]
pub struct ObservationGuard<C: AsRef<Observation>> {
    context: C,
    _attached: ContextGuard,
}

impl<C: AsRef<Observation>> ObservationGuard<C> {
    fn enter(context: C) -> Self {
        let attached = context.as_ref().context().clone().attach();
        Self {
            context,
            _attached: attached,
        }
    }
}

impl<C: AsRef<Observation>> Deref for ObservationGuard<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.context
    }
}

impl<C: AsRef<Observation>> Drop for ObservationGuard<C> {
    fn drop(&mut self) {
        let obs = self.context.as_ref();
        if std::thread::panicking() {
            obs.mark_panicked();
        }
        obs.end();
    }
}

pub type TraceGuard = ObservationGuard<TraceContext>;
pub type SpanGuard = ObservationGuard<SpanContext>;
pub type GenerationGuard = ObservationGuard<GenerationContext>;
pub(crate) type RawGuard = ObservationGuard<Observation>;

fn push_json(attributes: &mut Vec<KeyValue>, key: String, value: serde_json::Value) {
    if let Some(value) = json_to_value(value) {
        attributes.push(KeyValue::new(key, value));
    }
}

fn metadata_key(key: &str) -> String {
    format!("{}.{key}", semconv::observation::METADATA_PREFIX)
}

/// Options for [`ObservabilityClient::trace`].
#[must_use]
pub struct TraceBuilder<'c> {
    client: &'c ObservabilityClient,
    name: String,
    attributes: Vec<KeyValue>,
}

impl<'c> TraceBuilder<'c> {
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.attributes
            .push(KeyValue::new(semconv::trace::USER_ID, user_id.into()));
        self
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.attributes
            .push(KeyValue::new(semconv::trace::SESSION_ID, session_id.into()));
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes
            .push(KeyValue::new(semconv::trace::TAGS, string_array(tags)));
        self
    }

    pub fn metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        push_json(&mut self.attributes, metadata_key(key), value.into());
        self
    }

    pub fn attribute(mut self, key: impl Into<Key>, value: impl Into<Value>) -> Self {
        self.attributes.push(KeyValue::new(key, value));
        self
    }

    pub fn start(self) -> TraceGuard {
        let obs = self
            .client
            .start_observation(self.name, SpanKind::Server, self.attributes);
        ObservationGuard::enter(TraceContext::new(obs))
    }

    /// Run `f` inside the trace, ending it when `f` returns or unwinds.
    pub fn run<R>(self, f: impl FnOnce(&TraceContext) -> R) -> R {
        let guard = self.start();
        f(&guard)
    }
}

/// Options for [`ObservabilityClient::span`].
#[must_use]
pub struct SpanBuilder<'c> {
    client: &'c ObservabilityClient,
    name: String,
    attributes: Vec<KeyValue>,
}

impl<'c> SpanBuilder<'c> {
    pub fn metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        push_json(&mut self.attributes, metadata_key(key), value.into());
        self
    }

    pub fn attribute(mut self, key: impl Into<Key>, value: impl Into<Value>) -> Self {
        self.attributes.push(KeyValue::new(key, value));
        self
    }

    pub fn start(self) -> SpanGuard {
        let obs = self
            .client
            .start_observation(self.name, SpanKind::Internal, self.attributes);
        ObservationGuard::enter(SpanContext::new(obs))
    }

    pub fn run<R>(self, f: impl FnOnce(&SpanContext) -> R) -> R {
        let guard = self.start();
        f(&guard)
    }
}

/// Options for [`ObservabilityClient::generation`].
#[must_use]
pub struct GenerationBuilder<'c> {
    client: &'c ObservabilityClient,
    name: String,
    attributes: Vec<KeyValue>,
}

impl<'c> GenerationBuilder<'c> {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.attributes
            .push(KeyValue::new(semconv::gen_ai::REQUEST_MODEL, model.into()));
        self
    }

    /// Provider or system identifier, e.g. `openai`.
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.attributes
            .push(KeyValue::new(semconv::gen_ai::SYSTEM, system.into()));
        self
    }

    pub fn metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        push_json(&mut self.attributes, metadata_key(key), value.into());
        self
    }

    pub fn attribute(mut self, key: impl Into<Key>, value: impl Into<Value>) -> Self {
        self.attributes.push(KeyValue::new(key, value));
        self
    }

    pub fn start(self) -> GenerationGuard {
        let obs = self
            .client
            .start_observation(self.name, SpanKind::Internal, self.attributes);
        ObservationGuard::enter(GenerationContext::new(obs))
    }

    pub fn run<R>(self, f: impl FnOnce(&GenerationContext) -> R) -> R {
        let guard = self.start();
        f(&guard)
    }
}

/// Options for [`ObservabilityClient::event`].
#[must_use]
pub struct EventBuilder<'c> {
    client: &'c ObservabilityClient,
    name: String,
    level: EventLevel,
    attributes: Vec<KeyValue>,
}

impl<'c> EventBuilder<'c> {
    pub fn level(mut self, level: EventLevel) -> Self {
        self.level = level;
        self
    }

    /// Event metadata is stored unprefixed alongside the level.
    pub fn metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        push_json(&mut self.attributes, key.to_string(), value.into());
        self
    }

    pub fn attribute(mut self, key: impl Into<Key>, value: impl Into<Value>) -> Self {
        self.attributes.push(KeyValue::new(key, value));
        self
    }

    /// Attach the event to the active span. Without one this does nothing.
    pub fn emit(self) {
        self.client.pipeline();
        let Some(obs) = Observation::current() else {
            debug!(event = %self.name, "no active span, event dropped");
            return;
        };
        let mut attributes = Vec::with_capacity(self.attributes.len() + 1);
        attributes.push(KeyValue::new("level", self.level.as_str()));
        attributes.extend(self.attributes);
        obs.add_event(self.name, attributes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryExporter, attr, event_attr};
    use std::collections::HashMap;

    fn client() -> (ObservabilityClient, MemoryExporter) {
        let exporter = MemoryExporter::default();
        let client = ObservabilityClient::with_env(HashMap::<String, String>::new());
        client.init_with_exporters(ClientConfig::new("test"), vec![Box::new(exporter.clone())]);
        (client, exporter)
    }

    #[test]
    fn init_is_idempotent() {
        let (client, _exporter) = client();
        client.init(ClientConfig::new("other").with_exporters(["console"]));
        assert!(client.is_initialized());
        assert_eq!(client.get_exporter_status().configured, ["memory"]);
    }

    #[test]
    fn trace_is_server_span_with_identity() {
        let (client, exporter) = client();
        client
            .trace("request")
            .user_id("u-1")
            .session_id("s-1")
            .tags(["api"])
            .metadata("route", "/score")
            .run(|cx| {
                cx.score("latency_ok", 1.0, None);
            });
        client.flush(Duration::from_secs(5));

        let spans = exporter.finished();
        assert_eq!(spans.len(), 1);
        let span = &spans[0];
        assert_eq!(span.span_kind, SpanKind::Server);
        assert_eq!(attr(span, "user.id").as_deref(), Some("u-1"));
        assert_eq!(attr(span, "metadata.route").as_deref(), Some("/score"));
        assert_eq!(attr(span, "trace_score.latency_ok.value").as_deref(), Some("1"));
    }

    #[test]
    fn span_nests_under_current_trace() {
        let (client, exporter) = client();
        {
            let _trace = client.trace("outer").start();
            let _span = client.span("inner").start();
        }
        client.flush(Duration::from_secs(5));

        let spans = exporter.finished();
        let outer = spans.iter().find(|s| s.name == "outer").unwrap();
        let inner = spans.iter().find(|s| s.name == "inner").unwrap();
        assert_eq!(inner.parent_span_id, outer.span_context.span_id());
        assert_eq!(inner.span_kind, SpanKind::Internal);
    }

    #[test]
    fn generation_defaults_name_and_marks_type() {
        let (client, exporter) = client();
        client.generation("").model("gpt-4o").system("openai").run(|g| {
            g.output("done");
        });
        client.flush(Duration::from_secs(5));

        let spans = exporter.finished();
        let span = &spans[0];
        assert_eq!(span.name, "generation");
        assert_eq!(attr(span, "observation.type").as_deref(), Some("generation"));
        assert_eq!(attr(span, "gen_ai.system").as_deref(), Some("openai"));
    }

    #[test]
    fn event_without_span_is_noop() {
        let (client, exporter) = client();
        client.event("orphan").emit();
        client.flush(Duration::from_secs(5));
        assert!(exporter.finished().is_empty());
    }

    #[test]
    fn event_carries_level_and_metadata() {
        let (client, exporter) = client();
        client.span("work").run(|_| {
            client
                .event("retry")
                .level(EventLevel::Warning)
                .metadata("attempt", 2)
                .emit();
        });
        client.flush(Duration::from_secs(5));

        let spans = exporter.finished();
        let event = &spans[0].events.events[0];
        assert_eq!(event.name, "retry");
        let level = event
            .attributes
            .iter()
            .find(|kv| kv.key.as_str() == "level")
            .map(|kv| kv.value.as_str().into_owned());
        assert_eq!(level.as_deref(), Some("warning"));
        assert!(event.attributes.iter().any(|kv| kv.key.as_str() == "attempt"));
    }

    #[test]
    fn client_score_targets_observation_by_default_prefix() {
        let (client, exporter) = client();
        client.span("work").run(|_| {
            client.score("accuracy", 0.75, Some("manual"), ScoreTarget::Observation);
        });
        client.flush(Duration::from_secs(5));

        let spans = exporter.finished();
        assert_eq!(attr(&spans[0], "score.accuracy.value").as_deref(), Some("0.75"));
        assert_eq!(attr(&spans[0], "score.accuracy.comment").as_deref(), Some("manual"));
    }

    #[test]
    fn client_score_events_are_named_after_target() {
        let (client, exporter) = client();
        client.span("work").run(|_| {
            client.score("accuracy", 0.75, None, ScoreTarget::Observation);
            client.score("helpful", "yes", Some("reviewer"), ScoreTarget::Trace);
        });
        client.flush(Duration::from_secs(5));

        let spans = exporter.finished();
        let span = &spans[0];
        let names: Vec<_> = span.events.events.iter().map(|e| e.name.as_ref()).collect();
        assert_eq!(names, ["observation_score", "trace_score"]);
        assert_eq!(event_attr(span, "observation_score", "value").as_deref(), Some("0.75"));
        assert_eq!(event_attr(span, "trace_score", "comment").as_deref(), Some("reviewer"));
        assert_eq!(event_attr(span, "trace_score", "level"), None);
        assert_eq!(attr(span, "trace_score.helpful.value").as_deref(), Some("yes"));
    }

    #[test]
    fn exporter_status_reports_readiness() {
        let env: HashMap<String, String> =
            [("DD_API_KEY".to_string(), "k".to_string())].into_iter().collect();
        let client = ObservabilityClient::with_env(env);
        let status = client.get_exporter_status();
        assert!(status.configured.is_empty());
        assert_eq!(status.available.len(), 6);
        assert_eq!(status.ready.get("datadog"), Some(&true));
        assert_eq!(status.ready.get("langfuse"), Some(&false));
    }

    #[test]
    fn repeated_flushes_reuse_the_worker() {
        let (client, exporter) = client();
        for round in 0..3 {
            client.span(format!("round-{round}")).run(|_| {});
            client.try_flush(Duration::from_secs(5)).unwrap();
            assert_eq!(exporter.finished().len(), round + 1);
        }
    }

    #[test]
    fn shutdown_without_init_is_ok() {
        let client = ObservabilityClient::with_env(HashMap::<String, String>::new());
        assert!(client.shutdown().is_ok());
        assert!(!client.is_initialized());
    }

    #[test]
    fn failing_exporter_is_skipped() {
        let client = ObservabilityClient::with_env(HashMap::<String, String>::new());
        client.init(ClientConfig::new("test").with_exporters(["langfuse", "nope", "console"]));
        assert_eq!(client.get_exporter_status().configured, ["console"]);
    }
}
