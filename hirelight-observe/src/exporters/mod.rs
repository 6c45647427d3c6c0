//! Named tracing backends.
//!
//! Each exporter validates its environment when constructed and produces a
//! batching span processor on demand. The registry is fixed; selection
//! happens in [`detect_exporters`] unless the caller names exporters
//! explicitly.

mod console;
mod datadog;
mod honeycomb;
mod langfuse;
mod newrelic;
mod otlp;

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::trace::BatchSpanProcessor;
use serde::Serialize;
use tracing::debug;

use crate::env::Env;
use crate::error::ExporterError;

pub use console::ConsoleExporter;
pub use datadog::DatadogExporter;
pub use honeycomb::HoneycombExporter;
pub use langfuse::LangfuseExporter;
pub use newrelic::NewRelicExporter;
pub use otlp::{OtlpExporter, OtlpProtocol};

/// Comma-separated exporter names that bypass auto-detection.
pub const EXPORTERS_ENV: &str = "OBSERVABILITY_EXPORTERS";

/// A configured backend that can attach itself to a tracer provider.
pub trait Exporter: Send + Sync {
    fn name(&self) -> &str;

    /// Build the exporter and wrap it in a batching processor.
    fn create_span_processor(&self) -> Result<BatchSpanProcessor, ExporterError>;
}

/// An environment variable an exporter reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnvVar {
    pub name: &'static str,
    pub description: &'static str,
    pub default: Option<&'static str>,
}

impl EnvVar {
    pub(crate) const fn required(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            default: None,
        }
    }

    pub(crate) const fn optional(
        name: &'static str,
        description: &'static str,
        default: Option<&'static str>,
    ) -> Self {
        Self {
            name,
            description,
            default,
        }
    }
}

/// Variables declared by one exporter.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ExporterInfo {
    pub required: &'static [EnvVar],
    pub optional: &'static [EnvVar],
}

type BuildFn = fn(&dyn Env) -> Result<Box<dyn Exporter>, ExporterError>;

struct Registration {
    name: &'static str,
    info: ExporterInfo,
    build: BuildFn,
}

impl Registration {
    fn is_available(&self, env: &dyn Env) -> bool {
        self.info.required.iter().all(|var| env.is_set(var.name))
    }
}

fn boxed<E: Exporter + 'static>(
    result: Result<E, ExporterError>,
) -> Result<Box<dyn Exporter>, ExporterError> {
    result.map(|e| Box::new(e) as Box<dyn Exporter>)
}

static REGISTRY: &[Registration] = &[
    Registration {
        name: console::NAME,
        info: ExporterInfo {
            required: &[],
            optional: &[],
        },
        build: |_| Ok(Box::new(ConsoleExporter)),
    },
    Registration {
        name: datadog::NAME,
        info: ExporterInfo {
            required: datadog::REQUIRED,
            optional: datadog::OPTIONAL,
        },
        build: |env| boxed(DatadogExporter::from_env(env)),
    },
    Registration {
        name: honeycomb::NAME,
        info: ExporterInfo {
            required: honeycomb::REQUIRED,
            optional: honeycomb::OPTIONAL,
        },
        build: |env| boxed(HoneycombExporter::from_env(env)),
    },
    Registration {
        name: langfuse::NAME,
        info: ExporterInfo {
            required: langfuse::REQUIRED,
            optional: langfuse::OPTIONAL,
        },
        build: |env| boxed(LangfuseExporter::from_env(env)),
    },
    Registration {
        name: otlp::NAME,
        info: ExporterInfo {
            required: otlp::REQUIRED,
            optional: otlp::OPTIONAL,
        },
        build: |env| boxed(OtlpExporter::from_env(env)),
    },
    Registration {
        name: newrelic::NAME,
        info: ExporterInfo {
            required: newrelic::REQUIRED,
            optional: newrelic::OPTIONAL,
        },
        build: |env| boxed(NewRelicExporter::from_env(env)),
    },
];

/// Registered exporter names in registry order.
pub fn exporter_names() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|r| r.name)
}

/// Construct the named exporter from `env`.
pub fn get_exporter(name: &str, env: &dyn Env) -> Result<Box<dyn Exporter>, ExporterError> {
    let registration = REGISTRY
        .iter()
        .find(|r| r.name == name)
        .ok_or_else(|| ExporterError::NotFound(name.to_string()))?;
    (registration.build)(env)
}

/// Which exporters have every required variable set. Constructs nothing.
pub fn check_exporter_availability(env: &dyn Env) -> BTreeMap<&'static str, bool> {
    REGISTRY
        .iter()
        .map(|r| (r.name, r.is_available(env)))
        .collect()
}

pub fn exporter_info() -> BTreeMap<&'static str, ExporterInfo> {
    REGISTRY.iter().map(|r| (r.name, r.info)).collect()
}

/// Pick exporters: the explicit override, else every configured hosted
/// backend, else `console`.
pub fn detect_exporters(env: &dyn Env) -> Vec<String> {
    if let Some(raw) = env.value(EXPORTERS_ENV) {
        let names: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if !names.is_empty() {
            debug!(?names, "exporters selected by {EXPORTERS_ENV}");
            return names;
        }
    }

    let detected: Vec<String> = REGISTRY
        .iter()
        .filter(|r| r.name != console::NAME && r.is_available(env))
        .map(|r| r.name.to_string())
        .collect();
    if detected.is_empty() {
        debug!("no exporter credentials found, falling back to console");
        vec![console::NAME.to_string()]
    } else {
        debug!(names = ?detected, "exporters detected from environment");
        detected
    }
}

pub(crate) fn require(
    env: &dyn Env,
    exporter: &str,
    var: &EnvVar,
) -> Result<String, ExporterError> {
    env.value(var.name).ok_or_else(|| ExporterError::MissingEnv {
        exporter: exporter.to_string(),
        var: var.name.to_string(),
        description: var.description.to_string(),
    })
}

pub(crate) fn optional(env: &dyn Env, var: &EnvVar) -> Option<String> {
    env.value(var.name)
        .or_else(|| var.default.map(str::to_string))
}

/// OTLP over HTTP/protobuf, batched.
pub(crate) fn http_processor(
    exporter: &str,
    endpoint: &str,
    headers: HashMap<String, String>,
    timeout: Option<Duration>,
) -> Result<BatchSpanProcessor, ExporterError> {
    let mut builder = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .with_headers(headers);
    if let Some(timeout) = timeout {
        builder = builder.with_timeout(timeout);
    }
    let span_exporter = builder
        .build()
        .map_err(|e| ExporterError::build(exporter, e))?;
    Ok(BatchSpanProcessor::builder(span_exporter).build())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&'static str, &'static str)]) -> HashMap<&'static str, &'static str> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn registry_order_is_stable() {
        let names: Vec<_> = exporter_names().collect();
        assert_eq!(
            names,
            ["console", "datadog", "honeycomb", "langfuse", "otlp", "newrelic"]
        );
    }

    #[test]
    fn availability_requires_full_set() {
        let status = check_exporter_availability(&env(&[("LANGFUSE_PUBLIC_KEY", "pk")]));
        assert!(status["console"]);
        assert!(!status["langfuse"]);
        assert!(!status["datadog"]);

        let status = check_exporter_availability(&env(&[
            ("LANGFUSE_PUBLIC_KEY", "pk"),
            ("LANGFUSE_SECRET_KEY", "sk"),
        ]));
        assert!(status["langfuse"]);
    }

    #[test]
    fn empty_values_do_not_count() {
        let status = check_exporter_availability(&env(&[("DD_API_KEY", "")]));
        assert!(!status["datadog"]);
    }

    #[test]
    fn unknown_exporter_is_not_found() {
        let err = get_exporter("zipkin", &env(&[])).err().unwrap();
        assert!(matches!(err, ExporterError::NotFound(name) if name == "zipkin"));
    }

    #[test]
    fn missing_credentials_fail_construction() {
        let err = get_exporter("newrelic", &env(&[])).err().unwrap();
        assert!(matches!(
            err,
            ExporterError::MissingEnv { ref var, .. } if var == "NEW_RELIC_API_KEY"
        ));
    }

    #[test]
    fn get_exporter_returns_named_instance() {
        let exporter = get_exporter("console", &env(&[])).unwrap();
        assert_eq!(exporter.name(), "console");
        let exporter = get_exporter("datadog", &env(&[("DD_API_KEY", "k")])).unwrap();
        assert_eq!(exporter.name(), "datadog");
    }

    #[test]
    fn detect_defaults_to_console() {
        assert_eq!(detect_exporters(&env(&[])), ["console"]);
    }

    #[test]
    fn detect_fans_out_to_every_configured_backend() {
        let detected = detect_exporters(&env(&[
            ("DD_API_KEY", "k"),
            ("HONEYCOMB_API_KEY", "h"),
        ]));
        assert_eq!(detected, ["datadog", "honeycomb"]);
    }

    #[test]
    fn override_wins_over_credentials() {
        let detected = detect_exporters(&env(&[
            (EXPORTERS_ENV, "console"),
            ("DD_API_KEY", "k"),
        ]));
        assert_eq!(detected, ["console"]);
    }

    #[test]
    fn override_list_is_trimmed() {
        let detected = detect_exporters(&env(&[(EXPORTERS_ENV, " langfuse , console ,")]));
        assert_eq!(detected, ["langfuse", "console"]);
    }

    #[test]
    fn info_lists_required_and_optional() {
        let info = exporter_info();
        let langfuse = info["langfuse"];
        let required: Vec<_> = langfuse.required.iter().map(|v| v.name).collect();
        assert_eq!(required, ["LANGFUSE_PUBLIC_KEY", "LANGFUSE_SECRET_KEY"]);
        let region = langfuse
            .optional
            .iter()
            .find(|v| v.name == "LANGFUSE_REGION")
            .unwrap();
        assert_eq!(region.default, Some("EU"));
        assert!(info["console"].required.is_empty());
    }
}
