use std::collections::HashMap;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use opentelemetry_sdk::trace::BatchSpanProcessor;

use super::{EnvVar, Exporter, http_processor, optional, require};
use crate::env::Env;
use crate::error::ExporterError;

pub(super) const NAME: &str = "langfuse";

pub(super) const REQUIRED: &[EnvVar] = &[
    EnvVar::required("LANGFUSE_PUBLIC_KEY", "public key"),
    EnvVar::required("LANGFUSE_SECRET_KEY", "secret key"),
];
pub(super) const OPTIONAL: &[EnvVar] = &[
    EnvVar::optional("LANGFUSE_HOST", "custom host", None),
    EnvVar::optional("LANGFUSE_REGION", "US or EU", Some("EU")),
];

const OTEL_PATH: &str = "/api/public/otel/v1/traces";
const EXPORT_TIMEOUT: Duration = Duration::from_secs(10);

/// Langfuse OTLP ingestion, authenticated with the project key pair.
#[derive(Debug, Clone)]
pub struct LangfuseExporter {
    public_key: String,
    secret_key: String,
    host: Option<String>,
    region: String,
}

impl LangfuseExporter {
    pub fn from_env(env: &dyn Env) -> Result<Self, ExporterError> {
        Ok(Self {
            public_key: require(env, NAME, &REQUIRED[0])?,
            secret_key: require(env, NAME, &REQUIRED[1])?,
            host: optional(env, &OPTIONAL[0]),
            region: optional(env, &OPTIONAL[1]).unwrap_or_default(),
        })
    }

    pub fn endpoint(&self) -> String {
        match (&self.host, self.region.as_str()) {
            (Some(host), _) => format!("{}{OTEL_PATH}", host.trim_end_matches('/')),
            (None, "US") => format!("https://us.cloud.langfuse.com{OTEL_PATH}"),
            (None, _) => format!("https://cloud.langfuse.com{OTEL_PATH}"),
        }
    }

    pub fn headers(&self) -> HashMap<String, String> {
        let token = STANDARD.encode(format!("{}:{}", self.public_key, self.secret_key));
        HashMap::from([("authorization".to_string(), format!("Basic {token}"))])
    }
}

impl Exporter for LangfuseExporter {
    fn name(&self) -> &str {
        NAME
    }

    fn create_span_processor(&self) -> Result<BatchSpanProcessor, ExporterError> {
        http_processor(NAME, &self.endpoint(), self.headers(), Some(EXPORT_TIMEOUT))
    }
}
