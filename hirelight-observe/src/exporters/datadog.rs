use std::collections::HashMap;

use opentelemetry_sdk::trace::BatchSpanProcessor;

use super::{EnvVar, Exporter, http_processor, optional, require};
use crate::env::Env;
use crate::error::ExporterError;

pub(super) const NAME: &str = "datadog";

pub(super) const REQUIRED: &[EnvVar] = &[EnvVar::required("DD_API_KEY", "Datadog API key")];
pub(super) const OPTIONAL: &[EnvVar] =
    &[EnvVar::optional("DD_SITE", "Datadog site", Some("datadoghq.com"))];

/// Datadog APM intake over OTLP/HTTP.
#[derive(Debug, Clone)]
pub struct DatadogExporter {
    api_key: String,
    site: String,
}

impl DatadogExporter {
    pub fn from_env(env: &dyn Env) -> Result<Self, ExporterError> {
        Ok(Self {
            api_key: require(env, NAME, &REQUIRED[0])?,
            site: optional(env, &OPTIONAL[0]).unwrap_or_default(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("https://api.{}/v0.3/traces", self.site)
    }

    pub fn headers(&self) -> HashMap<String, String> {
        HashMap::from([("DD-API-KEY".to_string(), self.api_key.clone())])
    }
}

impl Exporter for DatadogExporter {
    fn name(&self) -> &str {
        NAME
    }

    fn create_span_processor(&self) -> Result<BatchSpanProcessor, ExporterError> {
        http_processor(NAME, &self.endpoint(), self.headers(), None)
    }
}
