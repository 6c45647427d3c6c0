use std::collections::HashMap;

use opentelemetry_sdk::trace::BatchSpanProcessor;

use super::{EnvVar, Exporter, http_processor, optional, require};
use crate::env::Env;
use crate::error::ExporterError;

pub(super) const NAME: &str = "honeycomb";

pub(super) const REQUIRED: &[EnvVar] =
    &[EnvVar::required("HONEYCOMB_API_KEY", "Honeycomb team key")];
pub(super) const OPTIONAL: &[EnvVar] = &[
    EnvVar::optional("HONEYCOMB_DATASET", "dataset", Some("llm-traces")),
    EnvVar::optional("HONEYCOMB_ENDPOINT", "endpoint", Some("https://api.honeycomb.io")),
];

#[derive(Debug, Clone)]
pub struct HoneycombExporter {
    api_key: String,
    dataset: String,
    endpoint: String,
}

impl HoneycombExporter {
    pub fn from_env(env: &dyn Env) -> Result<Self, ExporterError> {
        Ok(Self {
            api_key: require(env, NAME, &REQUIRED[0])?,
            dataset: optional(env, &OPTIONAL[0]).unwrap_or_default(),
            endpoint: optional(env, &OPTIONAL[1]).unwrap_or_default(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/v1/traces", self.endpoint.trim_end_matches('/'))
    }

    pub fn headers(&self) -> HashMap<String, String> {
        HashMap::from([
            ("x-honeycomb-team".to_string(), self.api_key.clone()),
            ("x-honeycomb-dataset".to_string(), self.dataset.clone()),
        ])
    }
}

impl Exporter for HoneycombExporter {
    fn name(&self) -> &str {
        NAME
    }

    fn create_span_processor(&self) -> Result<BatchSpanProcessor, ExporterError> {
        http_processor(NAME, &self.endpoint(), self.headers(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let env: HashMap<&str, &str> = [("HONEYCOMB_API_KEY", "team")].into_iter().collect();
        let exporter = HoneycombExporter::from_env(&env).unwrap();
        assert_eq!(exporter.endpoint(), "https://api.honeycomb.io/v1/traces");
        assert_eq!(exporter.headers()["x-honeycomb-dataset"], "llm-traces");
        assert_eq!(exporter.headers()["x-honeycomb-team"], "team");
    }
}
