use std::collections::HashMap;

use opentelemetry_sdk::trace::BatchSpanProcessor;

use super::{EnvVar, Exporter, http_processor, optional, require};
use crate::env::Env;
use crate::error::ExporterError;

pub(super) const NAME: &str = "newrelic";

pub(super) const REQUIRED: &[EnvVar] =
    &[EnvVar::required("NEW_RELIC_API_KEY", "New Relic API key")];
pub(super) const OPTIONAL: &[EnvVar] =
    &[EnvVar::optional("NEW_RELIC_REGION", "US or EU", Some("US"))];

const US_ENDPOINT: &str = "https://otlp.nr-data.net/v1/traces";
const EU_ENDPOINT: &str = "https://otlp.eu01.nr-data.net/v1/traces";

#[derive(Debug, Clone)]
pub struct NewRelicExporter {
    api_key: String,
    region: String,
}

impl NewRelicExporter {
    pub fn from_env(env: &dyn Env) -> Result<Self, ExporterError> {
        Ok(Self {
            api_key: require(env, NAME, &REQUIRED[0])?,
            region: optional(env, &OPTIONAL[0]).unwrap_or_default(),
        })
    }

    pub fn endpoint(&self) -> &'static str {
        if self.region == "EU" {
            EU_ENDPOINT
        } else {
            US_ENDPOINT
        }
    }

    pub fn headers(&self) -> HashMap<String, String> {
        HashMap::from([("api-key".to_string(), self.api_key.clone())])
    }
}

impl Exporter for NewRelicExporter {
    fn name(&self) -> &str {
        NAME
    }

    fn create_span_processor(&self) -> Result<BatchSpanProcessor, ExporterError> {
        http_processor(NAME, self.endpoint(), self.headers(), None)
    }
}
