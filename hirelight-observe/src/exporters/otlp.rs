use std::collections::HashMap;

use opentelemetry_otlp::{WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::trace::BatchSpanProcessor;
use tonic::metadata::{Ascii, MetadataKey, MetadataMap, MetadataValue};

use super::{EnvVar, Exporter, http_processor, optional, require};
use crate::env::Env;
use crate::error::ExporterError;

pub(super) const NAME: &str = "otlp";

pub(super) const REQUIRED: &[EnvVar] =
    &[EnvVar::required("OTEL_EXPORTER_OTLP_ENDPOINT", "OTLP endpoint URL")];
pub(super) const OPTIONAL: &[EnvVar] = &[
    EnvVar::optional("OTEL_EXPORTER_OTLP_HEADERS", "key=value,...", None),
    EnvVar::optional("OTEL_EXPORTER_OTLP_PROTOCOL", "http|grpc", Some("http")),
    EnvVar::optional("OTEL_EXPORTER_OTLP_INSECURE", "bool", Some("false")),
];

const TRACES_PATH: &str = "/v1/traces";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtlpProtocol {
    Http,
    Grpc,
}

/// Any OTLP-compatible collector.
///
/// gRPC export runs on tonic and must be initialised from inside a Tokio
/// runtime.
#[derive(Debug, Clone)]
pub struct OtlpExporter {
    endpoint: String,
    headers: HashMap<String, String>,
    protocol: OtlpProtocol,
    insecure: bool,
}

impl OtlpExporter {
    pub fn from_env(env: &dyn Env) -> Result<Self, ExporterError> {
        let endpoint = require(env, NAME, &REQUIRED[0])?;
        let protocol = match optional(env, &OPTIONAL[1]) {
            Some(p) if p.eq_ignore_ascii_case("grpc") => OtlpProtocol::Grpc,
            _ => OtlpProtocol::Http,
        };
        Ok(Self {
            endpoint,
            headers: env.dict(OPTIONAL[0].name),
            protocol,
            insecure: env.flag(OPTIONAL[2].name),
        })
    }

    pub fn protocol(&self) -> OtlpProtocol {
        self.protocol
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Endpoint as handed to the transport.
    ///
    /// HTTP appends the traces path when missing. gRPC swaps the HTTP port
    /// 4318 for 4317 and picks the scheme from the insecure flag.
    pub fn endpoint(&self) -> String {
        match self.protocol {
            OtlpProtocol::Http => {
                let base = self.endpoint.trim_end_matches('/');
                if base.ends_with(TRACES_PATH) {
                    base.to_string()
                } else {
                    format!("{base}{TRACES_PATH}")
                }
            }
            OtlpProtocol::Grpc => {
                let authority = self
                    .endpoint
                    .trim_start_matches("http://")
                    .trim_start_matches("https://")
                    .replace(":4318", ":4317");
                let scheme = if self.insecure { "http" } else { "https" };
                format!("{scheme}://{authority}")
            }
        }
    }

    fn metadata(&self) -> Result<MetadataMap, ExporterError> {
        let mut metadata = MetadataMap::with_capacity(self.headers.len());
        for (key, value) in &self.headers {
            let key = MetadataKey::<Ascii>::from_bytes(key.to_ascii_lowercase().as_bytes())
                .map_err(|e| ExporterError::build(NAME, e))?;
            let value = MetadataValue::<Ascii>::try_from(value.as_str())
                .map_err(|e| ExporterError::build(NAME, e))?;
            metadata.insert(key, value);
        }
        Ok(metadata)
    }
}

impl Exporter for OtlpExporter {
    fn name(&self) -> &str {
        NAME
    }

    fn create_span_processor(&self) -> Result<BatchSpanProcessor, ExporterError> {
        match self.protocol {
            OtlpProtocol::Http => http_processor(NAME, &self.endpoint(), self.headers.clone(), None),
            OtlpProtocol::Grpc => {
                let span_exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_tonic()
                    .with_endpoint(self.endpoint())
                    .with_metadata(self.metadata()?)
                    .build()
                    .map_err(|e| ExporterError::build(NAME, e))?;
                Ok(BatchSpanProcessor::builder(span_exporter).build())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exporter(pairs: &[(&'static str, &'static str)]) -> OtlpExporter {
        let env: HashMap<&str, &str> = pairs.iter().copied().collect();
        OtlpExporter::from_env(&env).unwrap()
    }

    #[test]
    fn http_appends_traces_path_once() {
        let e = exporter(&[("OTEL_EXPORTER_OTLP_ENDPOINT", "http://collector:4318")]);
        assert_eq!(e.protocol(), OtlpProtocol::Http);
        assert_eq!(e.endpoint(), "http://collector:4318/v1/traces");

        let e = exporter(&[("OTEL_EXPORTER_OTLP_ENDPOINT", "http://collector:4318/v1/traces")]);
        assert_eq!(e.endpoint(), "http://collector:4318/v1/traces");
    }

    #[test]
    fn grpc_rewrites_port_and_scheme() {
        let e = exporter(&[
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "https://collector:4318"),
            ("OTEL_EXPORTER_OTLP_PROTOCOL", "GRPC"),
            ("OTEL_EXPORTER_OTLP_INSECURE", "true"),
        ]);
        assert_eq!(e.protocol(), OtlpProtocol::Grpc);
        assert_eq!(e.endpoint(), "http://collector:4317");
    }

    #[test]
    fn headers_are_parsed() {
        let e = exporter(&[
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://c"),
            ("OTEL_EXPORTER_OTLP_HEADERS", "x-team=a,authorization=Bearer t"),
        ]);
        assert_eq!(e.headers()["x-team"], "a");
        assert_eq!(e.headers()["authorization"], "Bearer t");
        assert_eq!(e.metadata().unwrap().len(), 2);
    }

    #[test]
    fn invalid_metadata_key_fails_build() {
        let e = exporter(&[
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://c"),
            ("OTEL_EXPORTER_OTLP_HEADERS", "bad key=v"),
        ]);
        assert!(matches!(e.metadata(), Err(ExporterError::Build { .. })));
    }
}
