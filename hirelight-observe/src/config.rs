//! Client configuration.

use std::path::Path;

use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;
use serde::{Deserialize, Serialize};

use crate::env::{Env, ProcessEnv};
use crate::error::{ObserveError, Result};
use crate::semconv;

pub const DEFAULT_APP_NAME: &str = "observability";
pub const DEFAULT_ENVIRONMENT: &str = "production";
pub const DEFAULT_VERSION: &str = "unknown";

/// Settings used to build the tracer provider.
///
/// ```toml
/// app_name = "hirelight-api"
/// environment = "staging"
/// version = "1.0.0"
/// exporters = ["langfuse", "console"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub app_name: String,
    pub environment: Option<String>,
    pub version: Option<String>,
    /// Explicit exporter names. `None` means auto-detect.
    pub exporters: Option<Vec<String>>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            environment: None,
            version: None,
            exporters: None,
        }
    }
}

impl ClientConfig {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            ..Self::default()
        }
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_exporters<I, S>(mut self, exporters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exporters = Some(exporters.into_iter().map(Into::into).collect());
        self
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ObserveError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Defaults overlaid with `OBSERVABILITY_*` variables from the process.
    pub fn from_env() -> Self {
        Self::default().apply_env(&ProcessEnv)
    }

    /// Override fields from `OBSERVABILITY_APP_NAME`,
    /// `OBSERVABILITY_ENVIRONMENT` and `OBSERVABILITY_VERSION`.
    pub fn apply_env(mut self, env: &dyn Env) -> Self {
        if let Some(name) = env.value("OBSERVABILITY_APP_NAME") {
            self.app_name = name;
        }
        if let Some(environment) = env.value("OBSERVABILITY_ENVIRONMENT") {
            self.environment = Some(environment);
        }
        if let Some(version) = env.value("OBSERVABILITY_VERSION") {
            self.version = Some(version);
        }
        self
    }

    pub(crate) fn resource(&self) -> Resource {
        Resource::builder()
            .with_service_name(self.app_name.clone())
            .with_attributes([
                KeyValue::new(
                    semconv::resource::DEPLOYMENT_ENVIRONMENT,
                    self.environment
                        .clone()
                        .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
                ),
                KeyValue::new(
                    semconv::resource::SERVICE_VERSION,
                    self.version
                        .clone()
                        .unwrap_or_else(|| DEFAULT_VERSION.to_string()),
                ),
            ])
            .build()
    }
}
