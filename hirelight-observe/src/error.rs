//! Error types for the observability client.

use std::time::Duration;

use thiserror::Error;

/// Failure to look up or construct an exporter.
#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("exporter not found: {0}")]
    NotFound(String),

    #[error("{exporter} exporter requires {var} ({description})")]
    MissingEnv {
        exporter: String,
        var: String,
        description: String,
    },

    #[error("failed to build {exporter} exporter: {source}")]
    Build {
        exporter: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ExporterError {
    pub(crate) fn build(
        exporter: &str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Build {
            exporter: exporter.to_string(),
            source: source.into(),
        }
    }
}

/// Errors surfaced by the client, its configuration, and its logging setup.
#[derive(Debug, Error)]
pub enum ObserveError {
    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("flush failed: {0}")]
    Flush(String),

    #[error("flush did not complete within {0:?}")]
    FlushTimeout(Duration),

    #[error("shutdown failed: {0}")]
    Shutdown(String),

    #[error("failed to install global subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing_subscriber::util::TryInitError),
}

pub type Result<T> = std::result::Result<T, ObserveError>;
