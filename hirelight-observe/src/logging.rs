//! Process logging setup.

use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt};

use crate::client::ObservabilityClient;
use crate::env::{Env, ProcessEnv};
use crate::error::Result;

const DEFAULT_LEVEL: &str = "info";

/// Output format for the fmt layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Filter from `RUST_LOG`, else `LOG_LEVEL`, else `info`.
///
/// `LOG_LEVEL` accepts the common spellings `WARNING` and `CRITICAL`.
pub fn default_filter(env: &dyn Env) -> EnvFilter {
    if let Some(filter) = env
        .value(EnvFilter::DEFAULT_ENV)
        .and_then(|directives| EnvFilter::try_new(directives).ok())
    {
        return filter;
    }
    let level = env
        .value("LOG_LEVEL")
        .map(|level| level_directive(&level))
        .unwrap_or(DEFAULT_LEVEL);
    EnvFilter::new(level)
}

fn level_directive(level: &str) -> &'static str {
    match level.to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" | "critical" | "fatal" => "error",
        "off" => "off",
        _ => DEFAULT_LEVEL,
    }
}

/// Install the global subscriber.
///
/// With a client, `tracing` spans are also exported through its tracer.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been set.
pub fn init_logging(format: LogFormat, client: Option<&ObservabilityClient>) -> Result<()> {
    let (pretty, json) = match format {
        LogFormat::Pretty => (Some(fmt::layer()), None),
        LogFormat::Json => (None, Some(fmt::layer().json())),
    };
    let otel = client.map(ObservabilityClient::tracing_layer);

    Registry::default()
        .with(default_filter(&ProcessEnv))
        .with(pretty)
        .with(json)
        .with(otel)
        .try_init()?;
    Ok(())
}
