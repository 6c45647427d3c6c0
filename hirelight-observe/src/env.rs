//! Environment access.
//!
//! Exporters and configuration read variables through [`Env`] so tests can
//! supply a map instead of mutating the process environment.

use std::collections::HashMap;

/// A source of environment variables.
pub trait Env: Send + Sync {
    /// Raw lookup.
    fn var(&self, key: &str) -> Option<String>;

    /// Value if set and non-empty after trimming.
    fn value(&self, key: &str) -> Option<String> {
        self.var(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn is_set(&self, key: &str) -> bool {
        self.value(key).is_some()
    }

    /// `true`, `1`, `yes`, `on` (any case) are true; anything else is false.
    fn flag(&self, key: &str) -> bool {
        self.value(key).is_some_and(|v| {
            matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
        })
    }

    /// Comma-separated `k=v` pairs. Entries without `=` are skipped.
    fn dict(&self, key: &str) -> HashMap<String, String> {
        self.value(key)
            .map(|raw| parse_dict(&raw))
            .unwrap_or_default()
    }
}

fn parse_dict(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            let k = k.trim();
            (!k.is_empty()).then(|| (k.to_string(), v.trim().to_string()))
        })
        .collect()
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Env for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl Env for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl Env for HashMap<&'static str, &'static str> {
    fn var(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).map(|v| (*v).to_string())
    }
}
