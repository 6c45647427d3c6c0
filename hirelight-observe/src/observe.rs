//! Function-level instrumentation.
//!
//! ```no_run
//! use hirelight_observe::{ObservationKind, obs};
//!
//! let rank = obs()
//!     .observe("rank_candidates")
//!     .as_type(ObservationKind::Generation)
//!     .wrap(|ids: Vec<u32>| -> Result<usize, std::io::Error> { Ok(ids.len()) });
//!
//! let ranked = rank(vec![1, 2, 3]);
//! ```

use std::fmt::{Debug, Display};

use opentelemetry::{Key, KeyValue, Value};
use serde::Serialize;

use crate::client::ObservabilityClient;
use crate::semconv::observation;
use crate::types::ObservationKind;
use crate::value::{capture, short_type_name};

/// Wraps a fallible function in an observation.
///
/// When the client has not been initialised the wrapped function runs
/// untouched. Otherwise the input and output are captured as JSON (falling
/// back to `Debug`), errors are recorded and returned unchanged, and panics
/// unwind through with the span marked failed.
#[derive(Clone)]
#[must_use]
pub struct Observe<'c> {
    client: &'c ObservabilityClient,
    name: String,
    kind: ObservationKind,
    capture_input: bool,
    capture_output: bool,
    attributes: Vec<KeyValue>,
}

impl<'c> Observe<'c> {
    pub(crate) fn new(client: &'c ObservabilityClient, name: String) -> Self {
        Self {
            client,
            name,
            kind: ObservationKind::Span,
            capture_input: true,
            capture_output: true,
            attributes: Vec::new(),
        }
    }

    pub fn as_type(mut self, kind: ObservationKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn capture_input(mut self, capture: bool) -> Self {
        self.capture_input = capture;
        self
    }

    pub fn capture_output(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }

    pub fn attribute(mut self, key: impl Into<Key>, value: impl Into<Value>) -> Self {
        self.attributes.push(KeyValue::new(key, value));
        self
    }

    /// Run `f` once under this observation.
    pub fn call<A, T, E, F>(&self, input: A, f: F) -> Result<T, E>
    where
        A: Serialize + Debug,
        T: Serialize + Debug,
        E: Display,
        F: FnOnce(A) -> Result<T, E>,
    {
        if !self.client.is_initialized() {
            return f(input);
        }

        let guard = self
            .client
            .enter(self.name.clone(), self.kind, self.attributes.clone());
        if self.capture_input {
            // `()` and `None` mean there were no arguments to record.
            let captured = capture(&input);
            if captured != "null" {
                guard.set(KeyValue::new(observation::CAPTURED_INPUT, captured));
            }
        }

        let result = f(input);
        match &result {
            Ok(output) if self.capture_output => {
                guard.set(KeyValue::new(observation::CAPTURED_OUTPUT, capture(output)));
            }
            Ok(_) => {}
            Err(e) => guard.record_failure(short_type_name::<E>(), &e.to_string()),
        }
        result
    }

    /// Turn `f` into an instrumented function with the same signature.
    pub fn wrap<A, T, E, F>(self, f: F) -> impl Fn(A) -> Result<T, E>
    where
        A: Serialize + Debug,
        T: Serialize + Debug,
        E: Display,
        F: Fn(A) -> Result<T, E>,
    {
        move |input| self.call(input, &f)
    }
}
