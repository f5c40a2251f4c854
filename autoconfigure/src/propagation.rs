//! Propagator resolution by name (§4.5 step 8, §6 `otel.propagators`).
//!
//! Wire formats (W3C TraceContext, Baggage) are referenced only by name
//! here (§1 Non-goals): a [`Propagator`] in this crate carries no
//! inject/extract codec, only the identity the SPI registry resolves
//! against and the build order composes into the final propagator set.

use std::fmt::Debug;

/// A context propagator, identified by the name it's registered under in
/// `otel.propagators`. Encode/decode behavior is out of scope (§1); this
/// crate only resolves names to instances and composes the resulting list.
pub trait Propagator: Send + Sync + Debug {
    fn name(&self) -> &'static str;
}

/// The W3C `traceparent`/`tracestate` propagator, resolved under the name
/// `tracecontext`.
#[derive(Clone, Copy, Debug, Default)]
pub struct W3cTraceContextPropagator;

impl Propagator for W3cTraceContextPropagator {
    fn name(&self) -> &'static str {
        "tracecontext"
    }
}

/// The W3C Baggage propagator, resolved under the name `baggage`.
#[derive(Clone, Copy, Debug, Default)]
pub struct W3cBaggagePropagator;

impl Propagator for W3cBaggagePropagator {
    fn name(&self) -> &'static str {
        "baggage"
    }
}
