//! Public API surface shared by instrumented application code and the SDK.
//!
//! This crate carries no exporter, no processor and no collection loop: it
//! only defines the types instrumented code reaches for (attributes, span
//! identity, instrument descriptors) and the handful of traits the SDK
//! implements. Keeping it dependency-light lets libraries depend on it
//! without pulling in an SDK implementation.

mod common;
mod internal_logging;

pub mod attributes;
pub mod context;

#[cfg(feature = "trace")]
pub mod trace;

#[cfg(feature = "metrics")]
pub mod metrics;

pub use common::{Array, Key, KeyValue, StringValue, Value};
