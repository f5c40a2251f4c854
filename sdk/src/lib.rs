//! The SDK core: batched, bounded-queue span export; synchronous/asynchronous
//! metric instruments with view-driven aggregation; and a minimal resource
//! model. Wire-format exporters, context propagators and the autoconfigure
//! assembly built on top of this crate live in sibling crates.

pub mod error;
pub mod resource;
pub mod scope;

#[cfg(feature = "trace")]
pub mod export;

#[cfg(feature = "trace")]
pub mod trace;

#[cfg(feature = "metrics")]
pub mod metrics;

pub mod testing;

pub use error::SdkError;
