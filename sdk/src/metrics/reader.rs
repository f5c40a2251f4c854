//! The boundary between a [`MeterProvider`](super::MeterProvider)'s
//! collection pipeline and a reader's export strategy (§3 MetricReader, §6).

use super::data::MetricData;
use crate::error::SdkResult;
use std::fmt::Debug;
use std::sync::Weak;

/// The provider side of the reader/provider relationship: produces a fresh
/// snapshot of every instrument's current state on demand.
pub trait MetricProducer: Send + Sync + Debug {
    fn produce(&self) -> Vec<MetricData>;
}

/// A registered consumer of collected metric data.
///
/// A provider holds one or more readers; each is given a weak handle back to
/// the provider's producer so it can pull data without keeping the provider
/// alive on its own.
pub trait MetricReader: Send + Sync + Debug {
    /// Called once, by the provider, when the reader is registered.
    fn register_producer(&self, producer: Weak<dyn MetricProducer>);

    /// Collects current data by way of the registered producer, without
    /// necessarily exporting it. Readers may use this internally; it's also
    /// exposed for readers driven externally (e.g. a pull-based exporter).
    fn collect(&self) -> SdkResult<Vec<MetricData>>;

    fn force_flush(&self) -> SdkResult<()>;
    fn shutdown(&self) -> SdkResult<()>;
}
