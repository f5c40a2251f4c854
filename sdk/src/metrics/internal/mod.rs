//! Aggregator handles: per-attribute-set state for one metric point (§3
//! AggregatorHandle, §4.2 Aggregators).
//!
//! Per the design note on per-point concurrency (§9), every handle here uses
//! a short `std::sync::Mutex` around its accumulator rather than hand-rolled
//! atomics/CAS: simpler to get right, and held only across an add or a
//! collect-and-reset, never across an exporter call.

mod drop_aggregator;
mod histogram;
mod last_value;
mod sum;

pub use drop_aggregator::DropHandle;
pub use histogram::HistogramHandle;
pub use last_value::LastValueHandle;
pub use sum::SumHandle;

use crate::metrics::aggregation::Aggregation;
use crate::metrics::data::{MeasurementValue, MetricPoint};
use crate::metrics::exemplar::{ExemplarFilter, ExemplarReservoir, FixedSizeExemplarReservoir, HistogramBucketExemplarReservoir};
use otel_api::metrics::InstrumentValueType;
use otel_api::trace::SpanContext;
use otel_api::KeyValue;
use std::fmt::Debug;
use std::time::SystemTime;

const DEFAULT_EXEMPLAR_RESERVOIR_SIZE: usize = 4;

/// Per-attribute-set accumulator for one instrument.
///
/// `record` is safe to call concurrently with itself and with
/// `aggregate_then_maybe_reset`. The latter is the only place values are
/// observed or cleared, so it defines the one atomic "snapshot" boundary.
pub trait AggregatorHandle: Send + Sync + Debug {
    fn record(&self, value: MeasurementValue, timestamp: SystemTime, exemplar_attributes: &[KeyValue], span_context: Option<SpanContext>);

    /// Snapshots current state into a point for `[start, end]` with `attributes`;
    /// if `reset` is set, zeroes the accumulator afterward (DELTA temporality).
    /// Returns `None` when the aggregation produces no point this interval
    /// (Drop always; LastValue when nothing was recorded).
    fn aggregate_then_maybe_reset(&self, start: SystemTime, end: SystemTime, attributes: Vec<KeyValue>, reset: bool) -> Option<MetricPoint>;
}

/// Builds a fresh handle for `aggregation`, wired to the exemplar policy in effect.
pub fn new_handle(aggregation: &Aggregation, value_type: InstrumentValueType, exemplar_filter: ExemplarFilter) -> Box<dyn AggregatorHandle> {
    match aggregation {
        Aggregation::Sum { monotonic } => Box::new(SumHandle::with_value_type(
            *monotonic,
            value_type,
            exemplar_filter,
            Box::new(FixedSizeExemplarReservoir::new(DEFAULT_EXEMPLAR_RESERVOIR_SIZE)),
        )),
        Aggregation::LastValue => {
            Box::new(LastValueHandle::new(exemplar_filter, Box::new(FixedSizeExemplarReservoir::new(DEFAULT_EXEMPLAR_RESERVOIR_SIZE))))
        }
        Aggregation::ExplicitBucketHistogram { boundaries } => {
            let reservoir: Box<dyn ExemplarReservoir> = Box::new(HistogramBucketExemplarReservoir::new(boundaries.clone()));
            Box::new(HistogramHandle::new(boundaries.clone(), exemplar_filter, reservoir))
        }
        Aggregation::Drop | Aggregation::Default => Box::new(DropHandle),
    }
}
