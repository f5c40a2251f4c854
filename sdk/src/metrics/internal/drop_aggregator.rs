use super::AggregatorHandle;
use crate::metrics::data::{MeasurementValue, MetricPoint};
use otel_api::trace::SpanContext;
use otel_api::KeyValue;
use std::time::SystemTime;

/// Accepts every measurement and produces no point; used when no aggregation
/// is compatible with an instrument's type (§4.2 "otherwise Drop").
#[derive(Debug, Default)]
pub struct DropHandle;

impl AggregatorHandle for DropHandle {
    fn record(&self, _value: MeasurementValue, _timestamp: SystemTime, _exemplar_attributes: &[KeyValue], _span_context: Option<SpanContext>) {}

    fn aggregate_then_maybe_reset(&self, _start: SystemTime, _end: SystemTime, _attributes: Vec<KeyValue>, _reset: bool) -> Option<MetricPoint> {
        None
    }
}
