//! The shapes collection produces: points, temporality, and the exemplars
//! attached to them (§3 MetricPoint, §4.2 temporality).

use crate::resource::Resource;
use crate::scope::InstrumentationScope;
use otel_api::metrics::InstrumentDescriptor;
use otel_api::trace::SpanContext;
use otel_api::KeyValue;
use std::sync::Arc;
use std::time::SystemTime;

/// Whether a point covers the interval since the last collect (`Delta`) or
/// since the provider started (`Cumulative`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AggregationTemporality {
    Delta,
    Cumulative,
}

/// A scalar measurement, preserving the instrument's declared value type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MeasurementValue {
    Long(i64),
    Double(f64),
}

impl MeasurementValue {
    pub fn as_f64(self) -> f64 {
        match self {
            MeasurementValue::Long(v) => v as f64,
            MeasurementValue::Double(v) => v,
        }
    }
}

/// A single raw measurement retained as evidence for an aggregated point.
#[derive(Clone, Debug)]
pub struct Exemplar {
    pub value: MeasurementValue,
    pub timestamp: SystemTime,
    /// Attributes present on the original measurement but stripped from the
    /// point's attribute set by a view's `AttributesProcessor`.
    pub filtered_attributes: Vec<KeyValue>,
    pub span_context: Option<SpanContext>,
}

/// The type-specific payload of a [`MetricPoint`].
#[derive(Clone, Debug)]
pub enum PointValue {
    Sum { value: MeasurementValue, is_monotonic: bool },
    Gauge { value: MeasurementValue },
    Histogram { count: u64, sum: f64, min: f64, max: f64, bucket_counts: Vec<u64>, boundaries: Arc<[f64]> },
}

/// One aggregated data point for one attribute set over `[start_time, time]`.
#[derive(Clone, Debug)]
pub struct MetricPoint {
    pub start_time: SystemTime,
    pub time: SystemTime,
    pub attributes: Vec<KeyValue>,
    pub exemplars: Vec<Exemplar>,
    pub value: PointValue,
}

/// All points collected for one instrument during one reader collect.
#[derive(Clone, Debug)]
pub struct MetricData {
    pub resource: Arc<Resource>,
    pub scope: Arc<InstrumentationScope>,
    pub descriptor: InstrumentDescriptor,
    pub temporality: AggregationTemporality,
    pub points: Vec<MetricPoint>,
}

impl MetricData {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
