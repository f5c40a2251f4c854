use super::AggregatorHandle;
use crate::metrics::data::{MeasurementValue, MetricPoint, PointValue};
use crate::metrics::exemplar::{ExemplarFilter, ExemplarReservoir};
use otel_api::metrics::InstrumentValueType;
use otel_api::otel_warn;
use otel_api::trace::SpanContext;
use otel_api::KeyValue;
use std::fmt;
use std::sync::Mutex;
use std::time::SystemTime;

enum SumTotal {
    Long(i64),
    Double(f64),
}

/// Accumulates a running total; monotonic sums (Counter) reject negative increments.
pub struct SumHandle {
    monotonic: bool,
    value_type: InstrumentValueType,
    total: Mutex<SumTotal>,
    exemplar_filter: ExemplarFilter,
    reservoir: Mutex<Box<dyn ExemplarReservoir>>,
}

impl fmt::Debug for SumHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SumHandle").field("monotonic", &self.monotonic).finish()
    }
}

impl SumHandle {
    pub fn new(monotonic: bool, exemplar_filter: ExemplarFilter, reservoir: Box<dyn ExemplarReservoir>) -> Self {
        Self::with_value_type(monotonic, InstrumentValueType::Long, exemplar_filter, reservoir)
    }

    pub fn with_value_type(monotonic: bool, value_type: InstrumentValueType, exemplar_filter: ExemplarFilter, reservoir: Box<dyn ExemplarReservoir>) -> Self {
        let total = match value_type {
            InstrumentValueType::Long => SumTotal::Long(0),
            InstrumentValueType::Double => SumTotal::Double(0.0),
        };
        SumHandle { monotonic, value_type, total: Mutex::new(total), exemplar_filter, reservoir: Mutex::new(reservoir) }
    }
}

impl AggregatorHandle for SumHandle {
    fn record(&self, value: MeasurementValue, timestamp: SystemTime, exemplar_attributes: &[KeyValue], span_context: Option<SpanContext>) {
        if self.monotonic && value.as_f64() < 0.0 {
            otel_warn!(name: "SumHandle.NegativeValueOnMonotonicSum");
            return;
        }
        if let MeasurementValue::Double(v) = value {
            if v.is_nan() {
                otel_warn!(name: "SumHandle.NaNDropped");
                return;
            }
        }
        {
            let mut total = self.total.lock().unwrap();
            match &mut *total {
                SumTotal::Long(t) => *t += value.as_f64() as i64,
                SumTotal::Double(t) => *t += value.as_f64(),
            }
        }
        if self.exemplar_filter.should_offer(span_context.as_ref()) {
            self.reservoir.lock().unwrap().offer(value, timestamp, exemplar_attributes, span_context);
        }
    }

    fn aggregate_then_maybe_reset(&self, start: SystemTime, end: SystemTime, attributes: Vec<KeyValue>, reset: bool) -> Option<MetricPoint> {
        let value = {
            let mut total = self.total.lock().unwrap();
            let value = match &*total {
                SumTotal::Long(t) => MeasurementValue::Long(*t),
                SumTotal::Double(t) => MeasurementValue::Double(*t),
            };
            if reset {
                *total = match self.value_type {
                    InstrumentValueType::Long => SumTotal::Long(0),
                    InstrumentValueType::Double => SumTotal::Double(0.0),
                };
            }
            value
        };
        let exemplars = self.reservoir.lock().unwrap().collect_and_reset(&attributes);
        Some(MetricPoint { start_time: start, time: end, attributes, exemplars, value: PointValue::Sum { value, is_monotonic: self.monotonic } })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::exemplar::FixedSizeExemplarReservoir;

    fn handle(monotonic: bool) -> SumHandle {
        SumHandle::new(monotonic, ExemplarFilter::AlwaysOff, Box::new(FixedSizeExemplarReservoir::new(0)))
    }

    #[test]
    fn delta_reset_yields_non_overlapping_totals() {
        let h = handle(true);
        h.record(MeasurementValue::Long(10), SystemTime::now(), &[], None);
        let first = h.aggregate_then_maybe_reset(SystemTime::now(), SystemTime::now(), vec![], true).unwrap();
        assert!(matches!(first.value, PointValue::Sum { value: MeasurementValue::Long(10), .. }));

        h.record(MeasurementValue::Long(5), SystemTime::now(), &[], None);
        let second = h.aggregate_then_maybe_reset(SystemTime::now(), SystemTime::now(), vec![], true).unwrap();
        assert!(matches!(second.value, PointValue::Sum { value: MeasurementValue::Long(5), .. }));
    }

    #[test]
    fn cumulative_never_resets() {
        let h = handle(true);
        h.record(MeasurementValue::Long(10), SystemTime::now(), &[], None);
        h.aggregate_then_maybe_reset(SystemTime::now(), SystemTime::now(), vec![], false);
        h.record(MeasurementValue::Long(5), SystemTime::now(), &[], None);
        let point = h.aggregate_then_maybe_reset(SystemTime::now(), SystemTime::now(), vec![], false).unwrap();
        assert!(matches!(point.value, PointValue::Sum { value: MeasurementValue::Long(15), .. }));
    }

    #[test]
    fn negative_value_on_monotonic_sum_is_dropped() {
        let h = handle(true);
        h.record(MeasurementValue::Long(10), SystemTime::now(), &[], None);
        h.record(MeasurementValue::Long(-100), SystemTime::now(), &[], None);
        let point = h.aggregate_then_maybe_reset(SystemTime::now(), SystemTime::now(), vec![], false).unwrap();
        assert!(matches!(point.value, PointValue::Sum { value: MeasurementValue::Long(10), .. }));
    }
}
