use super::AggregatorHandle;
use crate::metrics::data::{MeasurementValue, MetricPoint, PointValue};
use crate::metrics::exemplar::{ExemplarFilter, ExemplarReservoir};
use otel_api::trace::SpanContext;
use otel_api::KeyValue;
use std::fmt;
use std::sync::Mutex;
use std::time::SystemTime;

/// Retains only the most recent measurement, for `ObservableGauge`.
///
/// `reset` is a no-op here: a gauge reports its current value every
/// collect regardless of temporality, it does not accumulate across
/// intervals (§4.2 "no combine across measurements").
pub struct LastValueHandle {
    last: Mutex<Option<MeasurementValue>>,
    exemplar_filter: ExemplarFilter,
    reservoir: Mutex<Box<dyn ExemplarReservoir>>,
}

impl fmt::Debug for LastValueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LastValueHandle").finish()
    }
}

impl LastValueHandle {
    pub fn new(exemplar_filter: ExemplarFilter, reservoir: Box<dyn ExemplarReservoir>) -> Self {
        LastValueHandle { last: Mutex::new(None), exemplar_filter, reservoir: Mutex::new(reservoir) }
    }
}

impl AggregatorHandle for LastValueHandle {
    fn record(&self, value: MeasurementValue, timestamp: SystemTime, exemplar_attributes: &[KeyValue], span_context: Option<SpanContext>) {
        if let MeasurementValue::Double(v) = value {
            if v.is_nan() {
                return;
            }
        }
        *self.last.lock().unwrap() = Some(value);
        if self.exemplar_filter.should_offer(span_context.as_ref()) {
            self.reservoir.lock().unwrap().offer(value, timestamp, exemplar_attributes, span_context);
        }
    }

    fn aggregate_then_maybe_reset(&self, start: SystemTime, end: SystemTime, attributes: Vec<KeyValue>, _reset: bool) -> Option<MetricPoint> {
        let value = (*self.last.lock().unwrap())?;
        let exemplars = self.reservoir.lock().unwrap().collect_and_reset(&attributes);
        Some(MetricPoint { start_time: start, time: end, attributes, exemplars, value: PointValue::Gauge { value } })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::exemplar::FixedSizeExemplarReservoir;

    #[test]
    fn no_measurement_yields_no_point() {
        let h = LastValueHandle::new(ExemplarFilter::AlwaysOff, Box::new(FixedSizeExemplarReservoir::new(0)));
        assert!(h.aggregate_then_maybe_reset(SystemTime::now(), SystemTime::now(), vec![], true).is_none());
    }

    #[test]
    fn latest_measurement_wins_within_an_interval() {
        let h = LastValueHandle::new(ExemplarFilter::AlwaysOff, Box::new(FixedSizeExemplarReservoir::new(0)));
        h.record(MeasurementValue::Double(1.0), SystemTime::now(), &[], None);
        h.record(MeasurementValue::Double(2.0), SystemTime::now(), &[], None);
        let point = h.aggregate_then_maybe_reset(SystemTime::now(), SystemTime::now(), vec![], true).unwrap();
        assert!(matches!(point.value, PointValue::Gauge { value: MeasurementValue::Double(v) } if v == 2.0));
    }

    #[test]
    fn nan_is_dropped() {
        let h = LastValueHandle::new(ExemplarFilter::AlwaysOff, Box::new(FixedSizeExemplarReservoir::new(0)));
        h.record(MeasurementValue::Double(1.0), SystemTime::now(), &[], None);
        h.record(MeasurementValue::Double(f64::NAN), SystemTime::now(), &[], None);
        let point = h.aggregate_then_maybe_reset(SystemTime::now(), SystemTime::now(), vec![], true).unwrap();
        assert!(matches!(point.value, PointValue::Gauge { value: MeasurementValue::Double(v) } if v == 1.0));
    }
}
