use super::AggregatorHandle;
use crate::metrics::data::{MeasurementValue, MetricPoint, PointValue};
use crate::metrics::exemplar::{ExemplarFilter, ExemplarReservoir};
use otel_api::otel_warn;
use otel_api::trace::SpanContext;
use otel_api::KeyValue;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

struct HistogramState {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    bucket_counts: Vec<u64>,
}

impl HistogramState {
    fn new(num_buckets: usize) -> Self {
        HistogramState { count: 0, sum: 0.0, min: f64::INFINITY, max: f64::NEG_INFINITY, bucket_counts: vec![0; num_buckets] }
    }
}

/// Fixed-boundary histogram (§4.2 ExplicitBucketHistogram). Bucket `i` counts
/// values in `(boundaries[i-1], boundaries[i]]`, with one extra overflow
/// bucket above the last boundary.
pub struct HistogramHandle {
    boundaries: Arc<[f64]>,
    state: Mutex<HistogramState>,
    exemplar_filter: ExemplarFilter,
    reservoir: Mutex<Box<dyn ExemplarReservoir>>,
}

impl fmt::Debug for HistogramHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistogramHandle").field("boundaries", &self.boundaries).finish()
    }
}

impl HistogramHandle {
    pub fn new(boundaries: Arc<[f64]>, exemplar_filter: ExemplarFilter, reservoir: Box<dyn ExemplarReservoir>) -> Self {
        let num_buckets = boundaries.len() + 1;
        HistogramHandle { boundaries, state: Mutex::new(HistogramState::new(num_buckets)), exemplar_filter, reservoir: Mutex::new(reservoir) }
    }

    fn bucket_index(&self, value: f64) -> usize {
        self.boundaries.iter().position(|&b| value <= b).unwrap_or(self.boundaries.len())
    }
}

impl AggregatorHandle for HistogramHandle {
    fn record(&self, value: MeasurementValue, timestamp: SystemTime, exemplar_attributes: &[KeyValue], span_context: Option<SpanContext>) {
        let v = value.as_f64();
        if v.is_nan() {
            otel_warn!(name: "HistogramHandle.NaNDropped");
            return;
        }
        {
            let mut state = self.state.lock().unwrap();
            let index = self.bucket_index(v);
            state.bucket_counts[index] += 1;
            state.count += 1;
            state.sum += v;
            state.min = state.min.min(v);
            state.max = state.max.max(v);
        }
        if self.exemplar_filter.should_offer(span_context.as_ref()) {
            self.reservoir.lock().unwrap().offer(value, timestamp, exemplar_attributes, span_context);
        }
    }

    fn aggregate_then_maybe_reset(&self, start: SystemTime, end: SystemTime, attributes: Vec<KeyValue>, reset: bool) -> Option<MetricPoint> {
        let (count, sum, min, max, bucket_counts) = {
            let mut state = self.state.lock().unwrap();
            let snapshot = (state.count, state.sum, state.min, state.max, state.bucket_counts.clone());
            if reset {
                *state = HistogramState::new(self.boundaries.len() + 1);
            }
            snapshot
        };
        let exemplars = self.reservoir.lock().unwrap().collect_and_reset(&attributes);
        Some(MetricPoint {
            start_time: start,
            time: end,
            attributes,
            exemplars,
            value: PointValue::Histogram { count, sum, min, max, bucket_counts, boundaries: self.boundaries.clone() },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::exemplar::FixedSizeExemplarReservoir;

    fn handle() -> HistogramHandle {
        let boundaries: Arc<[f64]> = Arc::from([5.0, 10.0].as_slice());
        HistogramHandle::new(boundaries, ExemplarFilter::AlwaysOff, Box::new(FixedSizeExemplarReservoir::new(0)))
    }

    #[test]
    fn bucket_counts_sum_min_max_match_boundary_semantics() {
        let h = handle();
        for v in [3.0, 7.0, 12.0] {
            h.record(MeasurementValue::Double(v), SystemTime::now(), &[], None);
        }
        let point = h.aggregate_then_maybe_reset(SystemTime::now(), SystemTime::now(), vec![], false).unwrap();
        match point.value {
            PointValue::Histogram { count, sum, min, max, bucket_counts, .. } => {
                assert_eq!(count, 3);
                assert_eq!(sum, 22.0);
                assert_eq!(min, 3.0);
                assert_eq!(max, 12.0);
                assert_eq!(bucket_counts, vec![1, 1, 1]);
            }
            _ => panic!("expected histogram"),
        }
    }

    #[test]
    fn boundary_value_falls_into_the_lower_bucket() {
        let h = handle();
        h.record(MeasurementValue::Double(5.0), SystemTime::now(), &[], None);
        let point = h.aggregate_then_maybe_reset(SystemTime::now(), SystemTime::now(), vec![], false).unwrap();
        match point.value {
            PointValue::Histogram { bucket_counts, .. } => assert_eq!(bucket_counts, vec![1, 0, 0]),
            _ => panic!("expected histogram"),
        }
    }

    #[test]
    fn nan_does_not_change_any_point() {
        let h = handle();
        h.record(MeasurementValue::Double(3.0), SystemTime::now(), &[], None);
        let before = h.aggregate_then_maybe_reset(SystemTime::now(), SystemTime::now(), vec![], false).unwrap();
        h.record(MeasurementValue::Double(f64::NAN), SystemTime::now(), &[], None);
        let after = h.aggregate_then_maybe_reset(SystemTime::now(), SystemTime::now(), vec![], false).unwrap();
        match (before.value, after.value) {
            (PointValue::Histogram { count: c1, sum: s1, .. }, PointValue::Histogram { count: c2, sum: s2, .. }) => {
                assert_eq!(c1, c2);
                assert_eq!(s1, s2);
            }
            _ => panic!("expected histogram"),
        }
    }
}
