//! Per-(reader, view, instrument) attribute storage: the cardinality-limited
//! map from attribute set to aggregator handle (§4.2 "DefaultSynchronousMetricStorage",
//! "AsynchronousMetricStorage").
//!
//! [`KeyValue`] doesn't derive `Eq`/`Hash` (its `Value::F64` payload can't),
//! so the map below is keyed on a canonical string rendering of the sorted
//! attribute set rather than hashing `Vec<KeyValue>` directly. This is a
//! deliberate simplification over hashing the typed values themselves.

use super::aggregation::Aggregation;
use super::data::{AggregationTemporality, MeasurementValue, MetricData, MetricPoint, PointValue};
use super::exemplar::ExemplarFilter;
use super::internal::{new_handle, AggregatorHandle};
use super::view::AttributesProcessor;
use crate::resource::Resource;
use crate::scope::InstrumentationScope;
use otel_api::attributes::{AttributeLimits, AttributeSet};
use otel_api::metrics::InstrumentDescriptor;
use otel_api::otel_warn;
use otel_api::trace::SpanContext;
use otel_api::KeyValue;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

const OVERFLOW_ATTRIBUTE_KEY: &str = "otel.metric.overflow";

fn overflow_attributes() -> Vec<KeyValue> {
    vec![KeyValue::new(OVERFLOW_ATTRIBUTE_KEY, true)]
}

/// Renders a (presumed already-sorted) attribute slice into a string unique
/// up to `KeyValue` equality, for use as a `HashMap` key.
fn canonical_key(attributes: &[KeyValue]) -> String {
    let mut rendered = String::new();
    for kv in attributes {
        rendered.push_str(kv.key.as_str());
        rendered.push('=');
        rendered.push_str(&format!("{:?}", kv.value));
        rendered.push(';');
    }
    rendered
}

/// A collectible source of [`MetricData`] for one instrument, scoped to a
/// single reader.
pub trait MetricStorage: Send + Sync + Debug {
    fn collect(&self, resource: Arc<Resource>, scope: Arc<InstrumentationScope>, start: SystemTime, end: SystemTime) -> Option<MetricData>;
}

/// A [`MetricStorage`] that synchronous instruments (`Counter`, `UpDownCounter`,
/// `Histogram`) write directly to from the recording call.
pub trait SyncMetricStorage: MetricStorage {
    fn record_measurement(&self, value: MeasurementValue, attributes: Vec<KeyValue>, timestamp: SystemTime, span_context: Option<SpanContext>);
}

impl SyncMetricStorage for DefaultSynchronousMetricStorage {
    fn record_measurement(&self, value: MeasurementValue, attributes: Vec<KeyValue>, timestamp: SystemTime, span_context: Option<SpanContext>) {
        self.record(value, attributes, timestamp, span_context)
    }
}

/// A [`MetricStorage`] that an observable instrument's callback writes to
/// during a collection cycle.
pub trait AsyncMetricStorage: MetricStorage {
    fn record_observation(&self, value: MeasurementValue, attributes: Vec<KeyValue>);
}

impl AsyncMetricStorage for AsynchronousMetricStorage {
    fn record_observation(&self, value: MeasurementValue, attributes: Vec<KeyValue>) {
        AsynchronousMetricStorage::record_observation(self, value, attributes)
    }
}

struct SyncSeries {
    attributes: Vec<KeyValue>,
    handle: Box<dyn AggregatorHandle>,
}

/// Storage backing `Counter`/`UpDownCounter`/`Histogram` instruments: every
/// `record` looks up (or creates) the handle for the measurement's attribute
/// set, subject to the view's cardinality limit.
pub struct DefaultSynchronousMetricStorage {
    descriptor: InstrumentDescriptor,
    aggregation: Aggregation,
    temporality: AggregationTemporality,
    cardinality_limit: usize,
    attributes_processor: Arc<dyn AttributesProcessor>,
    attribute_limits: AttributeLimits,
    exemplar_filter: ExemplarFilter,
    series: Mutex<HashMap<String, SyncSeries>>,
}

impl Debug for DefaultSynchronousMetricStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultSynchronousMetricStorage").field("descriptor", &self.descriptor).finish()
    }
}

impl DefaultSynchronousMetricStorage {
    pub fn new(
        descriptor: InstrumentDescriptor,
        aggregation: Aggregation,
        temporality: AggregationTemporality,
        cardinality_limit: usize,
        attributes_processor: Arc<dyn AttributesProcessor>,
        attribute_limits: AttributeLimits,
        exemplar_filter: ExemplarFilter,
    ) -> Self {
        DefaultSynchronousMetricStorage {
            descriptor,
            aggregation,
            temporality,
            cardinality_limit: cardinality_limit.max(1),
            attributes_processor,
            attribute_limits,
            exemplar_filter,
            series: Mutex::new(HashMap::new()),
        }
    }

    /// Reserved capacity for regular series; the last slot always belongs
    /// to the overflow series once the limit is reached.
    fn effective_limit(&self) -> usize {
        self.cardinality_limit.saturating_sub(1).max(1)
    }

    pub fn record(&self, value: MeasurementValue, raw_attributes: Vec<KeyValue>, timestamp: SystemTime, span_context: Option<SpanContext>) {
        let processed = self.attributes_processor.process(raw_attributes);
        let set = AttributeSet::new(processed, self.attribute_limits);
        let key = canonical_key(set.as_slice());

        let mut series = self.series.lock().unwrap();
        if let Some(existing) = series.get(&key) {
            existing.handle.record(value, timestamp, set.as_slice(), span_context);
            return;
        }

        if series.len() >= self.effective_limit() {
            let overflow_key = canonical_key(&overflow_attributes());
            if !series.contains_key(&overflow_key) {
                otel_warn!(name: "DefaultSynchronousMetricStorage.CardinalityLimitReached", instrument = self.descriptor.name.as_ref());
                series.insert(
                    overflow_key.clone(),
                    SyncSeries { attributes: overflow_attributes(), handle: new_handle(&self.aggregation, self.descriptor.value_type, self.exemplar_filter) },
                );
            }
            series.get(&overflow_key).unwrap().handle.record(value, timestamp, &[], span_context);
            return;
        }

        let handle = new_handle(&self.aggregation, self.descriptor.value_type, self.exemplar_filter);
        handle.record(value, timestamp, set.as_slice(), span_context);
        series.insert(key, SyncSeries { attributes: set.as_slice().to_vec(), handle });
    }
}

impl MetricStorage for DefaultSynchronousMetricStorage {
    fn collect(&self, resource: Arc<Resource>, scope: Arc<InstrumentationScope>, start: SystemTime, end: SystemTime) -> Option<MetricData> {
        let reset = self.temporality == AggregationTemporality::Delta;
        let mut series = self.series.lock().unwrap();
        let mut points = Vec::with_capacity(series.len());
        let mut stale = Vec::new();

        for (key, entry) in series.iter() {
            match entry.handle.aggregate_then_maybe_reset(start, end, entry.attributes.clone(), reset) {
                Some(point) => points.push(point),
                // A handle with nothing to report this interval (e.g. an
                // untouched LastValue) is dropped outright: the map entry is
                // removed rather than pooled, so a later measurement under
                // the same attribute set allocates a fresh handle.
                None if reset => stale.push(key.clone()),
                None => {}
            }
        }
        for key in stale {
            series.remove(&key);
        }
        drop(series);

        if points.is_empty() {
            return None;
        }
        Some(MetricData { resource, scope, descriptor: self.descriptor.clone(), temporality: self.temporality, points })
    }
}

struct ObservedSeries {
    attributes: Vec<KeyValue>,
    value: MeasurementValue,
}

/// Storage backing `ObservableCounter`/`ObservableUpDownCounter`/`ObservableGauge`
/// instruments: callbacks report an absolute reading per attribute set each
/// collection cycle rather than incrementing a running total.
///
/// `previous` holds the last *cumulative* reading reported for each series,
/// carried across collects (unlike `observations`, which holds only the
/// current cycle's callback output and is cleared every collect) -- it's
/// what a Delta-temporality reader diffs the new reading against.
pub struct AsynchronousMetricStorage {
    descriptor: InstrumentDescriptor,
    aggregation: Aggregation,
    temporality: AggregationTemporality,
    cardinality_limit: usize,
    attributes_processor: Arc<dyn AttributesProcessor>,
    attribute_limits: AttributeLimits,
    observations: Mutex<HashMap<String, ObservedSeries>>,
    previous: Mutex<HashMap<String, MeasurementValue>>,
}

impl Debug for AsynchronousMetricStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsynchronousMetricStorage").field("descriptor", &self.descriptor).finish()
    }
}

impl AsynchronousMetricStorage {
    pub fn new(
        descriptor: InstrumentDescriptor,
        aggregation: Aggregation,
        temporality: AggregationTemporality,
        cardinality_limit: usize,
        attributes_processor: Arc<dyn AttributesProcessor>,
        attribute_limits: AttributeLimits,
    ) -> Self {
        AsynchronousMetricStorage {
            descriptor,
            aggregation,
            temporality,
            cardinality_limit: cardinality_limit.max(1),
            attributes_processor,
            attribute_limits,
            observations: Mutex::new(HashMap::new()),
            previous: Mutex::new(HashMap::new()),
        }
    }

    fn effective_limit(&self) -> usize {
        self.cardinality_limit.saturating_sub(1).max(1)
    }

    /// Records one observation made by an instrument callback during the
    /// current collection cycle.
    pub fn record_observation(&self, value: MeasurementValue, raw_attributes: Vec<KeyValue>) {
        let processed = self.attributes_processor.process(raw_attributes);
        let set = AttributeSet::new(processed, self.attribute_limits);
        let key = canonical_key(set.as_slice());

        let mut observations = self.observations.lock().unwrap();
        if !observations.contains_key(&key) && observations.len() >= self.effective_limit() {
            otel_warn!(name: "AsynchronousMetricStorage.CardinalityLimitReached", instrument = self.descriptor.name.as_ref());
            observations.insert(canonical_key(&overflow_attributes()), ObservedSeries { attributes: overflow_attributes(), value });
            return;
        }

        observations.insert(key, ObservedSeries { attributes: set.as_slice().to_vec(), value });
    }
}

impl MetricStorage for AsynchronousMetricStorage {
    fn collect(&self, resource: Arc<Resource>, scope: Arc<InstrumentationScope>, start: SystemTime, end: SystemTime) -> Option<MetricData> {
        let mut observations = self.observations.lock().unwrap();
        let mut previous = self.previous.lock().unwrap();
        let mut points = Vec::with_capacity(observations.len());

        for (key, series) in observations.iter() {
            let point_value = match &self.aggregation {
                Aggregation::Sum { monotonic } => {
                    let reported = match self.temporality {
                        AggregationTemporality::Delta => match previous.get(key) {
                            Some(&prior) => subtract(series.value, prior, *monotonic),
                            None => series.value,
                        },
                        AggregationTemporality::Cumulative => series.value,
                    };
                    PointValue::Sum { value: reported, is_monotonic: *monotonic }
                }
                Aggregation::LastValue => PointValue::Gauge { value: series.value },
                Aggregation::Drop | Aggregation::Default => continue,
                Aggregation::ExplicitBucketHistogram { .. } => continue,
            };
            points.push(MetricPoint { start_time: start, time: end, attributes: series.attributes.clone(), exemplars: Vec::new(), value: point_value });
        }

        previous.clear();
        for (key, series) in observations.iter() {
            previous.insert(key.clone(), series.value);
        }
        // Every callback re-reports the full set of series it knows about;
        // anything not observed next cycle should not linger.
        observations.clear();
        drop(observations);
        drop(previous);

        if points.is_empty() {
            return None;
        }
        Some(MetricData { resource, scope, descriptor: self.descriptor.clone(), temporality: self.temporality, points })
    }
}

fn subtract(current: MeasurementValue, previous: MeasurementValue, monotonic: bool) -> MeasurementValue {
    match (current, previous) {
        (MeasurementValue::Long(c), MeasurementValue::Long(p)) => {
            let diff = c - p;
            MeasurementValue::Long(if monotonic && diff < 0 { 0 } else { diff })
        }
        (c, p) => {
            let diff = c.as_f64() - p.as_f64();
            MeasurementValue::Double(if monotonic && diff < 0.0 { 0.0 } else { diff })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::view::NoopAttributesProcessor;
    use otel_api::metrics::{InstrumentType, InstrumentValueType};

    fn descriptor() -> InstrumentDescriptor {
        InstrumentDescriptor::new("reqs", InstrumentType::Counter, InstrumentValueType::Long)
    }

    fn sync_storage(temporality: AggregationTemporality, cardinality_limit: usize) -> DefaultSynchronousMetricStorage {
        DefaultSynchronousMetricStorage::new(
            descriptor(),
            Aggregation::Sum { monotonic: true },
            temporality,
            cardinality_limit,
            Arc::new(NoopAttributesProcessor),
            AttributeLimits::default(),
            ExemplarFilter::AlwaysOff,
        )
    }

    #[test]
    fn delta_collect_resets_between_intervals() {
        let storage = sync_storage(AggregationTemporality::Delta, 2000);
        storage.record(MeasurementValue::Long(5), vec![], SystemTime::now(), None);
        let first = storage.collect(Arc::new(Resource::empty()), Arc::new(InstrumentationScope::new("t")), SystemTime::now(), SystemTime::now()).unwrap();
        storage.record(MeasurementValue::Long(3), vec![], SystemTime::now(), None);
        let second = storage.collect(Arc::new(Resource::empty()), Arc::new(InstrumentationScope::new("t")), SystemTime::now(), SystemTime::now()).unwrap();
        match (&first.points[0].value, &second.points[0].value) {
            (PointValue::Sum { value: MeasurementValue::Long(a), .. }, PointValue::Sum { value: MeasurementValue::Long(b), .. }) => {
                assert_eq!(*a, 5);
                assert_eq!(*b, 3);
            }
            _ => panic!("expected sum points"),
        }
    }

    #[test]
    fn cumulative_collect_never_resets() {
        let storage = sync_storage(AggregationTemporality::Cumulative, 2000);
        storage.record(MeasurementValue::Long(5), vec![], SystemTime::now(), None);
        storage.collect(Arc::new(Resource::empty()), Arc::new(InstrumentationScope::new("t")), SystemTime::now(), SystemTime::now());
        storage.record(MeasurementValue::Long(3), vec![], SystemTime::now(), None);
        let second = storage.collect(Arc::new(Resource::empty()), Arc::new(InstrumentationScope::new("t")), SystemTime::now(), SystemTime::now()).unwrap();
        match &second.points[0].value {
            PointValue::Sum { value: MeasurementValue::Long(v), .. } => assert_eq!(*v, 8),
            _ => panic!("expected sum point"),
        }
    }

    #[test]
    fn distinct_attribute_sets_beyond_the_limit_collapse_into_overflow() {
        let storage = sync_storage(AggregationTemporality::Cumulative, 2);
        storage.record(MeasurementValue::Long(1), vec![KeyValue::new("id", 1_i64)], SystemTime::now(), None);
        storage.record(MeasurementValue::Long(1), vec![KeyValue::new("id", 2_i64)], SystemTime::now(), None);
        storage.record(MeasurementValue::Long(1), vec![KeyValue::new("id", 3_i64)], SystemTime::now(), None);
        let data = storage.collect(Arc::new(Resource::empty()), Arc::new(InstrumentationScope::new("t")), SystemTime::now(), SystemTime::now()).unwrap();
        // effective_limit(2) == 1 regular series + 1 overflow series.
        assert_eq!(data.points.len(), 2);
        let has_overflow = data.points.iter().any(|p| p.attributes.iter().any(|kv| kv.key.as_str() == OVERFLOW_ATTRIBUTE_KEY));
        assert!(has_overflow);
    }

    #[test]
    fn async_delta_storage_reports_the_difference_from_the_previous_cumulative_reading() {
        let storage = AsynchronousMetricStorage::new(
            descriptor(),
            Aggregation::Sum { monotonic: true },
            AggregationTemporality::Delta,
            2000,
            Arc::new(NoopAttributesProcessor),
            AttributeLimits::default(),
        );
        storage.record_observation(MeasurementValue::Long(10), vec![]);
        storage.collect(Arc::new(Resource::empty()), Arc::new(InstrumentationScope::new("t")), SystemTime::now(), SystemTime::now());
        storage.record_observation(MeasurementValue::Long(16), vec![]);
        let data = storage.collect(Arc::new(Resource::empty()), Arc::new(InstrumentationScope::new("t")), SystemTime::now(), SystemTime::now()).unwrap();
        match &data.points[0].value {
            PointValue::Sum { value: MeasurementValue::Long(v), .. } => assert_eq!(*v, 6),
            _ => panic!("expected sum point"),
        }
    }
}
