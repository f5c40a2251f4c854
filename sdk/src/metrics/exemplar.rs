//! Exemplar filtering and reservoirs (§4.2 "Exemplars").

use crate::metrics::data::{Exemplar, MeasurementValue};
use otel_api::trace::SpanContext;
use otel_api::KeyValue;
use rand::Rng;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::SystemTime;

/// Decides whether a measurement is even offered to a reservoir.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExemplarFilter {
    AlwaysOn,
    AlwaysOff,
    /// Admits only measurements taken while the current context carries a sampled span.
    TraceBased,
}

impl ExemplarFilter {
    pub fn should_offer(&self, current_span_context: Option<&SpanContext>) -> bool {
        match self {
            ExemplarFilter::AlwaysOn => true,
            ExemplarFilter::AlwaysOff => false,
            ExemplarFilter::TraceBased => current_span_context.is_some_and(|cx| cx.is_sampled()),
        }
    }
}

/// Accumulates candidate exemplars for one aggregator handle between collects.
pub trait ExemplarReservoir: Send + Sync + Debug {
    fn offer(&mut self, value: MeasurementValue, timestamp: SystemTime, attributes: &[KeyValue], span_context: Option<SpanContext>);

    /// Returns the retained exemplars and clears the reservoir for the next interval.
    /// `point_attributes` are the final (possibly view-filtered) point attributes;
    /// any measurement attribute present there is stripped from the returned exemplar.
    fn collect_and_reset(&mut self, point_attributes: &[KeyValue]) -> Vec<Exemplar>;
}

/// Uniform reservoir sampling over a fixed number of slots, used for Sum and
/// LastValue aggregations.
#[derive(Debug)]
pub struct FixedSizeExemplarReservoir {
    capacity: usize,
    slots: Vec<Option<RawExemplar>>,
    measurements_seen: u64,
}

#[derive(Clone, Debug)]
struct RawExemplar {
    value: MeasurementValue,
    timestamp: SystemTime,
    attributes: Vec<KeyValue>,
    span_context: Option<SpanContext>,
}

impl FixedSizeExemplarReservoir {
    pub fn new(capacity: usize) -> Self {
        FixedSizeExemplarReservoir { capacity, slots: vec![None; capacity], measurements_seen: 0 }
    }
}

impl ExemplarReservoir for FixedSizeExemplarReservoir {
    fn offer(&mut self, value: MeasurementValue, timestamp: SystemTime, attributes: &[KeyValue], span_context: Option<SpanContext>) {
        if self.capacity == 0 {
            return;
        }
        self.measurements_seen += 1;
        let raw = RawExemplar { value, timestamp, attributes: attributes.to_vec(), span_context };
        if (self.measurements_seen as usize) <= self.capacity {
            self.slots[(self.measurements_seen - 1) as usize] = Some(raw);
            return;
        }
        let index = rand::thread_rng().gen_range(0..self.measurements_seen as usize);
        if index < self.capacity {
            self.slots[index] = Some(raw);
        }
    }

    fn collect_and_reset(&mut self, point_attributes: &[KeyValue]) -> Vec<Exemplar> {
        let exemplars = self
            .slots
            .iter_mut()
            .filter_map(Option::take)
            .map(|raw| into_exemplar(raw, point_attributes))
            .collect();
        self.measurements_seen = 0;
        exemplars
    }
}

/// One candidate exemplar per histogram bucket, latest measurement wins.
#[derive(Debug)]
pub struct HistogramBucketExemplarReservoir {
    boundaries: Arc<[f64]>,
    slots: Vec<Option<RawExemplar>>,
}

impl HistogramBucketExemplarReservoir {
    pub fn new(boundaries: Arc<[f64]>) -> Self {
        let slots = vec![None; boundaries.len() + 1];
        HistogramBucketExemplarReservoir { boundaries, slots }
    }

    fn bucket_index(&self, value: f64) -> usize {
        self.boundaries.iter().position(|&b| value <= b).unwrap_or(self.boundaries.len())
    }
}

impl ExemplarReservoir for HistogramBucketExemplarReservoir {
    fn offer(&mut self, value: MeasurementValue, timestamp: SystemTime, attributes: &[KeyValue], span_context: Option<SpanContext>) {
        let index = self.bucket_index(value.as_f64());
        self.slots[index] = Some(RawExemplar { value, timestamp, attributes: attributes.to_vec(), span_context });
    }

    fn collect_and_reset(&mut self, point_attributes: &[KeyValue]) -> Vec<Exemplar> {
        let exemplars = self.slots.iter_mut().filter_map(Option::take).map(|raw| into_exemplar(raw, point_attributes)).collect();
        exemplars
    }
}

fn into_exemplar(raw: RawExemplar, point_attributes: &[KeyValue]) -> Exemplar {
    let filtered_attributes = raw.attributes.into_iter().filter(|kv| !point_attributes.contains(kv)).collect();
    Exemplar { value: raw.value, timestamp: raw.timestamp, filtered_attributes, span_context: raw.span_context }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_based_filter_requires_a_sampled_context() {
        assert!(!ExemplarFilter::TraceBased.should_offer(None));
    }

    #[test]
    fn always_off_never_offers() {
        assert!(!ExemplarFilter::AlwaysOff.should_offer(None));
    }

    #[test]
    fn fixed_size_reservoir_never_exceeds_capacity() {
        let mut reservoir = FixedSizeExemplarReservoir::new(2);
        for i in 0..100 {
            reservoir.offer(MeasurementValue::Long(i), SystemTime::now(), &[], None);
        }
        let exemplars = reservoir.collect_and_reset(&[]);
        assert!(exemplars.len() <= 2);
    }

    #[test]
    fn histogram_reservoir_keeps_latest_per_bucket() {
        let boundaries: Arc<[f64]> = Arc::from([5.0, 10.0].as_slice());
        let mut reservoir = HistogramBucketExemplarReservoir::new(boundaries);
        reservoir.offer(MeasurementValue::Double(3.0), SystemTime::now(), &[], None);
        reservoir.offer(MeasurementValue::Double(4.0), SystemTime::now(), &[], None);
        let exemplars = reservoir.collect_and_reset(&[]);
        assert_eq!(exemplars.len(), 1);
        assert_eq!(exemplars[0].value.as_f64(), 4.0);
    }
}
