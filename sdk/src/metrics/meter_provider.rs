//! Entry point for obtaining [`Meter`](super::Meter)s and wiring them to
//! registered readers (§4.2 "MeterProvider", "collectAll").

use super::data::{AggregationTemporality, MetricData};
use super::meter::Meter;
use super::reader::{MetricProducer, MetricReader};
use super::view::{View, ViewRegistry};
use crate::error::SdkResult;
use crate::resource::Resource;
use crate::scope::InstrumentationScope;
use otel_api::metrics::InstrumentIdentity;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// One reader's private view of the provider: the storages it owns, the
/// view registry and temporality it collects under, and the observable
/// callbacks due to run before its next collect.
pub(super) struct Pipeline {
    pub(super) resource: Arc<Resource>,
    pub(super) view_registry: Arc<ViewRegistry>,
    pub(super) temporality: AggregationTemporality,
    /// Process-start timestamp; the fixed `start` every Cumulative point
    /// reports (§3 "CUMULATIVE (never reset)").
    pub(super) process_start: SystemTime,
    /// The end of the previous collect; the `start` a Delta point reports,
    /// so point N's start equals point N-1's end (§8 testable property #7).
    /// Seeded to `process_start` for the first collect.
    pub(super) last_collect: Mutex<SystemTime>,
    pub(super) storages: Mutex<Vec<(Arc<InstrumentationScope>, Arc<dyn super::storage::MetricStorage>)>>,
    pub(super) callbacks: Mutex<Vec<(u64, Box<dyn Fn() + Send + Sync>)>>,
}

impl Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").finish()
    }
}

impl Pipeline {
    pub(super) fn register_storage(&self, scope: Arc<InstrumentationScope>, storage: Arc<dyn super::storage::MetricStorage>) {
        self.storages.lock().unwrap().push((scope, storage));
    }

    pub(super) fn register_callback(&self, id: u64, callback: Box<dyn Fn() + Send + Sync>) {
        self.callbacks.lock().unwrap().push((id, callback));
    }

    pub(super) fn unregister_callback(&self, id: u64) {
        self.callbacks.lock().unwrap().retain(|(cb_id, _)| *cb_id != id);
    }
}

impl MetricProducer for Pipeline {
    fn produce(&self) -> Vec<MetricData> {
        for (_, callback) in self.callbacks.lock().unwrap().iter() {
            callback();
        }
        let end = SystemTime::now();
        let start = match self.temporality {
            AggregationTemporality::Cumulative => self.process_start,
            // Advance the interval start to this collect's end, so the next
            // Delta point picks up exactly where this one left off.
            AggregationTemporality::Delta => {
                let mut last_collect = self.last_collect.lock().unwrap();
                let start = *last_collect;
                *last_collect = end;
                start
            }
        };
        self.storages
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(scope, storage)| storage.collect(self.resource.clone(), scope.clone(), start, end))
            .collect()
    }
}

/// Shared state behind every [`Meter`] a provider hands out: the resource,
/// the view registry, the set of reader pipelines, and duplicate-instrument
/// bookkeeping.
pub(super) struct MeterSharedState {
    pub(super) resource: Arc<Resource>,
    pub(super) view_registry: Arc<ViewRegistry>,
    pub(super) pipelines: Vec<Arc<Pipeline>>,
    pub(super) exemplar_filter: super::exemplar::ExemplarFilter,
    registered_instruments: Mutex<HashMap<InstrumentIdentity, ()>>,
    next_callback_id: std::sync::atomic::AtomicU64,
}

impl MeterSharedState {
    /// Returns `true` the first time this identity is registered; logs and
    /// returns `false` on every subsequent collision (first registration wins).
    pub(super) fn register_instrument(&self, identity: InstrumentIdentity) -> bool {
        let mut registered = self.registered_instruments.lock().unwrap();
        if registered.contains_key(&identity) {
            otel_api::otel_warn!(name: "Meter.DuplicateInstrumentRegistration", instrument = identity.name_lowercase);
            false
        } else {
            registered.insert(identity, ());
            true
        }
    }

    pub(super) fn next_callback_id(&self) -> u64 {
        self.next_callback_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// A token for a registered observable-instrument callback; dropping it
/// does not unregister -- call [`CallbackRegistration::unregister`] explicitly.
pub struct CallbackRegistration {
    pipelines: Vec<Arc<Pipeline>>,
    id: u64,
}

impl CallbackRegistration {
    pub(super) fn new(pipelines: Vec<Arc<Pipeline>>, id: u64) -> Self {
        CallbackRegistration { pipelines, id }
    }

    pub fn unregister(self) {
        for pipeline in &self.pipelines {
            pipeline.unregister_callback(self.id);
        }
    }
}

impl std::fmt::Debug for CallbackRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistration").field("id", &self.id).finish()
    }
}

/// Creates and owns [`Meter`]s, and holds every registered reader alive.
pub struct MeterProvider {
    state: Arc<MeterSharedState>,
    readers: Vec<Arc<dyn MetricReader>>,
    is_shutdown: AtomicBool,
}

impl Debug for MeterProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeterProvider").field("is_shutdown", &self.is_shutdown.load(Ordering::Relaxed)).finish()
    }
}

impl MeterProvider {
    pub fn builder() -> MeterProviderBuilder {
        MeterProviderBuilder {
            resource: Arc::new(Resource::empty()),
            views: Vec::new(),
            readers: Vec::new(),
            exemplar_filter: super::exemplar::ExemplarFilter::TraceBased,
        }
    }

    pub fn meter(&self, scope: InstrumentationScope) -> Meter {
        Meter::new(Arc::new(scope), self.state.clone())
    }

    pub fn meter_named(&self, name: impl Into<std::sync::Arc<str>>) -> Meter {
        self.meter(InstrumentationScope::new(name))
    }

    /// Forces every registered reader to collect and export immediately.
    pub fn force_flush(&self) -> SdkResult<()> {
        let mut first_err = None;
        for reader in &self.readers {
            if let Err(err) = reader.force_flush() {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Shuts every registered reader down. Idempotent: later calls are a no-op.
    pub fn shutdown(&self) -> SdkResult<()> {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut first_err = None;
        for reader in &self.readers {
            if let Err(err) = reader.shutdown() {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Configures a [`MeterProvider`]: its resource, views, and registered readers.
pub struct MeterProviderBuilder {
    resource: Arc<Resource>,
    views: Vec<View>,
    readers: Vec<(Arc<dyn MetricReader>, AggregationTemporality)>,
    exemplar_filter: super::exemplar::ExemplarFilter,
}

impl MeterProviderBuilder {
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = Arc::new(resource);
        self
    }

    pub fn with_view(mut self, view: View) -> Self {
        self.views.push(view);
        self
    }

    /// Sets the exemplar admission policy applied by every synchronous
    /// instrument storage this provider creates (§4.2 "Exemplars").
    pub fn with_exemplar_filter(mut self, filter: super::exemplar::ExemplarFilter) -> Self {
        self.exemplar_filter = filter;
        self
    }

    /// Registers a reader under a fixed temporality applied to every
    /// instrument it collects (§4.2 leaves per-instrument-kind temporality
    /// selection to the exporter; this builder applies one temporality
    /// uniformly per reader rather than threading a per-kind selector
    /// through the reader trait -- see DESIGN.md).
    pub fn with_reader(mut self, reader: Arc<dyn MetricReader>, temporality: AggregationTemporality) -> Self {
        self.readers.push((reader, temporality));
        self
    }

    pub fn build(self) -> MeterProvider {
        let view_registry = Arc::new(ViewRegistry::new(self.views));
        let start_time = SystemTime::now();
        let mut pipelines = Vec::with_capacity(self.readers.len());
        let mut readers = Vec::with_capacity(self.readers.len());

        for (reader, temporality) in self.readers {
            let pipeline = Arc::new(Pipeline {
                resource: self.resource.clone(),
                view_registry: view_registry.clone(),
                temporality,
                process_start: start_time,
                last_collect: Mutex::new(start_time),
                storages: Mutex::new(Vec::new()),
                callbacks: Mutex::new(Vec::new()),
            });
            let producer: Arc<dyn MetricProducer> = pipeline.clone();
            reader.register_producer(Arc::downgrade(&producer));
            pipelines.push(pipeline);
            readers.push(reader);
        }

        let state = Arc::new(MeterSharedState {
            resource: self.resource,
            view_registry,
            pipelines,
            exemplar_filter: self.exemplar_filter,
            registered_instruments: Mutex::new(HashMap::new()),
            next_callback_id: std::sync::atomic::AtomicU64::new(0),
        });

        MeterProvider { state, readers, is_shutdown: AtomicBool::new(false) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::aggregation::Aggregation;
    use super::super::data::MeasurementValue;
    use super::super::exemplar::ExemplarFilter;
    use super::super::storage::{DefaultSynchronousMetricStorage, SyncMetricStorage};
    use super::super::view::NoopAttributesProcessor;
    use otel_api::attributes::AttributeLimits;
    use otel_api::metrics::{InstrumentDescriptor, InstrumentType, InstrumentValueType};
    use std::thread;
    use std::time::Duration;

    fn pipeline(temporality: AggregationTemporality) -> Arc<Pipeline> {
        let start = SystemTime::now();
        Arc::new(Pipeline {
            resource: Arc::new(Resource::empty()),
            view_registry: Arc::new(ViewRegistry::new(Vec::new())),
            temporality,
            process_start: start,
            last_collect: Mutex::new(start),
            storages: Mutex::new(Vec::new()),
            callbacks: Mutex::new(Vec::new()),
        })
    }

    fn counter_storage(temporality: AggregationTemporality) -> Arc<DefaultSynchronousMetricStorage> {
        Arc::new(DefaultSynchronousMetricStorage::new(
            InstrumentDescriptor::new("reqs", InstrumentType::Counter, InstrumentValueType::Long),
            Aggregation::Sum { monotonic: true },
            temporality,
            2000,
            Arc::new(NoopAttributesProcessor),
            AttributeLimits::default(),
            ExemplarFilter::AlwaysOff,
        ))
    }

    /// §8 testable property #7: for Delta, point N's start equals point
    /// N-1's end, rather than the pipeline's fixed creation time.
    #[test]
    fn delta_pipeline_advances_start_time_to_the_previous_collects_end() {
        let pipeline = pipeline(AggregationTemporality::Delta);
        let storage = counter_storage(AggregationTemporality::Delta);
        storage.record_measurement(MeasurementValue::Long(1), vec![], SystemTime::now(), None);
        pipeline.register_storage(Arc::new(InstrumentationScope::new("t")), storage.clone());

        let first = pipeline.produce();
        let first_end = first[0].points[0].time;
        thread::sleep(Duration::from_millis(5));

        storage.record_measurement(MeasurementValue::Long(1), vec![], SystemTime::now(), None);
        let second = pipeline.produce();
        let second_start = second[0].points[0].start_time;

        assert_eq!(second_start, first_end);
    }

    /// Cumulative points always report the pipeline's process-start time,
    /// never advancing across collects.
    #[test]
    fn cumulative_pipeline_keeps_a_fixed_start_time_across_collects() {
        let pipeline = pipeline(AggregationTemporality::Cumulative);
        let storage = counter_storage(AggregationTemporality::Cumulative);
        storage.record_measurement(MeasurementValue::Long(1), vec![], SystemTime::now(), None);
        pipeline.register_storage(Arc::new(InstrumentationScope::new("t")), storage.clone());

        let first = pipeline.produce();
        let first_start = first[0].points[0].start_time;
        thread::sleep(Duration::from_millis(5));

        storage.record_measurement(MeasurementValue::Long(1), vec![], SystemTime::now(), None);
        let second = pipeline.produce();
        let second_start = second[0].points[0].start_time;

        assert_eq!(second_start, first_start);
        assert_eq!(second_start, pipeline.process_start);
    }
}
