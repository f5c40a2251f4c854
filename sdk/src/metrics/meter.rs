//! Instrument construction and the instrument handles instrumented code
//! records measurements through (§3 Meter, Instrument, §4.2 "Instrument
//! creation").

use super::data::{AggregationTemporality, MeasurementValue};
use super::meter_provider::MeterSharedState;
use super::storage::{AsyncMetricStorage, DefaultSynchronousMetricStorage, MetricStorage, SyncMetricStorage};
use crate::scope::InstrumentationScope;
use otel_api::attributes::AttributeLimits;
use otel_api::metrics::{Advice, InstrumentDescriptor, InstrumentType, InstrumentValueType};
use otel_api::KeyValue;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::SystemTime;

mod private {
    pub trait Sealed {}
    impl Sealed for i64 {}
    impl Sealed for f64 {}
}

/// The two numeric representations an instrument can record in, matching
/// [`InstrumentValueType`]. Real OTel SDKs additionally distinguish `u64`
/// at the API surface; this crate collapses that to `i64` (see DESIGN.md).
pub trait Number: Copy + Send + Sync + private::Sealed + 'static {
    const VALUE_TYPE: InstrumentValueType;
    fn into_measurement(self) -> MeasurementValue;
}

impl Number for i64 {
    const VALUE_TYPE: InstrumentValueType = InstrumentValueType::Long;
    fn into_measurement(self) -> MeasurementValue {
        MeasurementValue::Long(self)
    }
}

impl Number for f64 {
    const VALUE_TYPE: InstrumentValueType = InstrumentValueType::Double;
    fn into_measurement(self) -> MeasurementValue {
        MeasurementValue::Double(self)
    }
}

/// One attribute-tagged reading reported from an observable instrument's
/// callback during a single collection cycle.
pub struct Observation<T> {
    pub value: T,
    pub attributes: Vec<KeyValue>,
}

impl<T> Observation<T> {
    pub fn new(value: T, attributes: impl IntoIterator<Item = KeyValue>) -> Self {
        Observation { value, attributes: attributes.into_iter().collect() }
    }
}

/// An instrument that only ever accumulates upward.
#[derive(Clone)]
pub struct Counter<T: Number> {
    storages: Arc<Vec<Arc<dyn SyncMetricStorage>>>,
    _marker: PhantomData<T>,
}

/// An instrument whose value may move in either direction.
#[derive(Clone)]
pub struct UpDownCounter<T: Number> {
    storages: Arc<Vec<Arc<dyn SyncMetricStorage>>>,
    _marker: PhantomData<T>,
}

/// An instrument recording a distribution of values.
#[derive(Clone)]
pub struct Histogram<T: Number> {
    storages: Arc<Vec<Arc<dyn SyncMetricStorage>>>,
    _marker: PhantomData<T>,
}

macro_rules! sync_instrument {
    ($name:ident, $method:ident, $doc:literal) => {
        impl<T: Number> $name<T> {
            #[doc = $doc]
            pub fn $method(&self, value: T, attributes: impl IntoIterator<Item = KeyValue>) {
                let attrs: Vec<KeyValue> = attributes.into_iter().collect();
                let measurement = value.into_measurement();
                let span_context = otel_api::context::current();
                for storage in self.storages.iter() {
                    storage.record_measurement(measurement, attrs.clone(), SystemTime::now(), span_context.clone());
                }
            }
        }

        impl<T: Number> std::fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_fmt(format_args!("{}<{}>", stringify!($name), std::any::type_name::<T>()))
            }
        }
    };
}

sync_instrument!(Counter, add, "Records an increment. Negative values are dropped with a warning.");
sync_instrument!(UpDownCounter, add, "Records a change, positive or negative.");
sync_instrument!(Histogram, record, "Records one observation of the distribution.");

/// An observable instrument whose registered callback supplies fresh
/// readings once per collection cycle; see [`Meter::register_callback`].
pub struct ObservableHandle<T: Number> {
    pub(super) storages: Arc<Vec<Arc<dyn AsyncMetricStorage>>>,
    pub(super) _marker: PhantomData<T>,
}

/// Produces [`Meter`]s for instrumentation scopes; see
/// [`MeterProvider`](super::MeterProvider).
pub struct Meter {
    scope: Arc<InstrumentationScope>,
    state: Arc<MeterSharedState>,
}

impl std::fmt::Debug for Meter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Meter").field("scope", &self.scope).finish()
    }
}

impl Meter {
    pub(super) fn new(scope: Arc<InstrumentationScope>, state: Arc<MeterSharedState>) -> Self {
        Meter { scope, state }
    }

    fn build_sync_storages(&self, kind: InstrumentType, value_type: InstrumentValueType, name: &str, description: &str, unit: &str, advice: Advice) -> Arc<Vec<Arc<dyn SyncMetricStorage>>> {
        let descriptor = InstrumentDescriptor::new(name.to_owned(), kind, value_type).with_description(description.to_owned()).with_unit(unit.to_owned()).with_advice(advice);
        self.state.register_instrument(descriptor.identity_key());

        let mut storages: Vec<Arc<dyn SyncMetricStorage>> = Vec::new();
        for pipeline in &self.state.pipelines {
            for view in pipeline.view_registry.find_views(&descriptor, &self.scope) {
                let aggregation = view.aggregation.resolve(kind, &descriptor.advice);
                if !aggregation.is_compatible_with(kind) {
                    otel_api::otel_warn!(name: "Meter.IncompatibleAggregation", instrument = descriptor.name.as_ref());
                    continue;
                }
                let mut view_descriptor = descriptor.clone();
                if let Some(name) = &view.name_override {
                    view_descriptor.name = name.clone();
                }
                let storage = Arc::new(DefaultSynchronousMetricStorage::new(
                    view_descriptor,
                    aggregation,
                    pipeline.temporality,
                    view.cardinality_limit,
                    view.attributes_processor.clone(),
                    AttributeLimits::default(),
                    self.state.exemplar_filter,
                ));
                pipeline.register_storage(self.scope.clone(), storage.clone());
                storages.push(storage as Arc<dyn SyncMetricStorage>);
            }
        }
        Arc::new(storages)
    }

    pub fn i64_counter(&self, name: impl Into<String>, description: impl Into<String>, unit: impl Into<String>) -> Counter<i64> {
        let storages = self.build_sync_storages(InstrumentType::Counter, InstrumentValueType::Long, &name.into(), &description.into(), &unit.into(), Advice::default());
        Counter { storages, _marker: PhantomData }
    }

    pub fn f64_counter(&self, name: impl Into<String>, description: impl Into<String>, unit: impl Into<String>) -> Counter<f64> {
        let storages = self.build_sync_storages(InstrumentType::Counter, InstrumentValueType::Double, &name.into(), &description.into(), &unit.into(), Advice::default());
        Counter { storages, _marker: PhantomData }
    }

    pub fn i64_up_down_counter(&self, name: impl Into<String>, description: impl Into<String>, unit: impl Into<String>) -> UpDownCounter<i64> {
        let storages = self.build_sync_storages(InstrumentType::UpDownCounter, InstrumentValueType::Long, &name.into(), &description.into(), &unit.into(), Advice::default());
        UpDownCounter { storages, _marker: PhantomData }
    }

    pub fn f64_up_down_counter(&self, name: impl Into<String>, description: impl Into<String>, unit: impl Into<String>) -> UpDownCounter<f64> {
        let storages = self.build_sync_storages(InstrumentType::UpDownCounter, InstrumentValueType::Double, &name.into(), &description.into(), &unit.into(), Advice::default());
        UpDownCounter { storages, _marker: PhantomData }
    }

    pub fn f64_histogram(&self, name: impl Into<String>, description: impl Into<String>, unit: impl Into<String>, boundaries: Option<Arc<[f64]>>) -> Histogram<f64> {
        let advice = Advice { explicit_bucket_boundaries: boundaries };
        let storages = self.build_sync_storages(InstrumentType::Histogram, InstrumentValueType::Double, &name.into(), &description.into(), &unit.into(), advice);
        Histogram { storages, _marker: PhantomData }
    }

    fn build_async_storages(&self, kind: InstrumentType, value_type: InstrumentValueType, name: &str, description: &str, unit: &str) -> (InstrumentDescriptor, Arc<Vec<Arc<dyn AsyncMetricStorage>>>) {
        let descriptor = InstrumentDescriptor::new(name.to_owned(), kind, value_type).with_description(description.to_owned()).with_unit(unit.to_owned());
        self.state.register_instrument(descriptor.identity_key());

        let mut storages: Vec<Arc<dyn AsyncMetricStorage>> = Vec::new();
        for pipeline in &self.state.pipelines {
            for view in pipeline.view_registry.find_views(&descriptor, &self.scope) {
                let aggregation = view.aggregation.resolve(kind, &descriptor.advice);
                if !aggregation.is_compatible_with(kind) {
                    otel_api::otel_warn!(name: "Meter.IncompatibleAggregation", instrument = descriptor.name.as_ref());
                    continue;
                }
                let storage = Arc::new(super::storage::AsynchronousMetricStorage::new(
                    descriptor.clone(),
                    aggregation,
                    pipeline.temporality,
                    view.cardinality_limit,
                    view.attributes_processor.clone(),
                    AttributeLimits::default(),
                ));
                pipeline.register_storage(self.scope.clone(), storage.clone() as Arc<dyn MetricStorage>);
                storages.push(storage as Arc<dyn AsyncMetricStorage>);
            }
        }
        (descriptor, Arc::new(storages))
    }

    /// Registers `callback` to run once per collection cycle, reporting
    /// observations for `handle`. Returns a token that can later unregister it.
    pub fn register_callback<T: Number>(&self, handle: &ObservableHandle<T>, callback: impl Fn() -> Vec<Observation<T>> + Send + Sync + 'static) -> super::meter_provider::CallbackRegistration {
        let id = self.state.next_callback_id();
        let mut pipelines_used = Vec::new();
        let callback = Arc::new(callback);
        for pipeline in &self.state.pipelines {
            let storages = handle.storages.clone();
            let callback = callback.clone();
            pipeline.register_callback(
                id,
                Box::new(move || {
                    let observations = (*callback)();
                    for observation in observations {
                        let measurement = observation.value.into_measurement();
                        for storage in storages.iter() {
                            storage.record_observation(measurement, observation.attributes.clone());
                        }
                    }
                }),
            );
            pipelines_used.push(pipeline.clone());
        }
        super::meter_provider::CallbackRegistration::new(pipelines_used, id)
    }

    pub fn i64_observable_counter(&self, name: impl Into<String>, description: impl Into<String>, unit: impl Into<String>) -> ObservableHandle<i64> {
        let (_, storages) = self.build_async_storages(InstrumentType::ObservableCounter, InstrumentValueType::Long, &name.into(), &description.into(), &unit.into());
        ObservableHandle { storages, _marker: PhantomData }
    }

    pub fn f64_observable_counter(&self, name: impl Into<String>, description: impl Into<String>, unit: impl Into<String>) -> ObservableHandle<f64> {
        let (_, storages) = self.build_async_storages(InstrumentType::ObservableCounter, InstrumentValueType::Double, &name.into(), &description.into(), &unit.into());
        ObservableHandle { storages, _marker: PhantomData }
    }

    pub fn i64_observable_up_down_counter(&self, name: impl Into<String>, description: impl Into<String>, unit: impl Into<String>) -> ObservableHandle<i64> {
        let (_, storages) = self.build_async_storages(InstrumentType::ObservableUpDownCounter, InstrumentValueType::Long, &name.into(), &description.into(), &unit.into());
        ObservableHandle { storages, _marker: PhantomData }
    }

    pub fn i64_observable_gauge(&self, name: impl Into<String>, description: impl Into<String>, unit: impl Into<String>) -> ObservableHandle<i64> {
        let (_, storages) = self.build_async_storages(InstrumentType::ObservableGauge, InstrumentValueType::Long, &name.into(), &description.into(), &unit.into());
        ObservableHandle { storages, _marker: PhantomData }
    }

    pub fn f64_observable_gauge(&self, name: impl Into<String>, description: impl Into<String>, unit: impl Into<String>) -> ObservableHandle<f64> {
        let (_, storages) = self.build_async_storages(InstrumentType::ObservableGauge, InstrumentValueType::Double, &name.into(), &description.into(), &unit.into());
        ObservableHandle { storages, _marker: PhantomData }
    }
}
