//! Metric instrument creation and the collection pipeline that turns
//! recorded measurements into exported [`MetricData`] (§3, §4.2, §4.4).
//!
//! A [`MeterProvider`] owns one [`Pipeline`](meter_provider::Pipeline) per
//! registered [`MetricReader`], each with its own view registry and
//! temporality; [`Meter`]s create one [`storage::MetricStorage`] per
//! `(pipeline, matching view)` pair for every instrument.

mod aggregation;
mod data;
mod exemplar;
mod exporter;
mod internal;
mod meter;
mod meter_provider;
mod periodic_reader;
mod reader;
mod storage;
mod view;

pub use aggregation::Aggregation;
pub use data::{AggregationTemporality, Exemplar, MeasurementValue, MetricData, MetricPoint, PointValue};
pub use exemplar::{ExemplarFilter, ExemplarReservoir, FixedSizeExemplarReservoir, HistogramBucketExemplarReservoir};
pub use exporter::MetricExporter;
pub use meter::{Counter, Histogram, Meter, Number, Observation, ObservableHandle, UpDownCounter};
pub use meter_provider::{CallbackRegistration, MeterProvider, MeterProviderBuilder};
pub use periodic_reader::{PeriodicMetricReader, PeriodicMetricReaderBuilder};
pub use reader::{MetricProducer, MetricReader};
pub use view::{AllowListAttributesProcessor, AttributesProcessor, InstrumentSelector, NoopAttributesProcessor, View, ViewBuilder, ViewRegistry, DEFAULT_CARDINALITY_LIMIT};
