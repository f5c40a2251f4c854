//! Deterministic, property-driven assembly of a [`TracerProvider`] and
//! [`MeterProvider`] from environment variables, explicit property
//! suppliers, and pluggable SPI providers (§4.5).
//!
//! [`TracerProvider`]: otel_sdk::trace::TracerProvider
//! [`MeterProvider`]: otel_sdk::metrics::MeterProvider
//!
//! [`AutoConfiguredSdkBuilder`] is the entry point: register property
//! suppliers and [`AutoConfigurationCustomizerProvider`]s, optionally swap in
//! a custom [`PluginRegistry`], then call
//! [`build`](AutoConfiguredSdkBuilder::build) to run the nine-step build
//! order and get back an [`AutoConfiguredSdk`].

mod build;
mod config_properties;
mod customizer;
mod error;
mod exporters;
mod propagation;
mod resource;
mod spi;

pub use build::{AutoConfiguredSdk, AutoConfiguredSdkBuilder};
pub use config_properties::{env_properties_from_process, ConfigProperties, ConfigPropertiesBuilder};
pub use customizer::{AutoConfigurationCustomizer, AutoConfigurationCustomizerProvider, CustomizerChain};
pub use error::{ConfigurationError, ConfigurationResult};
pub use exporters::{NoopMetricExporter, NoopSpanExporter, OtlpGrpcMetricExporter, OtlpGrpcSpanExporter};
pub use propagation::{Propagator, W3cBaggagePropagator, W3cTraceContextPropagator};
pub use resource::build_resource;
pub use spi::{
    ConfigurableMetricExporterProvider, ConfigurableMetricReaderProvider, ConfigurablePropagatorProvider, ConfigurableSamplerProvider,
    ConfigurableSpanExporterProvider, PluginRegistry,
};
