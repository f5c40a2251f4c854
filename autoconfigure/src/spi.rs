//! Explicit plugin registry standing in for classpath-scanning SPI discovery
//! (§9 Design Notes: "replace source-ecosystem service loading with an
//! explicit plugin registry... populated by compile-time registration").
//!
//! Every extension point named in §6 is a named entry in a [`PluginRegistry`]:
//! callers register `Arc<dyn ...Provider>` implementations under a name,
//! and [`crate::build`] resolves `otel.*.exporter`/`otel.propagators`/etc.
//! csv entries against these maps.

use crate::config_properties::ConfigProperties;
use crate::error::ConfigurationResult;
use crate::exporters::{NoopMetricExporter, NoopSpanExporter, OtlpGrpcMetricExporter, OtlpGrpcSpanExporter};
use crate::propagation::{Propagator, W3cBaggagePropagator, W3cTraceContextPropagator};
use otel_sdk::export::SpanExporter;
use otel_sdk::metrics::MetricExporter;
use otel_sdk::metrics::MetricReader;
use otel_sdk::resource::{EnvResourceProvider, ResourceProvider};
use otel_sdk::trace::{AlwaysOff, AlwaysOn, ParentBased, Sampler, TraceIdRatioBased};
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves `otel.traces.exporter` entries (§6 `ConfigurableSpanExporterProvider`).
pub trait ConfigurableSpanExporterProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn create_exporter(&self, config: &ConfigProperties) -> ConfigurationResult<Arc<dyn SpanExporter>>;
}

/// Resolves `otel.metrics.exporter` entries that name a full exporter
/// (§6 `ConfigurableMetricExporterProvider`).
pub trait ConfigurableMetricExporterProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn create_exporter(&self, config: &ConfigProperties) -> ConfigurationResult<Arc<dyn MetricExporter>>;
}

/// Resolves `otel.metrics.exporter` entries that name a ready-made reader
/// rather than an exporter to wrap (e.g. `prometheus`) -- no
/// `PeriodicMetricReader` wrapping or `metricExporterCustomizer` application
/// happens for these (§9 Open Question, preserved from the source).
pub trait ConfigurableMetricReaderProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn create_reader(&self, config: &ConfigProperties) -> ConfigurationResult<Arc<dyn MetricReader>>;
}

/// Resolves the `otel.traces.sampler` entry (§6 `ConfigurableSamplerProvider`).
pub trait ConfigurableSamplerProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn create_sampler(&self, config: &ConfigProperties) -> ConfigurationResult<Arc<dyn Sampler>>;
}

/// Resolves `otel.propagators` entries (§6 `ConfigurablePropagatorProvider`).
pub trait ConfigurablePropagatorProvider: Send + Sync {
    fn name(&self) -> &'static str;
    fn create_propagator(&self, config: &ConfigProperties) -> ConfigurationResult<Arc<dyn Propagator>>;
}

/// A named collection of SPI providers. `register_defaults()` populates the
/// built-ins this crate ships (OTLP stand-ins, `none` sinks, the two W3C
/// propagator names, and the `env` resource provider); callers add more
/// with `with_*` before passing the registry to [`crate::build`].
#[derive(Default)]
pub struct PluginRegistry {
    span_exporters: HashMap<&'static str, Arc<dyn ConfigurableSpanExporterProvider>>,
    metric_exporters: HashMap<&'static str, Arc<dyn ConfigurableMetricExporterProvider>>,
    metric_readers: HashMap<&'static str, Arc<dyn ConfigurableMetricReaderProvider>>,
    samplers: HashMap<&'static str, Arc<dyn ConfigurableSamplerProvider>>,
    propagators: HashMap<&'static str, Arc<dyn ConfigurablePropagatorProvider>>,
    resource_providers: HashMap<&'static str, Arc<dyn ResourceProvider>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry autoconfigure uses when the caller supplies none of
    /// their own: `otlp` (stand-in), `none`, `tracecontext`/`baggage`, `env`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_span_exporter(Arc::new(OtlpSpanExporterProvider));
        registry.register_span_exporter(Arc::new(NoopSpanExporterProvider));
        registry.register_metric_exporter(Arc::new(OtlpMetricExporterProvider));
        registry.register_metric_exporter(Arc::new(NoopMetricExporterProvider));
        registry.register_propagator(Arc::new(TraceContextPropagatorProvider));
        registry.register_propagator(Arc::new(BaggagePropagatorProvider));
        registry.register_resource_provider(Arc::new(EnvResourceProvider));
        registry.register_sampler(Arc::new(AlwaysOnSamplerProvider));
        registry.register_sampler(Arc::new(AlwaysOffSamplerProvider));
        registry.register_sampler(Arc::new(ParentBasedAlwaysOnSamplerProvider));
        registry.register_sampler(Arc::new(TraceIdRatioSamplerProvider));
        registry.register_sampler(Arc::new(ParentBasedTraceIdRatioSamplerProvider));
        registry
    }

    pub fn register_span_exporter(&mut self, provider: Arc<dyn ConfigurableSpanExporterProvider>) {
        self.span_exporters.insert(provider.name(), provider);
    }
    pub fn register_metric_exporter(&mut self, provider: Arc<dyn ConfigurableMetricExporterProvider>) {
        self.metric_exporters.insert(provider.name(), provider);
    }
    pub fn register_metric_reader(&mut self, provider: Arc<dyn ConfigurableMetricReaderProvider>) {
        self.metric_readers.insert(provider.name(), provider);
    }
    pub fn register_sampler(&mut self, provider: Arc<dyn ConfigurableSamplerProvider>) {
        self.samplers.insert(provider.name(), provider);
    }
    pub fn register_propagator(&mut self, provider: Arc<dyn ConfigurablePropagatorProvider>) {
        self.propagators.insert(provider.name(), provider);
    }
    pub fn register_resource_provider(&mut self, provider: Arc<dyn ResourceProvider>) {
        self.resource_providers.insert(provider.name(), provider);
    }

    pub fn span_exporter(&self, name: &str) -> Option<&Arc<dyn ConfigurableSpanExporterProvider>> {
        self.span_exporters.get(name)
    }
    pub fn metric_exporter(&self, name: &str) -> Option<&Arc<dyn ConfigurableMetricExporterProvider>> {
        self.metric_exporters.get(name)
    }
    pub fn metric_reader(&self, name: &str) -> Option<&Arc<dyn ConfigurableMetricReaderProvider>> {
        self.metric_readers.get(name)
    }
    pub fn sampler(&self, name: &str) -> Option<&Arc<dyn ConfigurableSamplerProvider>> {
        self.samplers.get(name)
    }
    pub fn propagator(&self, name: &str) -> Option<&Arc<dyn ConfigurablePropagatorProvider>> {
        self.propagators.get(name)
    }

    pub fn resource_providers(&self) -> impl Iterator<Item = &Arc<dyn ResourceProvider>> {
        self.resource_providers.values()
    }
}

struct OtlpSpanExporterProvider;
impl ConfigurableSpanExporterProvider for OtlpSpanExporterProvider {
    fn name(&self) -> &'static str {
        "otlp"
    }
    fn create_exporter(&self, config: &ConfigProperties) -> ConfigurationResult<Arc<dyn SpanExporter>> {
        let endpoint = config.get_string_or("otel.exporter.otlp.traces.endpoint", "http://localhost:4317").to_owned();
        Ok(Arc::new(OtlpGrpcSpanExporter { endpoint }))
    }
}

struct NoopSpanExporterProvider;
impl ConfigurableSpanExporterProvider for NoopSpanExporterProvider {
    fn name(&self) -> &'static str {
        "none"
    }
    fn create_exporter(&self, _config: &ConfigProperties) -> ConfigurationResult<Arc<dyn SpanExporter>> {
        Ok(Arc::new(NoopSpanExporter))
    }
}

struct OtlpMetricExporterProvider;
impl ConfigurableMetricExporterProvider for OtlpMetricExporterProvider {
    fn name(&self) -> &'static str {
        "otlp"
    }
    fn create_exporter(&self, config: &ConfigProperties) -> ConfigurationResult<Arc<dyn MetricExporter>> {
        let endpoint = config.get_string_or("otel.exporter.otlp.metrics.endpoint", "http://localhost:4317").to_owned();
        Ok(Arc::new(OtlpGrpcMetricExporter { endpoint }))
    }
}

struct NoopMetricExporterProvider;
impl ConfigurableMetricExporterProvider for NoopMetricExporterProvider {
    fn name(&self) -> &'static str {
        "none"
    }
    fn create_exporter(&self, _config: &ConfigProperties) -> ConfigurationResult<Arc<dyn MetricExporter>> {
        Ok(Arc::new(NoopMetricExporter))
    }
}

struct AlwaysOnSamplerProvider;
impl ConfigurableSamplerProvider for AlwaysOnSamplerProvider {
    fn name(&self) -> &'static str {
        "always_on"
    }
    fn create_sampler(&self, _config: &ConfigProperties) -> ConfigurationResult<Arc<dyn Sampler>> {
        Ok(Arc::new(AlwaysOn))
    }
}

struct AlwaysOffSamplerProvider;
impl ConfigurableSamplerProvider for AlwaysOffSamplerProvider {
    fn name(&self) -> &'static str {
        "always_off"
    }
    fn create_sampler(&self, _config: &ConfigProperties) -> ConfigurationResult<Arc<dyn Sampler>> {
        Ok(Arc::new(AlwaysOff))
    }
}

struct ParentBasedAlwaysOnSamplerProvider;
impl ConfigurableSamplerProvider for ParentBasedAlwaysOnSamplerProvider {
    fn name(&self) -> &'static str {
        "parentbased_always_on"
    }
    fn create_sampler(&self, _config: &ConfigProperties) -> ConfigurationResult<Arc<dyn Sampler>> {
        Ok(Arc::new(ParentBased::new(Box::new(AlwaysOn))))
    }
}

struct TraceIdRatioSamplerProvider;
impl ConfigurableSamplerProvider for TraceIdRatioSamplerProvider {
    fn name(&self) -> &'static str {
        "traceidratio"
    }
    fn create_sampler(&self, config: &ConfigProperties) -> ConfigurationResult<Arc<dyn Sampler>> {
        let ratio = config.get_string_or("otel.traces.sampler.arg", "1.0").trim().parse().unwrap_or(1.0);
        Ok(Arc::new(TraceIdRatioBased::new(ratio)))
    }
}

struct ParentBasedTraceIdRatioSamplerProvider;
impl ConfigurableSamplerProvider for ParentBasedTraceIdRatioSamplerProvider {
    fn name(&self) -> &'static str {
        "parentbased_traceidratio"
    }
    fn create_sampler(&self, config: &ConfigProperties) -> ConfigurationResult<Arc<dyn Sampler>> {
        let ratio = config.get_string_or("otel.traces.sampler.arg", "1.0").trim().parse().unwrap_or(1.0);
        Ok(Arc::new(ParentBased::new(Box::new(TraceIdRatioBased::new(ratio)))))
    }
}

struct TraceContextPropagatorProvider;
impl ConfigurablePropagatorProvider for TraceContextPropagatorProvider {
    fn name(&self) -> &'static str {
        "tracecontext"
    }
    fn create_propagator(&self, _config: &ConfigProperties) -> ConfigurationResult<Arc<dyn Propagator>> {
        Ok(Arc::new(W3cTraceContextPropagator))
    }
}

struct BaggagePropagatorProvider;
impl ConfigurablePropagatorProvider for BaggagePropagatorProvider {
    fn name(&self) -> &'static str {
        "baggage"
    }
    fn create_propagator(&self, _config: &ConfigProperties) -> ConfigurationResult<Arc<dyn Propagator>> {
        Ok(Arc::new(W3cBaggagePropagator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_every_built_in_name() {
        let registry = PluginRegistry::with_defaults();
        assert!(registry.span_exporter("otlp").is_some());
        assert!(registry.span_exporter("none").is_some());
        assert!(registry.metric_exporter("otlp").is_some());
        assert!(registry.propagator("tracecontext").is_some());
        assert!(registry.propagator("baggage").is_some());
        assert!(registry.resource_providers().count() >= 1);
        assert!(registry.sampler("parentbased_always_on").is_some());
    }

    #[test]
    fn unknown_name_resolves_to_none() {
        let registry = PluginRegistry::with_defaults();
        assert!(registry.span_exporter("bogus").is_none());
    }
}
