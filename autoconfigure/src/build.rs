//! The deterministic build sequence (§4.5 steps 1-9): merges properties,
//! applies customizer providers, assembles the resource, then the
//! MeterProvider, TracerProvider, and propagator set, tracking every
//! created `Closeable` so a configuration failure can unwind cleanly
//! (testable property #13).

use crate::config_properties::{env_properties_from_process, ConfigProperties};
use crate::customizer::{AutoConfigurationCustomizer, AutoConfigurationCustomizerProvider};
use crate::error::{ConfigurationError, ConfigurationResult};
use crate::propagation::Propagator;
use crate::resource::build_resource;
use crate::spi::PluginRegistry;
use otel_sdk::error::SdkResult;
use otel_sdk::metrics::{AggregationTemporality, ExemplarFilter, MetricExporter, MetricReader, PeriodicMetricReader};
use otel_sdk::resource::Resource;
use otel_sdk::trace::{BatchSpanProcessor, Sampler, TracerProvider};
use otel_sdk::metrics::{InstrumentSelector, MeterProvider, View};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_METRIC_EXPORT_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_CARDINALITY_LIMIT: i64 = 2000;

/// The assembled SDK: one tracer provider, one meter provider, and the
/// resolved propagator set, sharing one resource.
pub struct AutoConfiguredSdk {
    pub tracer_provider: Arc<TracerProvider>,
    pub meter_provider: Arc<MeterProvider>,
    pub propagators: Vec<Arc<dyn Propagator>>,
    pub resource: Resource,
}

impl AutoConfiguredSdk {
    /// Shuts both providers down. Each provider is independently idempotent
    /// (testable property #14); calling this more than once is safe.
    pub fn shutdown(&self) -> SdkResult<()> {
        let tracer_result = self.tracer_provider.shutdown();
        let meter_result = self.meter_provider.shutdown();
        tracer_result.and(meter_result)
    }
}

/// Assembles an [`AutoConfiguredSdk`] from layered properties and a plugin
/// registry (§4.5).
#[derive(Default)]
pub struct AutoConfiguredSdkBuilder {
    suppliers: Vec<HashMap<String, String>>,
    env: Option<HashMap<String, String>>,
    system_properties: HashMap<String, String>,
    customizer_providers: Vec<Arc<dyn AutoConfigurationCustomizerProvider>>,
    registry: Option<PluginRegistry>,
}

impl AutoConfiguredSdkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a property supplier; suppliers merge among themselves in
    /// registration order, later overriding earlier (§4.5 step 1).
    pub fn add_property_supplier(mut self, properties: HashMap<String, String>) -> Self {
        self.suppliers.push(properties);
        self
    }

    /// Overrides the environment layer. Defaults to the real process
    /// environment (`OTEL_*` variables) if never called.
    pub fn with_environment(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    /// Sets the system-properties layer, the highest explicit precedence tier.
    pub fn with_system_properties(mut self, properties: HashMap<String, String>) -> Self {
        self.system_properties = properties;
        self
    }

    pub fn add_customizer_provider(mut self, provider: Arc<dyn AutoConfigurationCustomizerProvider>) -> Self {
        self.customizer_providers.push(provider);
        self
    }

    /// Overrides the SPI plugin registry. Defaults to [`PluginRegistry::with_defaults`].
    pub fn with_registry(mut self, registry: PluginRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> ConfigurationResult<AutoConfiguredSdk> {
        let registry = self.registry.unwrap_or_else(PluginRegistry::with_defaults);

        // Step 1: merge property layers.
        let mut properties_builder = ConfigProperties::builder();
        for supplier in self.suppliers {
            properties_builder = properties_builder.with_supplier(supplier);
        }
        properties_builder = properties_builder.with_env(self.env.unwrap_or_else(env_properties_from_process));
        properties_builder = properties_builder.with_system_properties(self.system_properties);
        let base_config = properties_builder.build();

        // Step 2: apply AutoConfigurationCustomizerProviders, in order, into
        // one accumulator, then fold the properties chain's result back in.
        let mut customizer = AutoConfigurationCustomizer::default();
        for provider in &self.customizer_providers {
            provider.customize(&mut customizer);
        }
        let property_overrides = customizer.properties.apply(Vec::new(), &base_config);
        let config = base_config.overlay(property_overrides);

        // Every Closeable built so far; closed in reverse order if a later
        // step fails (§4.5 "Partial-failure semantics", testable property #13).
        let mut closers: Vec<Box<dyn FnOnce() -> SdkResult<()> + Send>> = Vec::new();

        let result = build_inner(&registry, &config, &customizer, &mut closers);
        if result.is_err() {
            for closer in closers.into_iter().rev() {
                let _ = closer();
            }
        }
        result
    }
}

fn build_inner(
    registry: &PluginRegistry,
    config: &ConfigProperties,
    customizer: &AutoConfigurationCustomizer,
    closers: &mut Vec<Box<dyn FnOnce() -> SdkResult<()> + Send>>,
) -> ConfigurationResult<AutoConfiguredSdk> {
    // Step 3: resource.
    let resource = build_resource(registry, config, &customizer.resource);

    // Step 4: short-circuit to an inert SDK.
    if config.get_bool("otel.sdk.disabled", false) {
        let tracer_provider = Arc::new(TracerProvider::builder().with_resource(resource.clone()).with_sampler(otel_sdk::trace::AlwaysOff).build());
        let meter_provider = Arc::new(MeterProvider::builder().with_resource(resource.clone()).build());
        return Ok(AutoConfiguredSdk { tracer_provider, meter_provider, propagators: Vec::new(), resource });
    }

    // Step 5: MeterProvider.
    let meter_provider = build_meter_provider(registry, config, customizer, &resource, closers)?;
    closers.push(Box::new({
        let provider = meter_provider.clone();
        move || provider.shutdown()
    }));

    // Step 6: TracerProvider.
    let tracer_provider = build_tracer_provider(registry, config, customizer, &resource, closers)?;
    closers.push(Box::new({
        let provider = tracer_provider.clone();
        move || provider.shutdown()
    }));

    // Step 7 (LoggerProvider) is out of scope (§1 Non-goals) -- no logger
    // pipeline is built here; see DESIGN.md.

    // Step 8: propagators.
    let propagators = build_propagators(registry, config, customizer)?;

    // Step 9: shutdown hook / global registration are host-application
    // concerns (§1 scope: "the core is a library"); left to the caller.

    Ok(AutoConfiguredSdk { tracer_provider, meter_provider, propagators, resource })
}

fn build_meter_provider(
    registry: &PluginRegistry,
    config: &ConfigProperties,
    customizer: &AutoConfigurationCustomizer,
    resource: &Resource,
    closers: &mut Vec<Box<dyn FnOnce() -> SdkResult<()> + Send>>,
) -> ConfigurationResult<Arc<MeterProvider>> {
    let exemplar_filter = match config.get_string_or("otel.metrics.exemplar.filter", "trace_based") {
        "always_on" => ExemplarFilter::AlwaysOn,
        "always_off" => ExemplarFilter::AlwaysOff,
        "trace_based" => ExemplarFilter::TraceBased,
        other => return Err(ConfigurationError::InvalidValue { key: "otel.metrics.exemplar.filter", reason: format!("unknown value '{other}'") }),
    };

    let cardinality_limit = config.get_int("otel.experimental.metrics.cardinality.limit", DEFAULT_CARDINALITY_LIMIT);
    if cardinality_limit < 1 {
        return Err(ConfigurationError::InvalidValue { key: "otel.experimental.metrics.cardinality.limit", reason: "must be >= 1".to_owned() });
    }

    let names = config.get_csv("otel.metrics.exporter").unwrap_or_else(|| vec!["otlp".to_owned()]);
    let export_interval = config.get_duration("otel.metric.export.interval", DEFAULT_METRIC_EXPORT_INTERVAL);

    let readers = resolve_metric_readers(registry, config, customizer, &names, export_interval, closers)?;

    let mut builder = MeterProvider::builder()
        .with_resource(resource.clone())
        .with_exemplar_filter(exemplar_filter)
        .with_view(View::builder(InstrumentSelector::default()).with_cardinality_limit(cardinality_limit as usize).build());
    for (reader, temporality) in readers {
        builder = builder.with_reader(reader, temporality);
    }
    builder = customizer.meter_provider.apply(builder, config);
    Ok(Arc::new(builder.build()))
}

fn resolve_metric_readers(
    registry: &PluginRegistry,
    config: &ConfigProperties,
    customizer: &AutoConfigurationCustomizer,
    names: &[String],
    export_interval: Duration,
    closers: &mut Vec<Box<dyn FnOnce() -> SdkResult<()> + Send>>,
) -> ConfigurationResult<Vec<(Arc<dyn MetricReader>, AggregationTemporality)>> {
    if names.iter().any(|n| n == "none") {
        if names.len() > 1 {
            return Err(ConfigurationError::MutuallyExclusive("otel.metrics.exporter=none"));
        }
        return Ok(Vec::new());
    }

    let mut readers = Vec::with_capacity(names.len());
    for name in names {
        if let Some(provider) = registry.metric_exporter(name) {
            let exporter = provider.create_exporter(config)?;
            let exporter = customizer.metric_exporter.apply(exporter, config);
            let temporality = exporter.preferred_temporality(otel_api::metrics::InstrumentType::Counter);
            // The reader owns its own worker thread and its own handle on the
            // exporter from the moment `.build()` returns, so the reader's
            // `shutdown` (which flushes and shuts the exporter down in turn)
            // is the Closeable to track here, not the bare exporter.
            let reader: Arc<dyn MetricReader> = Arc::new(PeriodicMetricReader::builder(exporter).with_interval(export_interval).build());
            closers.push(Box::new({
                let reader = reader.clone();
                move || reader.shutdown()
            }));
            readers.push((reader, temporality));
        } else if let Some(provider) = registry.metric_reader(name) {
            // A name resolving to a ready-made reader (e.g. `prometheus`) is
            // used directly: no PeriodicMetricReader wrapping and no
            // metricExporterCustomizer application (§9 Open Question,
            // preserved distinction).
            let reader = provider.create_reader(config)?;
            closers.push(Box::new({
                let reader = reader.clone();
                move || reader.shutdown()
            }));
            readers.push((reader, AggregationTemporality::Cumulative));
        } else {
            return Err(ConfigurationError::UnknownProvider { artifact: "metric exporter/reader", name: name.clone() });
        }
    }
    Ok(readers)
}

fn build_tracer_provider(
    registry: &PluginRegistry,
    config: &ConfigProperties,
    customizer: &AutoConfigurationCustomizer,
    resource: &Resource,
    closers: &mut Vec<Box<dyn FnOnce() -> SdkResult<()> + Send>>,
) -> ConfigurationResult<Arc<TracerProvider>> {
    let sampler_name = config.get_string_or("otel.traces.sampler", "parentbased_always_on");
    let sampler: Arc<dyn Sampler> = match registry.sampler(sampler_name) {
        Some(provider) => provider.create_sampler(config)?,
        None => return Err(ConfigurationError::UnknownProvider { artifact: "sampler", name: sampler_name.to_owned() }),
    };
    let sampler = customizer.sampler.apply(sampler, config);

    let names = config.get_csv("otel.traces.exporter").unwrap_or_else(|| vec!["otlp".to_owned()]);
    if names.iter().any(|n| n == "none") && names.len() > 1 {
        return Err(ConfigurationError::MutuallyExclusive("otel.traces.exporter=none"));
    }

    let mut builder = TracerProvider::builder().with_resource(resource.clone()).with_sampler(sampler);
    if !names.iter().any(|n| n == "none") {
        for name in &names {
            let provider = registry.span_exporter(name).ok_or_else(|| ConfigurationError::UnknownProvider { artifact: "span exporter", name: name.clone() })?;
            let exporter = provider.create_exporter(config)?;
            let exporter = customizer.span_exporter.apply(exporter, config);
            // The processor spawns its worker thread and takes its own
            // handle on the exporter inside `.build()`, before the provider
            // itself exists, so the processor's `shutdown` (which flushes
            // and shuts the exporter down in turn) is the Closeable to
            // track, not the bare exporter.
            let processor = Arc::new(BatchSpanProcessor::builder(exporter).build());
            closers.push(Box::new({
                let processor = processor.clone();
                move || processor.shutdown()
            }));
            builder = builder.with_span_processor(processor);
        }
    }

    builder = customizer.tracer_provider.apply(builder, config);
    Ok(Arc::new(builder.build()))
}

fn build_propagators(registry: &PluginRegistry, config: &ConfigProperties, customizer: &AutoConfigurationCustomizer) -> ConfigurationResult<Vec<Arc<dyn Propagator>>> {
    let names = config.get_csv("otel.propagators").unwrap_or_else(|| vec!["tracecontext".to_owned(), "baggage".to_owned()]);
    let mut propagators = Vec::with_capacity(names.len());
    for name in &names {
        let provider = registry.propagator(name).ok_or_else(|| ConfigurationError::UnknownProvider { artifact: "propagator", name: name.clone() })?;
        propagators.push(provider.create_propagator(config)?);
    }
    Ok(customizer.propagators.apply(propagators, config))
}
