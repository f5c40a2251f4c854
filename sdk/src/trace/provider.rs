//! Builds [`Tracer`]s sharing one resource, sampler, and set of span processors.

use crate::resource::Resource;
use crate::scope::InstrumentationScope;
use crate::trace::sampler::{ParentBased, Sampler};
use crate::trace::span::SpanLimits;
use crate::trace::span_processor::SpanProcessor;
use crate::trace::tracer::Tracer;
use otel_api::otel_info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::SdkResult;

/// Owns the registered span processors and hands out [`Tracer`]s that share
/// them. `shutdown()` is idempotent and shuts every processor down in
/// registration order; later `tracer()` calls after shutdown still return a
/// usable (but inert, since processors are shut down) tracer rather than panicking.
#[derive(Debug)]
pub struct TracerProvider {
    resource: Arc<Resource>,
    sampler: Arc<dyn Sampler>,
    span_limits: SpanLimits,
    processors: Arc<Vec<Arc<dyn SpanProcessor>>>,
    is_shutdown: AtomicBool,
}

impl TracerProvider {
    pub fn builder() -> TracerProviderBuilder {
        TracerProviderBuilder::default()
    }

    /// Returns a tracer for the given instrumentation scope. Tracers for the
    /// same scope returned from the same provider are functionally
    /// interchangeable; the SDK does not cache or deduplicate them.
    pub fn tracer(&self, scope: InstrumentationScope) -> Tracer {
        Tracer {
            scope: Arc::new(scope),
            resource: self.resource.clone(),
            sampler: self.sampler.clone(),
            span_limits: self.span_limits,
            processors: self.processors.clone(),
        }
    }

    pub fn tracer_named(&self, name: impl Into<Arc<str>>) -> Tracer {
        self.tracer(InstrumentationScope::new(name))
    }

    /// Flushes every registered processor, in registration order, stopping at
    /// (but still attempting) the rest on the first error and returning it.
    pub fn force_flush(&self) -> SdkResult<()> {
        let mut first_err = None;
        for processor in self.processors.iter() {
            if let Err(err) = processor.force_flush() {
                otel_info!(name: "TracerProvider.ForceFlushFailed", error = format!("{err}"));
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Shuts every registered processor down, in registration order.
    /// Idempotent: calling this more than once is a no-op after the first call.
    pub fn shutdown(&self) -> SdkResult<()> {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut first_err = None;
        for processor in self.processors.iter() {
            if let Err(err) = processor.shutdown() {
                otel_info!(name: "TracerProvider.ShutdownFailed", error = format!("{err}"));
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

/// Assembles a [`TracerProvider`]. Processors are registered in call order
/// and every sampled span is observed by all of them.
pub struct TracerProviderBuilder {
    resource: Resource,
    sampler: Arc<dyn Sampler>,
    span_limits: SpanLimits,
    processors: Vec<Arc<dyn SpanProcessor>>,
}

impl Default for TracerProviderBuilder {
    fn default() -> Self {
        TracerProviderBuilder {
            resource: Resource::empty(),
            sampler: Arc::new(ParentBased::new(Box::new(crate::trace::sampler::AlwaysOn))),
            span_limits: SpanLimits::default(),
            processors: Vec::new(),
        }
    }
}

impl TracerProviderBuilder {
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = resource;
        self
    }

    pub fn with_sampler(mut self, sampler: impl Sampler + 'static) -> Self {
        self.sampler = Arc::new(sampler);
        self
    }

    pub fn with_span_limits(mut self, limits: SpanLimits) -> Self {
        self.span_limits = limits;
        self
    }

    pub fn with_span_processor(mut self, processor: impl SpanProcessor + 'static) -> Self {
        self.processors.push(Arc::new(processor));
        self
    }

    pub fn build(self) -> TracerProvider {
        TracerProvider {
            resource: Arc::new(self.resource),
            sampler: self.sampler,
            span_limits: self.span_limits,
            processors: Arc::new(self.processors),
            is_shutdown: AtomicBool::new(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SdkResult as Result;
    use crate::trace::span::SpanData;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingExporter {
        exported: Arc<Mutex<Vec<SpanData>>>,
    }

    #[async_trait]
    impl crate::export::SpanExporter for RecordingExporter {
        async fn export(&self, batch: Vec<SpanData>) -> Result<()> {
            self.exported.lock().unwrap().extend(batch);
            Ok(())
        }
    }

    #[test]
    fn end_to_end_span_reaches_the_exporter() {
        let exported = Arc::new(Mutex::new(Vec::new()));
        let exporter = RecordingExporter { exported: exported.clone() };
        let processor = crate::trace::BatchSpanProcessor::builder(exporter).build();

        let provider = TracerProvider::builder().with_span_processor(processor).build();
        let tracer = provider.tracer_named("test");
        let span = tracer.start("op");
        span.end();

        provider.force_flush().unwrap();
        assert_eq!(exported.lock().unwrap().len(), 1);
        provider.shutdown().unwrap();
    }

    #[test]
    fn shutdown_is_idempotent_at_the_provider_level() {
        let provider = TracerProvider::builder().build();
        assert!(provider.shutdown().is_ok());
        assert!(provider.shutdown().is_ok());
    }
}
