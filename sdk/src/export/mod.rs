//! The interface the core uses to hand finished span batches to a sink.
//!
//! Concrete wire encoders (OTLP, Jaeger, Zipkin, ...) are out of scope (§1):
//! the core only depends on this trait.

use crate::error::SdkResult;
use crate::trace::SpanData;
use async_trait::async_trait;
use std::fmt::Debug;

/// A sink for finished, sampled spans.
///
/// `export` is never called concurrently for the same exporter instance --
/// the batch processor serializes calls on its single worker thread.
#[async_trait]
pub trait SpanExporter: Send + Sync + Debug {
    /// Exports a batch. Implementations must respect their own internal
    /// timeout and return `Err` on failure rather than blocking indefinitely;
    /// retrying is the exporter's responsibility, not the processor's.
    async fn export(&self, batch: Vec<SpanData>) -> SdkResult<()>;

    /// Hint to flush any buffering the exporter itself performs. Default is a no-op.
    async fn force_flush(&self) -> SdkResult<()> {
        Ok(())
    }

    /// Called at most once, after the processor has stopped sending new batches.
    async fn shutdown(&self) -> SdkResult<()> {
        Ok(())
    }
}

/// Forwards to the wrapped exporter, so a shared handle (e.g. a trait object
/// resolved at runtime by an SPI registry, or a concrete exporter also held
/// elsewhere) can be passed anywhere a concrete `SpanExporter` is expected.
#[async_trait]
impl<T: SpanExporter + ?Sized> SpanExporter for std::sync::Arc<T> {
    async fn export(&self, batch: Vec<SpanData>) -> SdkResult<()> {
        (**self).export(batch).await
    }
    async fn force_flush(&self) -> SdkResult<()> {
        (**self).force_flush().await
    }
    async fn shutdown(&self) -> SdkResult<()> {
        (**self).shutdown().await
    }
}
