//! The interface a [`PeriodicMetricReader`](super::PeriodicMetricReader) uses
//! to hand collected metric batches to a sink (§6).
//!
//! Concrete wire encoders (OTLP, Prometheus, ...) are out of scope (§1): the
//! core only depends on this trait.

use super::data::{AggregationTemporality, MetricData};
use crate::error::SdkResult;
use async_trait::async_trait;
use otel_api::metrics::InstrumentType;
use std::fmt::Debug;

/// A sink for collected metric data.
///
/// `export` is never called concurrently for the same exporter instance --
/// the periodic reader serializes calls on its single worker thread.
#[async_trait]
pub trait MetricExporter: Send + Sync + Debug {
    /// Exports one collection's worth of metric data, one entry per instrument.
    async fn export(&self, batch: Vec<MetricData>) -> SdkResult<()>;

    /// The temporality this exporter wants for a given instrument kind.
    /// Default matches the common OTLP default: cumulative for everything.
    /// A delta-preferring exporter (e.g. a push backend with its own
    /// windowing) overrides this per instrument kind.
    fn preferred_temporality(&self, _kind: InstrumentType) -> AggregationTemporality {
        AggregationTemporality::Cumulative
    }

    /// Hint to flush any buffering the exporter itself performs. Default is a no-op.
    async fn force_flush(&self) -> SdkResult<()> {
        Ok(())
    }

    /// Called at most once, after the reader has stopped sending new batches.
    async fn shutdown(&self) -> SdkResult<()> {
        Ok(())
    }
}

/// Forwards to the wrapped exporter, so a shared handle (e.g. a trait object
/// resolved at runtime by an SPI registry, or a concrete exporter also held
/// elsewhere) can be passed anywhere a concrete `MetricExporter` is expected.
#[async_trait]
impl<T: MetricExporter + ?Sized> MetricExporter for std::sync::Arc<T> {
    async fn export(&self, batch: Vec<MetricData>) -> SdkResult<()> {
        (**self).export(batch).await
    }
    fn preferred_temporality(&self, kind: InstrumentType) -> AggregationTemporality {
        (**self).preferred_temporality(kind)
    }
    async fn force_flush(&self) -> SdkResult<()> {
        (**self).force_flush().await
    }
    async fn shutdown(&self) -> SdkResult<()> {
        (**self).shutdown().await
    }
}
