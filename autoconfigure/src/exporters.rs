//! Stand-in exporters for the one wire protocol autoconfigure wires up by
//! default (`otlp`) and for the explicit `none` sink.
//!
//! Wire-format encoders are out of scope for the core (§1 Non-goals): "the
//! core sees exporters only as an interface that accepts a batch and
//! returns an async result." These types satisfy that interface without
//! performing real gRPC/protobuf encoding, so the default autoconfigure
//! wiring (testable property #15) is exercisable end-to-end; a production
//! build would swap them for a real `opentelemetry-otlp`-style crate
//! registered under the same SPI name.

use async_trait::async_trait;
use otel_api::metrics::InstrumentType;
use otel_sdk::error::SdkResult;
use otel_sdk::export::SpanExporter;
use otel_sdk::metrics::{AggregationTemporality, MetricData, MetricExporter};
use otel_sdk::trace::SpanData;

/// Placeholder OTLP/gRPC span exporter: accepts batches and reports success
/// without sending anything anywhere (see module docs).
#[derive(Debug, Default)]
pub struct OtlpGrpcSpanExporter {
    pub endpoint: String,
}

#[async_trait]
impl SpanExporter for OtlpGrpcSpanExporter {
    async fn export(&self, batch: Vec<SpanData>) -> SdkResult<()> {
        otel_api::otel_debug!(name: "OtlpGrpcSpanExporter.Export", endpoint = self.endpoint.as_str(), count = batch.len());
        Ok(())
    }
}

/// Placeholder OTLP/gRPC metric exporter; see [`OtlpGrpcSpanExporter`].
#[derive(Debug, Default)]
pub struct OtlpGrpcMetricExporter {
    pub endpoint: String,
}

#[async_trait]
impl MetricExporter for OtlpGrpcMetricExporter {
    async fn export(&self, batch: Vec<MetricData>) -> SdkResult<()> {
        otel_api::otel_debug!(name: "OtlpGrpcMetricExporter.Export", endpoint = self.endpoint.as_str(), count = batch.len());
        Ok(())
    }

    fn preferred_temporality(&self, _kind: InstrumentType) -> AggregationTemporality {
        AggregationTemporality::Cumulative
    }
}

/// The `none` span sink: drops every batch, used when `otel.traces.exporter=none`.
#[derive(Debug, Default)]
pub struct NoopSpanExporter;

#[async_trait]
impl SpanExporter for NoopSpanExporter {
    async fn export(&self, _batch: Vec<SpanData>) -> SdkResult<()> {
        Ok(())
    }
}

/// The `none` metric sink; see [`NoopSpanExporter`].
#[derive(Debug, Default)]
pub struct NoopMetricExporter;

#[async_trait]
impl MetricExporter for NoopMetricExporter {
    async fn export(&self, _batch: Vec<MetricData>) -> SdkResult<()> {
        Ok(())
    }
}
