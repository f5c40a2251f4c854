//! The tracing pipeline: live spans, batching/export, sampling, and the
//! tracer/provider that wire them together (§4.1).

mod provider;
mod sampler;
mod span;
mod span_processor;
mod tracer;

pub use provider::{TracerProvider, TracerProviderBuilder};
pub use sampler::{AlwaysOff, AlwaysOn, ParentBased, Sampler, SamplingDecision, SamplingResult, TraceIdRatioBased};
pub use span::{Span, SpanData, SpanEvents, SpanLimits, SpanLinks};
pub use span_processor::{BatchSpanProcessor, BatchSpanProcessorBuilder, SpanProcessor};
pub use tracer::Tracer;
