//! The per-instrumentation-scope handle instrumented code calls to start spans.

use crate::resource::Resource;
use crate::scope::InstrumentationScope;
use crate::trace::sampler::{Sampler, SamplingDecision};
use crate::trace::span::{Span, SpanLimits};
use crate::trace::span_processor::SpanProcessor;
use otel_api::trace::{Link, SpanContext, SpanId, SpanKind, TraceFlags, TraceId, TraceState};
use otel_api::KeyValue;
use rand::RngCore;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::SystemTime;

/// Starts spans for one instrumentation scope. Cheap to clone: everything it
/// holds is shared with the [`TracerProvider`](super::TracerProvider) that built it.
#[derive(Clone, Debug)]
pub struct Tracer {
    pub(crate) scope: Arc<InstrumentationScope>,
    pub(crate) resource: Arc<Resource>,
    pub(crate) sampler: Arc<dyn Sampler>,
    pub(crate) span_limits: SpanLimits,
    pub(crate) processors: Arc<Vec<Arc<dyn SpanProcessor>>>,
}

impl Tracer {
    /// Starts an `Internal`-kind span as a child of the ambient current context.
    pub fn start(&self, name: impl Into<Cow<'static, str>>) -> Span {
        self.start_with(name, SpanKind::Internal, Vec::new(), Vec::new())
    }

    /// Starts a span with an explicit kind, start-time attributes, and links.
    /// Implements the §4.1 span-start algorithm: parent resolution from the
    /// ambient context, sampling, and context construction.
    pub fn start_with(&self, name: impl Into<Cow<'static, str>>, kind: SpanKind, attributes: Vec<KeyValue>, links: Vec<Link>) -> Span {
        let name = name.into();
        let parent = otel_api::context::current();
        let parent_ref = parent.as_ref();

        let trace_id = parent_ref.filter(|p| p.is_valid()).map(|p| p.trace_id()).unwrap_or_else(random_trace_id);
        let span_id = random_span_id();

        let result = self.sampler.should_sample(parent_ref, trace_id, &name, kind, &attributes);
        let sampled = matches!(result.decision, SamplingDecision::RecordAndSample);
        let trace_flags = TraceFlags::NOT_SAMPLED.with_sampled(sampled);

        let span_context = SpanContext::new(trace_id, span_id, trace_flags, false, result.trace_state);
        let parent_span_context = parent.unwrap_or(SpanContext::NONE);

        let mut all_attributes = attributes;
        all_attributes.extend(result.attributes);

        for processor in self.processors.iter() {
            processor.on_start(&span_context);
        }

        Span::new(
            span_context,
            parent_span_context,
            name,
            kind,
            SystemTime::now(),
            all_attributes,
            links,
            self.span_limits,
            self.resource.clone(),
            self.scope.clone(),
            self.processors.clone(),
        )
    }
}

fn random_trace_id() -> TraceId {
    let mut rng = rand::thread_rng();
    loop {
        let mut bytes = [0u8; 16];
        rng.fill_bytes(&mut bytes);
        let id = TraceId::from_bytes(bytes);
        if id != TraceId::INVALID {
            return id;
        }
    }
}

fn random_span_id() -> SpanId {
    let mut rng = rand::thread_rng();
    loop {
        let mut bytes = [0u8; 8];
        rng.fill_bytes(&mut bytes);
        let id = SpanId::from_bytes(bytes);
        if id != SpanId::INVALID {
            return id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::sampler::{AlwaysOff, AlwaysOn};

    fn tracer(sampler: Arc<dyn Sampler>) -> Tracer {
        Tracer {
            scope: Arc::new(InstrumentationScope::new("test")),
            resource: Arc::new(Resource::empty()),
            sampler,
            span_limits: SpanLimits::default(),
            processors: Arc::new(Vec::new()),
        }
    }

    #[test]
    fn always_on_sampler_produces_a_sampled_valid_context() {
        let t = tracer(Arc::new(AlwaysOn));
        let span = t.start("op");
        assert!(span.span_context().is_valid());
        assert!(span.span_context().is_sampled());
    }

    #[test]
    fn always_off_sampler_produces_a_valid_but_unsampled_context() {
        let t = tracer(Arc::new(AlwaysOff));
        let span = t.start("op");
        assert!(span.span_context().is_valid());
        assert!(!span.span_context().is_sampled());
    }

    #[test]
    fn child_span_inherits_trace_id_from_ambient_parent() {
        let t = tracer(Arc::new(AlwaysOn));
        let parent = t.start("parent");
        let parent_cx = parent.span_context().clone();
        let _guard = otel_api::context::attach(parent_cx.clone());
        let child = t.start("child");
        assert_eq!(child.span_context().trace_id(), parent_cx.trace_id());
        assert_eq!(child.end().parent_span_context.span_id(), parent_cx.span_id());
    }
}
