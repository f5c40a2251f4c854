//! The sampler interface consulted when a span starts.
//!
//! Concrete algorithms beyond the always-on/always-off/parent-based trio are
//! out of scope here (§1); third-party samplers plug in through this trait
//! the same way the built-ins do.

use otel_api::trace::{SpanContext, SpanKind, TraceId, TraceState};
use otel_api::KeyValue;

/// Whether, and how, a span should be recorded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplingDecision {
    /// The span is not recorded and its context is not sampled.
    Drop,
    /// The span is recorded locally but the sampled flag is not set on its context.
    RecordOnly,
    /// The span is recorded and its context's sampled flag is set, so children
    /// and the exported context propagate the decision downstream.
    RecordAndSample,
}

/// The outcome of a sampling decision: the decision itself, attributes to
/// attach to the span as a result (e.g. the sampling probability), and the
/// trace state to carry forward.
#[derive(Clone, Debug)]
pub struct SamplingResult {
    pub decision: SamplingDecision,
    pub attributes: Vec<KeyValue>,
    pub trace_state: TraceState,
}

/// Decides whether a new span should be recorded and/or sampled.
///
/// Invoked once, synchronously, when a span is started -- never after.
pub trait Sampler: Send + Sync + std::fmt::Debug {
    #[allow(clippy::too_many_arguments)]
    fn should_sample(
        &self,
        parent_context: Option<&SpanContext>,
        trace_id: TraceId,
        name: &str,
        kind: SpanKind,
        attributes: &[KeyValue],
    ) -> SamplingResult;

    /// A short, stable description used in provider debug output.
    fn description(&self) -> String;
}

/// Forwards to the wrapped sampler, so a shared handle (e.g. a trait object
/// resolved at runtime by an SPI registry, or a concrete sampler also held
/// elsewhere) can be passed anywhere a concrete `Sampler` is expected.
impl<T: Sampler + ?Sized> Sampler for std::sync::Arc<T> {
    fn should_sample(&self, parent_context: Option<&SpanContext>, trace_id: TraceId, name: &str, kind: SpanKind, attributes: &[KeyValue]) -> SamplingResult {
        (**self).should_sample(parent_context, trace_id, name, kind, attributes)
    }

    fn description(&self) -> String {
        (**self).description()
    }
}

/// Always records and samples, regardless of parent.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysOn;

impl Sampler for AlwaysOn {
    fn should_sample(&self, _: Option<&SpanContext>, _: TraceId, _: &str, _: SpanKind, _: &[KeyValue]) -> SamplingResult {
        SamplingResult { decision: SamplingDecision::RecordAndSample, attributes: vec![], trace_state: TraceState::NONE }
    }

    fn description(&self) -> String {
        "AlwaysOnSampler".into()
    }
}

/// Never records or samples, regardless of parent.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysOff;

impl Sampler for AlwaysOff {
    fn should_sample(&self, _: Option<&SpanContext>, _: TraceId, _: &str, _: SpanKind, _: &[KeyValue]) -> SamplingResult {
        SamplingResult { decision: SamplingDecision::Drop, attributes: vec![], trace_state: TraceState::NONE }
    }

    fn description(&self) -> String {
        "AlwaysOffSampler".into()
    }
}

/// Samples a fixed fraction of root spans by hashing the trace id; non-root
/// spans are delegated to the root's sampling decision via [`ParentBased`]
/// rather than re-sampled independently.
#[derive(Clone, Debug)]
pub struct TraceIdRatioBased {
    ratio: f64,
    threshold: u64,
}

impl TraceIdRatioBased {
    pub fn new(ratio: f64) -> Self {
        let ratio = ratio.clamp(0.0, 1.0);
        let threshold = (ratio * u64::MAX as f64) as u64;
        TraceIdRatioBased { ratio, threshold }
    }
}

impl Sampler for TraceIdRatioBased {
    fn should_sample(&self, _: Option<&SpanContext>, trace_id: TraceId, _: &str, _: SpanKind, _: &[KeyValue]) -> SamplingResult {
        let bytes = trace_id.to_bytes();
        let low8: [u8; 8] = bytes[8..16].try_into().unwrap();
        let candidate = u64::from_be_bytes(low8);
        let decision = if candidate < self.threshold || self.ratio >= 1.0 { SamplingDecision::RecordAndSample } else { SamplingDecision::Drop };
        SamplingResult { decision, attributes: vec![], trace_state: TraceState::NONE }
    }

    fn description(&self) -> String {
        format!("TraceIdRatioBased{{{}}}", self.ratio)
    }
}

/// Delegates to the parent's sampling decision when there is a valid parent,
/// otherwise falls back to a configured root sampler. This is the default
/// composition recommended by the spec for respecting upstream decisions.
#[derive(Debug)]
pub struct ParentBased {
    root: Box<dyn Sampler>,
}

impl ParentBased {
    pub fn new(root: Box<dyn Sampler>) -> Self {
        ParentBased { root }
    }
}

impl Sampler for ParentBased {
    fn should_sample(&self, parent_context: Option<&SpanContext>, trace_id: TraceId, name: &str, kind: SpanKind, attributes: &[KeyValue]) -> SamplingResult {
        match parent_context {
            Some(parent) if parent.is_valid() => {
                let decision = if parent.is_remote() {
                    if parent.is_sampled() { SamplingDecision::RecordAndSample } else { SamplingDecision::Drop }
                } else if parent.is_sampled() {
                    SamplingDecision::RecordAndSample
                } else {
                    SamplingDecision::Drop
                };
                SamplingResult { decision, attributes: vec![], trace_state: parent.trace_state().clone() }
            }
            _ => self.root.should_sample(parent_context, trace_id, name, kind, attributes),
        }
    }

    fn description(&self) -> String {
        format!("ParentBased{{root={}}}", self.root.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otel_api::trace::{SpanId, TraceFlags};

    fn trace_id() -> TraceId {
        TraceId::from_hex("5f467fe7bf42676c05e20ba4a90e448e").unwrap()
    }

    #[test]
    fn always_on_samples_without_a_parent() {
        let result = AlwaysOn.should_sample(None, trace_id(), "op", SpanKind::Internal, &[]);
        assert_eq!(result.decision, SamplingDecision::RecordAndSample);
    }

    #[test]
    fn always_off_never_samples() {
        let result = AlwaysOff.should_sample(None, trace_id(), "op", SpanKind::Internal, &[]);
        assert_eq!(result.decision, SamplingDecision::Drop);
    }

    #[test]
    fn ratio_zero_never_samples_ratio_one_always_samples() {
        let never = TraceIdRatioBased::new(0.0);
        let always = TraceIdRatioBased::new(1.0);
        assert_eq!(never.should_sample(None, trace_id(), "op", SpanKind::Internal, &[]).decision, SamplingDecision::Drop);
        assert_eq!(always.should_sample(None, trace_id(), "op", SpanKind::Internal, &[]).decision, SamplingDecision::RecordAndSample);
    }

    #[test]
    fn parent_based_respects_sampled_parent() {
        let sampler = ParentBased::new(Box::new(AlwaysOff));
        let parent = SpanContext::new(trace_id(), SpanId::from_hex("1").unwrap(), TraceFlags::SAMPLED, false, TraceState::NONE);
        let result = sampler.should_sample(Some(&parent), trace_id(), "op", SpanKind::Internal, &[]);
        assert_eq!(result.decision, SamplingDecision::RecordAndSample);
    }

    #[test]
    fn parent_based_falls_back_to_root_without_a_valid_parent() {
        let sampler = ParentBased::new(Box::new(AlwaysOn));
        let result = sampler.should_sample(Some(&SpanContext::NONE), trace_id(), "op", SpanKind::Internal, &[]);
        assert_eq!(result.decision, SamplingDecision::RecordAndSample);
    }
}
