//! Minimal ambient context carrying the current [`SpanContext`] across a
//! call chain, used only so the trace-based exemplar filter can tell
//! whether the measurement currently in flight belongs to a sampled span.
//!
//! Full context propagation (baggage, arbitrary typed entries, W3C
//! TraceContext wire format) is out of scope here; see §1 of the spec.

use std::cell::RefCell;

#[cfg(feature = "trace")]
use crate::trace::SpanContext;

#[cfg(feature = "trace")]
thread_local! {
    static CURRENT_SPAN_CONTEXT: RefCell<Option<SpanContext>> = const { RefCell::new(None) };
}

/// RAII guard restoring the previous current span context on drop.
#[cfg(feature = "trace")]
pub struct ContextGuard {
    previous: Option<SpanContext>,
}

#[cfg(feature = "trace")]
impl Drop for ContextGuard {
    fn drop(&mut self) {
        CURRENT_SPAN_CONTEXT.with(|cell| *cell.borrow_mut() = self.previous.take());
    }
}

/// Makes `cx` the current span context for the duration of the returned guard.
#[cfg(feature = "trace")]
pub fn attach(cx: SpanContext) -> ContextGuard {
    let previous = CURRENT_SPAN_CONTEXT.with(|cell| cell.borrow_mut().replace(cx));
    ContextGuard { previous }
}

/// Returns the span context attached on this thread, if any.
#[cfg(feature = "trace")]
pub fn current() -> Option<SpanContext> {
    CURRENT_SPAN_CONTEXT.with(|cell| cell.borrow().clone())
}

#[cfg(all(test, feature = "trace"))]
mod tests {
    use super::*;
    use crate::trace::{SpanContext, TraceFlags, TraceId, SpanId, TraceState};

    #[test]
    fn attach_then_current_round_trips() {
        assert!(current().is_none());
        let cx = SpanContext::new(TraceId::from_hex("1").unwrap(), SpanId::from_hex("1").unwrap(), TraceFlags::SAMPLED, false, TraceState::NONE);
        let guard = attach(cx.clone());
        assert_eq!(current(), Some(cx));
        drop(guard);
        assert!(current().is_none());
    }
}
