//! The live, mutable span and its frozen [`SpanData`] snapshot.
//!
//! A `Span` is exclusively owned by the thread that created it while it is
//! mutable; `end()` consumes it and hands an immutable `SpanData` to the
//! registered [`SpanProcessor`](super::SpanProcessor)s. That handoff is the
//! release boundary: everything recorded before `end()` is guaranteed
//! visible to processors (§5 ordering guarantees).

use crate::resource::Resource;
use crate::scope::InstrumentationScope;
use crate::trace::span_processor::SpanProcessor;
use otel_api::attributes::{AttributeLimits, AttributeSet};
use otel_api::trace::{Event, Link, SpanContext, SpanKind, Status};
use otel_api::KeyValue;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::SystemTime;

/// Caps on the number of attributes, events and links a span retains.
#[derive(Clone, Copy, Debug)]
pub struct SpanLimits {
    pub max_attributes_per_span: usize,
    pub max_events_per_span: usize,
    pub max_links_per_span: usize,
    pub max_attributes_per_event: usize,
    pub max_attributes_per_link: usize,
}

impl Default for SpanLimits {
    fn default() -> Self {
        SpanLimits {
            max_attributes_per_span: 128,
            max_events_per_span: 128,
            max_links_per_span: 128,
            max_attributes_per_event: 128,
            max_attributes_per_link: 128,
        }
    }
}

/// Events recorded on a span, with a count of events dropped once
/// `max_events_per_span` was reached.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpanEvents {
    pub events: Vec<Event>,
    pub dropped_count: u32,
}

/// Links recorded on a span, with a count of links dropped once
/// `max_links_per_span` was reached.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpanLinks {
    pub links: Vec<Link>,
    pub dropped_count: u32,
}

/// The live, mutable span. Owned by the tracer that started it until `end()`.
pub struct Span {
    span_context: SpanContext,
    parent_span_context: SpanContext,
    name: Cow<'static, str>,
    kind: SpanKind,
    start_time: SystemTime,
    end_time: Option<SystemTime>,
    attributes: Vec<KeyValue>,
    dropped_attributes_count: u32,
    events: SpanEvents,
    links: SpanLinks,
    status: Status,
    limits: SpanLimits,
    resource: Arc<Resource>,
    scope: Arc<InstrumentationScope>,
    processors: Arc<Vec<Arc<dyn SpanProcessor>>>,
}

impl Span {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        span_context: SpanContext,
        parent_span_context: SpanContext,
        name: Cow<'static, str>,
        kind: SpanKind,
        start_time: SystemTime,
        attributes: Vec<KeyValue>,
        links: Vec<Link>,
        limits: SpanLimits,
        resource: Arc<Resource>,
        scope: Arc<InstrumentationScope>,
        processors: Arc<Vec<Arc<dyn SpanProcessor>>>,
    ) -> Self {
        let set = AttributeSet::new(attributes, AttributeLimits { max_count: limits.max_attributes_per_span, max_string_length: None });
        let dropped_attributes_count = set.dropped_count();
        let (links, dropped_links) = bound(links, limits.max_links_per_span);

        Span {
            span_context,
            parent_span_context,
            name,
            kind,
            start_time,
            end_time: None,
            attributes: set.as_slice().to_vec(),
            dropped_attributes_count,
            events: SpanEvents::default(),
            links: SpanLinks { links, dropped_count: dropped_links },
            status: Status::Unset,
            limits,
            resource,
            scope,
            processors,
        }
    }

    pub fn span_context(&self) -> &SpanContext {
        &self.span_context
    }

    pub fn is_recording(&self) -> bool {
        self.end_time.is_none()
    }

    /// Adds an attribute, applying the span's attribute limit. No-op after `end()`.
    pub fn set_attribute(&mut self, kv: KeyValue) {
        if self.end_time.is_some() {
            return;
        }
        if self.attributes.len() >= self.limits.max_attributes_per_span {
            self.dropped_attributes_count += 1;
            return;
        }
        self.attributes.retain(|existing| existing.key != kv.key);
        self.attributes.push(kv);
    }

    /// Status may only move `Unset -> {Ok, Error}`; once `Ok`, further calls are ignored.
    pub fn set_status(&mut self, status: Status) {
        if self.end_time.is_some() || self.status == Status::Ok {
            return;
        }
        self.status = status;
    }

    pub fn add_event(&mut self, name: impl Into<Cow<'static, str>>, attributes: Vec<KeyValue>) {
        if self.end_time.is_some() {
            return;
        }
        if self.events.events.len() >= self.limits.max_events_per_span {
            self.events.dropped_count += 1;
            return;
        }
        let set = AttributeSet::new(attributes, AttributeLimits { max_count: self.limits.max_attributes_per_event, max_string_length: None });
        let dropped = set.dropped_count();
        self.events.events.push(Event::new(name, SystemTime::now(), set.as_slice().to_vec(), dropped));
    }

    /// Freezes the span and hands the resulting [`SpanData`] to every
    /// processor registered on the tracer that created it, in registration order.
    pub fn end(mut self) -> SpanData {
        let end_time = SystemTime::now();
        self.end_time = Some(end_time);
        let data = SpanData {
            span_context: self.span_context,
            parent_span_context: self.parent_span_context,
            name: self.name,
            kind: self.kind,
            start_time: self.start_time,
            end_time,
            attributes: self.attributes,
            dropped_attributes_count: self.dropped_attributes_count,
            events: self.events,
            links: self.links,
            status: self.status,
            resource: self.resource,
            scope: self.scope,
        };
        for processor in self.processors.iter() {
            processor.on_end(data.clone());
        }
        data
    }
}

fn bound<T>(items: Vec<T>, max: usize) -> (Vec<T>, u32) {
    if items.len() <= max {
        (items, 0)
    } else {
        let dropped = (items.len() - max) as u32;
        let mut items = items;
        items.truncate(max);
        (items, dropped)
    }
}

/// The immutable snapshot of a finished span delivered to [`SpanProcessor`](super::SpanProcessor)s.
#[derive(Clone, Debug, PartialEq)]
pub struct SpanData {
    pub span_context: SpanContext,
    pub parent_span_context: SpanContext,
    pub name: Cow<'static, str>,
    pub kind: SpanKind,
    pub start_time: SystemTime,
    pub end_time: SystemTime,
    pub attributes: Vec<KeyValue>,
    pub dropped_attributes_count: u32,
    pub events: SpanEvents,
    pub links: SpanLinks,
    pub status: Status,
    pub resource: Arc<Resource>,
    pub scope: Arc<InstrumentationScope>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use otel_api::trace::{SpanId, TraceFlags, TraceId, TraceState};

    fn ctx() -> SpanContext {
        SpanContext::new(TraceId::from_hex("1").unwrap(), SpanId::from_hex("1").unwrap(), TraceFlags::SAMPLED, false, TraceState::NONE)
    }

    fn span() -> Span {
        Span::new(
            ctx(),
            SpanContext::NONE,
            "op".into(),
            SpanKind::Internal,
            SystemTime::now(),
            vec![],
            vec![],
            SpanLimits::default(),
            Arc::new(Resource::empty()),
            Arc::new(InstrumentationScope::new("test")),
            Arc::new(Vec::new()),
        )
    }

    #[test]
    fn status_cannot_downgrade_from_ok() {
        let mut span = span();
        span.set_status(Status::Ok);
        span.set_status(Status::Error { description: "boom".into() });
        let data = span.end();
        assert_eq!(data.status, Status::Ok);
    }

    #[test]
    fn events_beyond_limit_are_dropped_and_counted() {
        let mut limits = SpanLimits::default();
        limits.max_events_per_span = 1;
        let mut span = Span::new(
            ctx(),
            SpanContext::NONE,
            "op".into(),
            SpanKind::Internal,
            SystemTime::now(),
            vec![],
            vec![],
            limits,
            Arc::new(Resource::empty()),
            Arc::new(InstrumentationScope::new("test")),
            Arc::new(Vec::new()),
        );
        span.add_event("a", vec![]);
        span.add_event("b", vec![]);
        let data = span.end();
        assert_eq!(data.events.events.len(), 1);
        assert_eq!(data.events.dropped_count, 1);
    }

    #[test]
    fn mutation_after_end_is_impossible_by_construction() {
        // `end` consumes `self`, so further `set_attribute` calls do not
        // type-check; this test documents the invariant at the data level.
        let span = span();
        let data = span.end();
        assert!(data.attributes.is_empty());
    }
}
