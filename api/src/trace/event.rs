use crate::KeyValue;
use std::borrow::Cow;
use std::time::SystemTime;

/// A point-in-time annotation recorded on a span.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub name: Cow<'static, str>,
    pub timestamp: SystemTime,
    pub attributes: Vec<KeyValue>,
    /// Attributes dropped from *this event* due to the container's attribute limit.
    pub dropped_attributes_count: u32,
}

impl Event {
    pub fn new(name: impl Into<Cow<'static, str>>, timestamp: SystemTime, attributes: Vec<KeyValue>, dropped_attributes_count: u32) -> Self {
        Event { name: name.into(), timestamp, attributes, dropped_attributes_count }
    }

    pub fn with_name(name: impl Into<Cow<'static, str>>) -> Self {
        Event { name: name.into(), timestamp: SystemTime::now(), attributes: Vec::new(), dropped_attributes_count: 0 }
    }
}

/// A reference from one span to a causally related span, possibly in
/// another trace.
#[derive(Clone, Debug, PartialEq)]
pub struct Link {
    pub span_context: crate::trace::SpanContext,
    pub attributes: Vec<KeyValue>,
    pub dropped_attributes_count: u32,
}

impl Link {
    pub fn new(span_context: crate::trace::SpanContext, attributes: Vec<KeyValue>, dropped_attributes_count: u32) -> Self {
        Link { span_context, attributes, dropped_attributes_count }
    }
}
