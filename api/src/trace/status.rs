/// The kind of span, describing its relationship to callers and callees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SpanKind {
    #[default]
    Internal,
    Server,
    Client,
    Producer,
    Consumer,
}

/// The outcome of the operation a span represents.
///
/// `Ok` may not be downgraded back to `Unset` by later calls, matching the
/// OpenTelemetry API's one-way status transition rule (enforced by the SDK's
/// `Span::set_status`, not by this type itself).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Status {
    #[default]
    Unset,
    Ok,
    Error { description: std::borrow::Cow<'static, str> },
}
