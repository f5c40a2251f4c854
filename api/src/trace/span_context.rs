use super::{SpanId, TraceFlags, TraceId};
use std::collections::VecDeque;
use thiserror::Error;

/// System-specific key/value configuration carried alongside a trace,
/// per the [W3C TraceState] specification. Keys are unique; insertion
/// moves an existing key to the front, matching the W3C "most recent
/// mutator first" ordering rule.
///
/// [W3C TraceState]: https://www.w3.org/TR/trace-context/#tracestate-header
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct TraceState(Option<VecDeque<(String, String)>>);

/// Errors constructing or mutating a [`TraceState`].
#[derive(Error, Debug)]
pub enum TraceStateError {
    #[error("invalid trace state key: {0}")]
    Key(String),
    #[error("invalid trace state value: {0}")]
    Value(String),
}

impl TraceState {
    pub const NONE: TraceState = TraceState(None);

    fn valid_key(key: &str) -> bool {
        if key.is_empty() || key.len() > 256 {
            return false;
        }
        let allowed_special = |b: u8| b == b'_' || b == b'-' || b == b'*' || b == b'/';
        let mut vendor_start = None;
        for (i, &b) in key.as_bytes().iter().enumerate() {
            if !(b.is_ascii_lowercase() || b.is_ascii_digit() || allowed_special(b) || b == b'@') {
                return false;
            }
            if i == 0 && !(b.is_ascii_lowercase() || b.is_ascii_digit()) {
                return false;
            } else if b == b'@' {
                if vendor_start.is_some() || i + 14 < key.len() {
                    return false;
                }
                vendor_start = Some(i);
            } else if let Some(start) = vendor_start {
                if i == start + 1 && !(b.is_ascii_lowercase() || b.is_ascii_digit()) {
                    return false;
                }
            }
        }
        true
    }

    fn valid_value(value: &str) -> bool {
        if value.len() > 256 {
            return false;
        }
        !(value.contains(',') || value.contains('='))
    }

    /// Builds a `TraceState` from an ordered collection of (key, value) pairs.
    pub fn from_key_value<T, K, V>(trace_state: T) -> Result<Self, TraceStateError>
    where
        T: IntoIterator<Item = (K, V)>,
        K: ToString,
        V: ToString,
    {
        let ordered: VecDeque<(String, String)> = trace_state
            .into_iter()
            .map(|(k, v)| {
                let (k, v) = (k.to_string(), v.to_string());
                if !Self::valid_key(&k) {
                    return Err(TraceStateError::Key(k));
                }
                if !Self::valid_value(&v) {
                    return Err(TraceStateError::Value(v));
                }
                Ok((k, v))
            })
            .collect::<Result<_, _>>()?;

        Ok(if ordered.is_empty() { TraceState(None) } else { TraceState(Some(ordered)) })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.as_ref().and_then(|kvs| kvs.iter().find_map(|(k, v)| (k == key).then_some(v.as_str())))
    }

    /// Inserts (or moves-to-front and updates) a key. Returns a new `TraceState`; `self` is unchanged.
    pub fn insert(&self, key: impl ToString, value: impl ToString) -> Result<Self, TraceStateError> {
        let (key, value) = (key.to_string(), value.to_string());
        if !Self::valid_key(&key) {
            return Err(TraceStateError::Key(key));
        }
        if !Self::valid_value(&value) {
            return Err(TraceStateError::Value(value));
        }
        let mut entries = self.0.clone().unwrap_or_default();
        entries.retain(|(k, _)| k != &key);
        entries.push_front((key, value));
        Ok(TraceState(Some(entries)))
    }

    /// Removes a key. Returns a new `TraceState`; `self` is unchanged.
    pub fn delete(&self, key: impl ToString) -> Result<Self, TraceStateError> {
        let key = key.to_string();
        let mut entries = self.0.clone().unwrap_or_default();
        entries.retain(|(k, _)| k != &key);
        Ok(TraceState(if entries.is_empty() { None } else { Some(entries) }))
    }

    /// The `key1=value1,key2=value2` wire representation.
    pub fn header(&self) -> String {
        self.0
            .as_ref()
            .map(|kvs| kvs.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(","))
            .unwrap_or_default()
    }
}

/// The immutable, propagatable identity of a span: trace id, span id, trace
/// flags, and trace state, plus a creation-time `is_remote` flag.
///
/// Equality is by all fields. `is_valid()` requires both ids to be non-zero;
/// it does not imply `is_sampled()`.
#[derive(Clone, Debug, PartialEq, Hash, Eq)]
pub struct SpanContext {
    trace_id: TraceId,
    span_id: SpanId,
    trace_flags: TraceFlags,
    is_remote: bool,
    trace_state: TraceState,
}

impl SpanContext {
    pub const NONE: SpanContext = SpanContext {
        trace_id: TraceId::INVALID,
        span_id: SpanId::INVALID,
        trace_flags: TraceFlags::NOT_SAMPLED,
        is_remote: false,
        trace_state: TraceState::NONE,
    };

    pub fn new(trace_id: TraceId, span_id: SpanId, trace_flags: TraceFlags, is_remote: bool, trace_state: TraceState) -> Self {
        SpanContext { trace_id, span_id, trace_flags, is_remote, trace_state }
    }

    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }
    pub fn span_id(&self) -> SpanId {
        self.span_id
    }
    pub fn trace_flags(&self) -> TraceFlags {
        self.trace_flags
    }
    pub fn is_valid(&self) -> bool {
        self.trace_id != TraceId::INVALID && self.span_id != SpanId::INVALID
    }
    pub fn is_remote(&self) -> bool {
        self.is_remote
    }
    pub fn is_sampled(&self) -> bool {
        self.trace_flags.is_sampled()
    }
    pub fn trace_state(&self) -> &TraceState {
        &self.trace_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_state_header_round_trip() {
        let ts = TraceState::from_key_value(vec![("foo", "bar"), ("apple", "banana")]).unwrap();
        assert_eq!(ts.header(), "foo=bar,apple=banana");
    }

    #[test]
    fn trace_state_insert_moves_to_front_and_does_not_mutate_original() {
        let ts = TraceState::from_key_value(vec![("foo", "bar")]).unwrap();
        let updated = ts.insert("zig", "zag").unwrap();
        assert_eq!(updated.header(), "zig=zag,foo=bar");
        assert!(ts.get("zig").is_none());
    }

    #[test]
    fn trace_state_rejects_invalid_key() {
        assert!(TraceState::from_key_value(vec![("FOO", "bar")]).is_err());
        assert!(TraceState::from_key_value(vec![("你好", "bar")]).is_err());
    }

    #[test]
    fn span_context_validity() {
        assert!(!SpanContext::NONE.is_valid());
        let cx = SpanContext::new(
            TraceId::from_hex("1").unwrap(),
            SpanId::from_hex("1").unwrap(),
            TraceFlags::SAMPLED,
            false,
            TraceState::NONE,
        );
        assert!(cx.is_valid());
        assert!(cx.is_sampled());
    }

    #[test]
    fn span_context_equality_is_by_all_fields() {
        let a = SpanContext::new(TraceId::from_hex("1").unwrap(), SpanId::from_hex("1").unwrap(), TraceFlags::SAMPLED, false, TraceState::NONE);
        let b = SpanContext::new(TraceId::from_hex("1").unwrap(), SpanId::from_hex("1").unwrap(), TraceFlags::NOT_SAMPLED, false, TraceState::NONE);
        assert_ne!(a, b);
    }
}
