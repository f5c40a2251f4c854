//! Typed key/value attribute bags, with count and string-length limits
//! applied uniformly across spans, events, links and metric data points.

use crate::{otel_warn, Array, Key, KeyValue, StringValue, Value};

/// Default maximum number of attributes retained on a single container
/// (span, event, link, or log record) before further entries are dropped.
pub const DEFAULT_MAX_ATTRIBUTE_COUNT: usize = 128;

/// Truncation/rejection limits applied when building an [`AttributeSet`].
///
/// Limits truncate, they never reject the whole container: attributes past
/// `max_count` are dropped, and strings longer than `max_string_length` are
/// cut to that many characters (not bytes) with the rest of the container
/// left untouched.
#[derive(Clone, Copy, Debug)]
pub struct AttributeLimits {
    pub max_count: usize,
    pub max_string_length: Option<usize>,
}

impl Default for AttributeLimits {
    fn default() -> Self {
        AttributeLimits { max_count: DEFAULT_MAX_ATTRIBUTE_COUNT, max_string_length: None }
    }
}

/// An ordered, de-duplicated attribute bag with a running dropped-count.
///
/// The key identity used for de-duplication and the `max_count` limit is
/// (key text, [`Value`] type tag): two entries with the same name but
/// different value types (e.g. a `string` `"retries"` and a `long`
/// `"retries"`) are distinct attributes. When the exact same (name, type)
/// pair is supplied twice, the *first* occurrence wins.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributeSet {
    values: Vec<KeyValue>,
    dropped_count: u32,
}

impl AttributeSet {
    /// Builds a limited, deduplicated set from raw key-values.
    pub fn new(raw: impl IntoIterator<Item = KeyValue>, limits: AttributeLimits) -> Self {
        let mut seen: Vec<KeyValue> = Vec::new();
        let mut dropped = 0u32;

        for kv in raw {
            if seen
                .iter()
                .any(|existing| existing.key == kv.key && existing.value.type_name() == kv.value.type_name())
            {
                continue;
            }
            if seen.len() >= limits.max_count {
                dropped += 1;
                continue;
            }
            seen.push(KeyValue { key: kv.key, value: truncate(kv.value, limits.max_string_length) });
        }

        seen.sort_by(|a, b| a.key.as_str().cmp(b.key.as_str()));
        AttributeSet { values: seen, dropped_count: dropped }
    }

    /// Creates an empty set with no limits applied.
    pub fn empty() -> Self {
        AttributeSet { values: Vec::new(), dropped_count: 0 }
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of attributes dropped due to `max_count`.
    pub fn dropped_count(&self) -> u32 {
        self.dropped_count
    }

    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.values.iter().find(|kv| &kv.key == key).map(|kv| &kv.value)
    }

    pub fn as_slice(&self) -> &[KeyValue] {
        &self.values
    }
}

fn truncate(value: Value, max_len: Option<usize>) -> Value {
    let Some(max_len) = max_len else { return value };
    match value {
        Value::String(s) => Value::String(truncate_string(s, max_len)),
        Value::Array(Array::String(items)) => {
            Value::Array(Array::String(items.into_iter().map(|s| truncate_string(s, max_len)).collect()))
        }
        other => other,
    }
}

fn truncate_string(s: StringValue, max_len: usize) -> StringValue {
    let text = s.as_str();
    if text.chars().count() <= max_len {
        return s;
    }
    otel_warn!(name: "AttributeSet.Truncated", original_len = text.len());
    text.chars().take(max_len).collect::<String>().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_write_wins_on_duplicate_key() {
        let set = AttributeSet::new(
            vec![KeyValue::new("a", 1_i64), KeyValue::new("a", 2_i64)],
            AttributeLimits::default(),
        );
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(&Key::from_static_str("a")), Some(&Value::I64(1)));
    }

    #[test]
    fn same_key_text_different_type_is_a_distinct_attribute() {
        let set = AttributeSet::new(
            vec![KeyValue::new("a", 1_i64), KeyValue::new("a", 1.0_f64)],
            AttributeLimits::default(),
        );
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn max_count_truncates_and_counts_drops() {
        let limits = AttributeLimits { max_count: 2, max_string_length: None };
        let set = AttributeSet::new(
            vec![KeyValue::new("a", 1_i64), KeyValue::new("b", 2_i64), KeyValue::new("c", 3_i64)],
            limits,
        );
        assert_eq!(set.len(), 2);
        assert_eq!(set.dropped_count(), 1);
    }

    #[test]
    fn long_strings_are_truncated_not_rejected() {
        let limits = AttributeLimits { max_count: 128, max_string_length: Some(3) };
        let set = AttributeSet::new(vec![KeyValue::new("a", "hello")], limits);
        assert_eq!(set.get(&Key::from_static_str("a")), Some(&Value::String("hel".into())));
    }

    #[test]
    fn sorted_by_key() {
        let set = AttributeSet::new(
            vec![KeyValue::new("b", 1_i64), KeyValue::new("a", 2_i64)],
            AttributeLimits::default(),
        );
        let keys: Vec<_> = set.iter().map(|kv| kv.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
