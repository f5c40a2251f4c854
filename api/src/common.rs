use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// The key part of an attribute [`KeyValue`] pair.
///
/// Two keys with the same text are equal regardless of how they were
/// constructed (static, owned, or reference-counted).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(OtelString);

impl Key {
    /// Creates a new `Key` from anything convertible into one.
    pub fn new(value: impl Into<Key>) -> Self {
        value.into()
    }

    /// Creates a const `Key` from a `&'static str`, usable in `const` contexts.
    pub const fn from_static_str(value: &'static str) -> Self {
        Key(OtelString::Static(value))
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Pairs this key with a `bool` value.
    pub fn bool<T: Into<bool>>(self, value: T) -> KeyValue {
        KeyValue { key: self, value: Value::Bool(value.into()) }
    }

    /// Pairs this key with an `i64` value.
    pub fn i64(self, value: i64) -> KeyValue {
        KeyValue { key: self, value: Value::I64(value) }
    }

    /// Pairs this key with an `f64` value.
    pub fn f64(self, value: f64) -> KeyValue {
        KeyValue { key: self, value: Value::F64(value) }
    }

    /// Pairs this key with a string-like value.
    pub fn string(self, value: impl Into<StringValue>) -> KeyValue {
        KeyValue { key: self, value: Value::String(value.into()) }
    }

    /// Pairs this key with a homogeneous array value.
    pub fn array<T: Into<Array>>(self, value: T) -> KeyValue {
        KeyValue { key: self, value: Value::Array(value.into()) }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.as_str(), f)
    }
}

impl From<&'static str> for Key {
    fn from(s: &'static str) -> Self {
        Key(OtelString::Static(s))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key(OtelString::Owned(s.into_boxed_str()))
    }
}

impl From<Arc<str>> for Key {
    fn from(s: Arc<str>) -> Self {
        Key(OtelString::RefCounted(s))
    }
}

/// Small-string representation shared by [`Key`] and [`StringValue`] that
/// avoids an allocation for `&'static str` literals, the common case for
/// attribute keys and enum-like string values.
#[derive(Clone)]
enum OtelString {
    Owned(Box<str>),
    Static(&'static str),
    RefCounted(Arc<str>),
}

impl OtelString {
    fn as_str(&self) -> &str {
        match self {
            OtelString::Owned(s) => s,
            OtelString::Static(s) => s,
            OtelString::RefCounted(s) => s,
        }
    }
}

impl fmt::Debug for OtelString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl PartialEq for OtelString {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}
impl Eq for OtelString {}

impl PartialOrd for OtelString {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for OtelString {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}
impl Hash for OtelString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state)
    }
}

/// A UTF-8 string value, reusing [`OtelString`]'s allocation-avoiding representation.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringValue(OtelString);

impl StringValue {
    /// Returns the value as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for StringValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl fmt::Display for StringValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
impl AsRef<str> for StringValue {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<&'static str> for StringValue {
    fn from(s: &'static str) -> Self {
        StringValue(OtelString::Static(s))
    }
}
impl From<String> for StringValue {
    fn from(s: String) -> Self {
        StringValue(OtelString::Owned(s.into_boxed_str()))
    }
}
impl From<Arc<str>> for StringValue {
    fn from(s: Arc<str>) -> Self {
        StringValue(OtelString::RefCounted(s))
    }
}
impl From<Cow<'static, str>> for StringValue {
    fn from(s: Cow<'static, str>) -> Self {
        match s {
            Cow::Owned(s) => StringValue(OtelString::Owned(s.into_boxed_str())),
            Cow::Borrowed(s) => StringValue(OtelString::Static(s)),
        }
    }
}
impl From<StringValue> for String {
    fn from(s: StringValue) -> Self {
        s.as_str().to_owned()
    }
}

/// A homogeneous array, the payload of [`Value::Array`].
#[derive(Clone, Debug, PartialEq)]
pub enum Array {
    Bool(Vec<bool>),
    I64(Vec<i64>),
    F64(Vec<f64>),
    String(Vec<StringValue>),
}

macro_rules! into_array {
    ($(($t:ty, $variant:expr),)+) => {
        $(impl From<$t> for Array {
            fn from(t: $t) -> Self { $variant(t) }
        })+
    };
}
into_array!(
    (Vec<bool>, Array::Bool),
    (Vec<i64>, Array::I64),
    (Vec<f64>, Array::F64),
    (Vec<StringValue>, Array::String),
);

/// The type tag and value of an attribute, independent of its key.
///
/// Identical key text with a different [`Value`] variant is a *different*
/// attribute identity -- see [`Key`] equality in the SDK's attribute set.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    I64(i64),
    F64(f64),
    String(StringValue),
    Array(Array),
}

impl Value {
    /// Returns the discriminant name, used by attribute limit diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::I64(_) => "i64",
            Value::F64(_) => "f64",
            Value::String(_) => "string",
            Value::Array(Array::Bool(_)) => "bool_array",
            Value::Array(Array::I64(_)) => "i64_array",
            Value::Array(Array::F64(_)) => "f64_array",
            Value::Array(Array::String(_)) => "string_array",
        }
    }
}

macro_rules! from_values {
    ($(($t:ty, $variant:expr);)+) => {
        $(impl From<$t> for Value {
            fn from(t: $t) -> Self { $variant(t) }
        })+
    };
}
from_values!(
    (bool, Value::Bool);
    (i64, Value::I64);
    (f64, Value::F64);
    (StringValue, Value::String);
);
impl From<&'static str> for Value {
    fn from(s: &'static str) -> Self {
        Value::String(s.into())
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

/// A single attribute: a [`Key`] paired with a typed [`Value`].
#[derive(Clone, Debug, PartialEq)]
pub struct KeyValue {
    pub key: Key,
    pub value: Value,
}

impl KeyValue {
    /// Creates a new `KeyValue` pair.
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        KeyValue { key: key.into(), value: value.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_equality_ignores_representation() {
        let a = Key::from_static_str("service.name");
        let b = Key::new(String::from("service.name"));
        assert_eq!(a, b);
    }

    #[test]
    fn keyvalue_identity_includes_value_type() {
        // Same key text, different value types: distinct attribute identity
        // is enforced at the AttributeSet level, but Value itself must
        // distinguish them for that to be possible.
        let a = Value::from(1_i64);
        let b = Value::from(1.0_f64);
        assert_ne!(a, b);
    }
}
