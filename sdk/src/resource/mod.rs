//! The entity producing telemetry, represented as attributes attached to
//! every span and metric point the provider emits.
//!
//! Concrete resource *discovery* (cloud metadata, k8s downward API, etc.) is
//! out of scope here (§1): only the merge algorithm and the one detector
//! (environment variables) simple enough to specify unambiguously.

use otel_api::{Key, KeyValue, Value};
use std::borrow::Cow;
use std::collections::HashMap;

/// An immutable attribute bag identifying the entity producing telemetry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Resource {
    attrs: HashMap<Key, Value>,
    schema_url: Option<Cow<'static, str>>,
}

impl Resource {
    pub fn empty() -> Self {
        Resource::default()
    }

    pub fn new(kvs: impl IntoIterator<Item = KeyValue>) -> Self {
        let attrs = kvs.into_iter().map(|kv| (kv.key, kv.value)).collect();
        Resource { attrs, schema_url: None }
    }

    pub fn with_schema_url(mut self, schema_url: impl Into<Cow<'static, str>>) -> Self {
        self.schema_url = Some(schema_url.into());
        self
    }

    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.attrs.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.attrs.iter()
    }

    pub fn schema_url(&self) -> Option<&str> {
        self.schema_url.as_deref()
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    /// Merges `other` on top of `self`: on key collision `other` wins,
    /// matching the autoconfigure resource-provider composition order
    /// (later providers override same-key attributes, §4.5.3).
    pub fn merge(&self, other: &Resource) -> Resource {
        let mut attrs = self.attrs.clone();
        attrs.extend(other.attrs.iter().map(|(k, v)| (k.clone(), v.clone())));
        Resource { attrs, schema_url: other.schema_url.clone().or_else(|| self.schema_url.clone()) }
    }
}

/// An SPI-discovered source of resource attributes, composed by the
/// autoconfigure assembly (§4.5.3).
pub trait ResourceProvider: Send + Sync {
    /// A stable name used for the enable/disable provider lists
    /// (`otel.java.enabled.resource.providers` / `...disabled...`).
    fn name(&self) -> &'static str;
    fn detect(&self) -> Resource;
}

/// Parses `OTEL_RESOURCE_ATTRIBUTES` (`key1=value1,key2=value2`) and
/// `OTEL_SERVICE_NAME` into a [`Resource`].
#[derive(Debug, Default)]
pub struct EnvResourceProvider;

const OTEL_RESOURCE_ATTRIBUTES: &str = "OTEL_RESOURCE_ATTRIBUTES";
const OTEL_SERVICE_NAME: &str = "OTEL_SERVICE_NAME";

impl ResourceProvider for EnvResourceProvider {
    fn name(&self) -> &'static str {
        "env"
    }

    fn detect(&self) -> Resource {
        let mut resource = match std::env::var(OTEL_RESOURCE_ATTRIBUTES) {
            Ok(s) if !s.is_empty() => parse_resource_attributes(&s),
            _ => Resource::empty(),
        };
        if let Ok(name) = std::env::var(OTEL_SERVICE_NAME) {
            resource = resource.merge(&Resource::new([KeyValue::new("service.name", name)]));
        }
        resource
    }
}

fn parse_resource_attributes(s: &str) -> Resource {
    Resource::new(s.split_terminator(',').filter_map(|entry| {
        let (key, value) = entry.split_once('=')?;
        Some(KeyValue::new(key.trim().to_owned(), value.trim().to_owned()))
    }))
}
