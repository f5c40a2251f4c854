//! Views: instrument selectors paired with an aggregation override, an
//! attribute filter, and a per-view cardinality limit (§4.4).

use crate::metrics::aggregation::Aggregation;
use crate::scope::InstrumentationScope;
use otel_api::metrics::{InstrumentDescriptor, InstrumentType};
use otel_api::KeyValue;
use regex::Regex;
use std::fmt::Debug;
use std::sync::Arc;

pub const DEFAULT_CARDINALITY_LIMIT: usize = 2000;

/// Transforms the attributes recorded on a measurement before they reach
/// metric storage, e.g. to drop high-cardinality keys.
pub trait AttributesProcessor: Send + Sync + Debug {
    fn process(&self, attributes: Vec<KeyValue>) -> Vec<KeyValue>;
}

/// The identity transform; the default for views that don't configure one.
#[derive(Debug, Default)]
pub struct NoopAttributesProcessor;

impl AttributesProcessor for NoopAttributesProcessor {
    fn process(&self, attributes: Vec<KeyValue>) -> Vec<KeyValue> {
        attributes
    }
}

/// Retains only attributes whose key is in an allow-list.
#[derive(Debug)]
pub struct AllowListAttributesProcessor {
    allowed: Vec<Arc<str>>,
}

impl AllowListAttributesProcessor {
    pub fn new(allowed: impl IntoIterator<Item = impl Into<Arc<str>>>) -> Self {
        AllowListAttributesProcessor { allowed: allowed.into_iter().map(Into::into).collect() }
    }
}

impl AttributesProcessor for AllowListAttributesProcessor {
    fn process(&self, attributes: Vec<KeyValue>) -> Vec<KeyValue> {
        attributes.into_iter().filter(|kv| self.allowed.iter().any(|a| a.as_ref() == kv.key.as_str())).collect()
    }
}

/// Matches instruments by type and/or name (glob `*`/`?`), unit, and
/// instrumentation scope (name, version, schema URL). `None` fields match
/// anything.
#[derive(Clone, Debug, Default)]
pub struct InstrumentSelector {
    pub instrument_type: Option<InstrumentType>,
    pub name_pattern: Option<Arc<str>>,
    pub unit: Option<Arc<str>>,
    pub scope_name: Option<Arc<str>>,
    pub scope_version: Option<Arc<str>>,
    pub scope_schema_url: Option<Arc<str>>,
}

impl InstrumentSelector {
    fn matches(&self, descriptor: &InstrumentDescriptor, scope: &InstrumentationScope) -> bool {
        if let Some(kind) = self.instrument_type {
            if kind != descriptor.kind {
                return false;
            }
        }
        if let Some(unit) = &self.unit {
            if unit.as_ref() != descriptor.unit.as_ref() {
                return false;
            }
        }
        if let Some(scope_name) = &self.scope_name {
            if scope_name.as_ref() != scope.name.as_ref() {
                return false;
            }
        }
        if let Some(scope_version) = &self.scope_version {
            if scope.version.as_deref() != Some(scope_version.as_ref()) {
                return false;
            }
        }
        if let Some(scope_schema_url) = &self.scope_schema_url {
            if scope.schema_url.as_deref() != Some(scope_schema_url.as_ref()) {
                return false;
            }
        }
        if let Some(pattern) = &self.name_pattern {
            if !glob_match(pattern, &descriptor.name) {
                return false;
            }
        }
        true
    }
}

/// Case-insensitively matches an instrument name against a glob pattern
/// supporting `*` (any run of characters) and `?` (exactly one character).
fn glob_match(pattern: &str, name: &str) -> bool {
    let regex_source = format!("(?i)^{}$", regex::escape(pattern).replace(r"\*", ".*").replace(r"\?", "."));
    Regex::new(&regex_source).map(|re| re.is_match(name)).unwrap_or(false)
}

/// A user-registered transformation rule applied when an instrument is created.
pub struct View {
    pub selector: InstrumentSelector,
    pub name_override: Option<Arc<str>>,
    pub aggregation: Aggregation,
    pub attributes_processor: Arc<dyn AttributesProcessor>,
    pub cardinality_limit: usize,
}

impl View {
    pub fn builder(selector: InstrumentSelector) -> ViewBuilder {
        ViewBuilder {
            selector,
            name_override: None,
            aggregation: Aggregation::Default,
            attributes_processor: Arc::new(NoopAttributesProcessor),
            cardinality_limit: DEFAULT_CARDINALITY_LIMIT,
        }
    }

    fn default_view() -> View {
        View {
            selector: InstrumentSelector::default(),
            name_override: None,
            aggregation: Aggregation::Default,
            attributes_processor: Arc::new(NoopAttributesProcessor),
            cardinality_limit: DEFAULT_CARDINALITY_LIMIT,
        }
    }
}

pub struct ViewBuilder {
    selector: InstrumentSelector,
    name_override: Option<Arc<str>>,
    aggregation: Aggregation,
    attributes_processor: Arc<dyn AttributesProcessor>,
    cardinality_limit: usize,
}

impl ViewBuilder {
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name_override = Some(name.into());
        self
    }
    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }
    pub fn with_attributes_processor(mut self, processor: impl AttributesProcessor + 'static) -> Self {
        self.attributes_processor = Arc::new(processor);
        self
    }
    pub fn with_cardinality_limit(mut self, limit: usize) -> Self {
        self.cardinality_limit = limit.max(1);
        self
    }
    pub fn build(self) -> View {
        View {
            selector: self.selector,
            name_override: self.name_override,
            aggregation: self.aggregation,
            attributes_processor: self.attributes_processor,
            cardinality_limit: self.cardinality_limit,
        }
    }
}

/// Holds user-registered views and resolves the set applicable to an instrument.
#[derive(Default)]
pub struct ViewRegistry {
    views: Vec<View>,
}

impl ViewRegistry {
    pub fn new(views: Vec<View>) -> Self {
        ViewRegistry { views }
    }

    /// Returns every registered view matching `descriptor`/`scope`, or the
    /// single default view if none match (§4.4).
    pub fn find_views(&self, descriptor: &InstrumentDescriptor, scope: &InstrumentationScope) -> Vec<&View> {
        let matches: Vec<&View> = self.views.iter().filter(|v| v.selector.matches(descriptor, scope)).collect();
        if matches.is_empty() {
            vec![DEFAULT_VIEW.as_ref()]
        } else {
            matches
        }
    }
}

static DEFAULT_VIEW_CELL: std::sync::OnceLock<View> = std::sync::OnceLock::new();

struct DefaultViewRef;
impl DefaultViewRef {
    fn as_ref(&self) -> &'static View {
        DEFAULT_VIEW_CELL.get_or_init(View::default_view)
    }
}

static DEFAULT_VIEW: DefaultViewRef = DefaultViewRef;
