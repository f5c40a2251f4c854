//! The tracer/meter identity attached to every span and metric stream it produces.

use std::sync::Arc;

/// Identifies the instrumentation library (not the application) that created
/// a tracer or meter. Used by [`View`](crate::metrics::View) selectors and by
/// exporters that group data by producing library.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct InstrumentationScope {
    pub name: Arc<str>,
    pub version: Option<Arc<str>>,
    pub schema_url: Option<Arc<str>>,
}

impl InstrumentationScope {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        InstrumentationScope { name: name.into(), version: None, schema_url: None }
    }

    pub fn with_version(mut self, version: impl Into<Arc<str>>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_schema_url(mut self, schema_url: impl Into<Arc<str>>) -> Self {
        self.schema_url = Some(schema_url.into());
        self
    }
}
