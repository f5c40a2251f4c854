//! Customizer chains accumulated while applying `AutoConfigurationCustomizerProvider`s
//! (§4.5 step 2) and composed left-to-right at `build()` time.
//!
//! Each `addXxxCustomizer(f)` call appends `f` to a chain; applying the
//! chain to a starting value `x` computes `fN(...f2(f1(x))...)` -- i.e. the
//! first-registered customizer runs first, and each later one wraps the
//! result of the one before it (testable property #11).

use crate::config_properties::ConfigProperties;
use crate::propagation::Propagator;
use otel_sdk::export::SpanExporter;
use otel_sdk::metrics::{MeterProviderBuilder, MetricExporter};
use otel_sdk::resource::Resource;
use otel_sdk::trace::{Sampler, TracerProviderBuilder};
use std::sync::Arc;

/// An ordered chain of `(value, &ConfigProperties) -> value` transforms,
/// applied in registration order.
pub struct CustomizerChain<T> {
    steps: Vec<Box<dyn Fn(T, &ConfigProperties) -> T + Send + Sync>>,
}

impl<T> Default for CustomizerChain<T> {
    fn default() -> Self {
        CustomizerChain { steps: Vec::new() }
    }
}

impl<T> CustomizerChain<T> {
    pub fn add(&mut self, customizer: impl Fn(T, &ConfigProperties) -> T + Send + Sync + 'static) {
        self.steps.push(Box::new(customizer));
    }

    /// Applies every registered step in order, composing `g(f(x))` style.
    pub fn apply(&self, mut value: T, config: &ConfigProperties) -> T {
        for step in &self.steps {
            value = step(value, config);
        }
        value
    }
}

/// The handle an `AutoConfigurationCustomizerProvider` receives: one chain
/// per buildable artifact named in §4.5 step 2. The logger-provider and
/// log-record-exporter categories from the spec's build order are omitted:
/// the full log pipeline is out of scope (§1 Non-goals) and this crate
/// builds no `LoggerProvider` for a customizer to apply to.
#[derive(Default)]
pub struct AutoConfigurationCustomizer {
    pub tracer_provider: CustomizerChain<TracerProviderBuilder>,
    pub meter_provider: CustomizerChain<MeterProviderBuilder>,
    pub sampler: CustomizerChain<Arc<dyn Sampler>>,
    pub span_exporter: CustomizerChain<Arc<dyn SpanExporter>>,
    pub metric_exporter: CustomizerChain<Arc<dyn MetricExporter>>,
    pub propagators: CustomizerChain<Vec<Arc<dyn Propagator>>>,
    pub resource: CustomizerChain<Resource>,
    pub properties: CustomizerChain<Vec<(String, String)>>,
}

/// A registered provider of customizers, applied in registration order
/// (§6 "`AutoConfigurationCustomizerProvider` (ordered)").
pub trait AutoConfigurationCustomizerProvider: Send + Sync {
    fn customize(&self, customizer: &mut AutoConfigurationCustomizer);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_composes_in_registration_order() {
        let mut chain: CustomizerChain<i32> = CustomizerChain::default();
        chain.add(|x, _| x + 1);
        chain.add(|x, _| x * 2);
        let config = ConfigProperties::builder().build();
        // f(x) = x+1 first, then g(f(x)) = (x+1)*2
        assert_eq!(chain.apply(3, &config), 8);
    }

    #[test]
    fn empty_chain_is_identity() {
        let chain: CustomizerChain<i32> = CustomizerChain::default();
        let config = ConfigProperties::builder().build();
        assert_eq!(chain.apply(5, &config), 5);
    }
}
