//! Resource assembly (§4.5 step 3): loads `ResourceProvider`s, filters by
//! enable/disable lists, merges (later providers override same-key
//! attributes), then applies the resource customizer chain.

use crate::config_properties::ConfigProperties;
use crate::customizer::CustomizerChain;
use crate::spi::PluginRegistry;
use otel_sdk::resource::Resource;

const ENABLED_KEY: &str = "otel.java.enabled.resource.providers";
const DISABLED_KEY: &str = "otel.java.disabled.resource.providers";

/// Builds the effective [`Resource`] from every registered [`ResourceProvider`](otel_sdk::resource::ResourceProvider)
/// not excluded by `otel.java.disabled.resource.providers`, restricted to
/// `otel.java.enabled.resource.providers` when that list is present.
pub fn build_resource(registry: &PluginRegistry, config: &ConfigProperties, customizers: &CustomizerChain<Resource>) -> Resource {
    let enabled = config.get_csv(ENABLED_KEY);
    let disabled = config.get_csv(DISABLED_KEY).unwrap_or_default();

    let mut resource = Resource::empty();
    for provider in registry.resource_providers() {
        let name = provider.name();
        if disabled.iter().any(|d| d == name) {
            continue;
        }
        if let Some(enabled) = &enabled {
            if !enabled.iter().any(|e| e == name) {
                continue;
            }
        }
        resource = resource.merge(&provider.detect());
    }

    customizers.apply(resource, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use otel_api::{Key, Value};
    use std::collections::HashMap;

    #[test]
    fn disabled_provider_is_excluded() {
        let registry = PluginRegistry::with_defaults();
        let config = ConfigProperties::builder().with_supplier(HashMap::from([(DISABLED_KEY.to_owned(), "env".to_owned())])).build();
        let resource = build_resource(&registry, &config, &CustomizerChain::default());
        assert!(resource.is_empty());
    }

    #[test]
    fn enabled_list_restricts_to_named_providers() {
        let registry = PluginRegistry::with_defaults();
        temp_env::with_var("OTEL_SERVICE_NAME", Some("svc"), || {
            let config = ConfigProperties::builder().with_supplier(HashMap::from([(ENABLED_KEY.to_owned(), "env".to_owned())])).build();
            let resource = build_resource(&registry, &config, &CustomizerChain::default());
            assert_eq!(resource.get(&Key::from_static_str("service.name")), Some(&Value::String("svc".into())));
        });
    }
}
