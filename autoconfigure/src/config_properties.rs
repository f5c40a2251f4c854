//! Layered property resolution (§4.5 step 1, §6 "precedence: system >
//! environment > suppliers, later suppliers override earlier").
//!
//! Four layers are merged, each overlaying the previous: property suppliers
//! (merged among themselves in registration order), environment variables,
//! explicit system properties, and finally any `propertiesCustomizer`
//! overrides collected while applying `AutoConfigurationCustomizerProvider`s.

use std::collections::HashMap;
use std::time::Duration;

/// A resolved, immutable view over every `otel.*` property the build needs.
/// Keys are case-sensitive and dotted (`otel.metrics.exporter`), matching
/// the source keys passed to the builder -- no env-var name translation
/// happens here; that translation is the caller's job (see
/// [`ConfigPropertiesBuilder::with_env`]).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigProperties {
    values: HashMap<String, String>,
}

impl ConfigProperties {
    pub fn builder() -> ConfigPropertiesBuilder {
        ConfigPropertiesBuilder::default()
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_string_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get_string(key).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get_string(key) {
            Some(v) => v.eq_ignore_ascii_case("true"),
            None => default,
        }
    }

    /// Parses a comma-separated list, trimming whitespace and dropping empty
    /// entries. Returns `None` if the key is unset (letting callers fall
    /// back to their own default list) rather than an empty `Vec`.
    pub fn get_csv(&self, key: &str) -> Option<Vec<String>> {
        self.get_string(key).map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned).collect())
    }

    /// Parses an integer property, falling back to `default` on a missing or
    /// unparseable value.
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.get_string(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
    }

    /// Parses a duration: a bare integer is milliseconds; `10s`/`1m`/`2h`/`500ms`
    /// suffixes are also accepted. Falls back to `default` on a missing or
    /// unparseable value.
    pub fn get_duration(&self, key: &str, default: Duration) -> Duration {
        match self.get_string(key) {
            Some(v) => parse_duration(v).unwrap_or(default),
            None => default,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Overlays `overrides` on top of the current values, returning a new
    /// [`ConfigProperties`]. Used to apply `propertiesCustomizer` results
    /// collected while running `AutoConfigurationCustomizerProvider`s,
    /// which run after the four base layers are already merged.
    pub fn overlay(&self, overrides: impl IntoIterator<Item = (String, String)>) -> ConfigProperties {
        let mut values = self.values.clone();
        values.extend(overrides);
        ConfigProperties { values }
    }
}

/// Reads `OTEL_*` process environment variables and translates each name to
/// the dotted `otel.*` property key used throughout this crate
/// (`OTEL_SDK_DISABLED` -> `otel.sdk.disabled`, `OTEL_EXPORTER_OTLP_PROTOCOL`
/// -> `otel.exporter.otlp.protocol`). None of the keys this crate reads
/// (§6) have multi-word segments, so a blanket underscore-to-dot
/// translation is unambiguous.
pub fn env_properties_from_process() -> HashMap<String, String> {
    std::env::vars()
        .filter_map(|(k, v)| {
            let lower = k.to_ascii_lowercase();
            lower.strip_prefix("otel_").map(|rest| (format!("otel.{}", rest.replace('_', ".")), v))
        })
        .collect()
}

fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (number, unit) = match raw.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => raw.split_at(idx),
        None => (raw, "ms"),
    };
    let value: u64 = number.parse().ok()?;
    let millis = match unit {
        "" | "ms" => value,
        "s" => value.checked_mul(1_000)?,
        "m" => value.checked_mul(60_000)?,
        "h" => value.checked_mul(3_600_000)?,
        _ => return None,
    };
    Some(Duration::from_millis(millis))
}

/// Builds a [`ConfigProperties`] from layered sources. Layers are applied in
/// the order listed, each overlaying (overriding on key collision) the
/// result of the previous one: suppliers (merged among themselves in
/// registration order, later overrides earlier), then environment, then
/// system properties, then customizer overrides.
#[derive(Default)]
pub struct ConfigPropertiesBuilder {
    suppliers: Vec<HashMap<String, String>>,
    env: HashMap<String, String>,
    system: HashMap<String, String>,
    customizer_overrides: Vec<HashMap<String, String>>,
}

impl ConfigPropertiesBuilder {
    /// Registers a property supplier. Suppliers are merged among themselves
    /// in registration order (later calls override earlier ones on key
    /// collision) before environment and system layers are applied.
    pub fn with_supplier(mut self, properties: HashMap<String, String>) -> Self {
        self.suppliers.push(properties);
        self
    }

    /// Overlays the given map as the environment layer, overriding every
    /// supplier value on key collision. Pass the real process environment
    /// (filtered/translated to dotted keys by the caller) in production;
    /// tests pass a literal map instead of touching `std::env`.
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Overlays the given map as the system-properties layer, the highest
    /// explicit precedence tier (above environment).
    pub fn with_system_properties(mut self, properties: HashMap<String, String>) -> Self {
        self.system = properties;
        self
    }

    /// Registers a `propertiesCustomizer(current) -> overrides` result to be
    /// overlaid, in registration order, after every other layer (§4.5 step 1).
    pub fn with_customizer_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.customizer_overrides.push(overrides);
        self
    }

    pub fn build(self) -> ConfigProperties {
        let mut values = HashMap::new();
        for supplier in self.suppliers {
            values.extend(supplier);
        }
        values.extend(self.env);
        values.extend(self.system);
        for overrides in self.customizer_overrides {
            values.extend(overrides);
        }
        ConfigProperties { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_is_system_over_environment_over_suppliers() {
        let p1 = HashMap::from([("a".to_owned(), "1".to_owned()), ("b".to_owned(), "2".to_owned())]);
        let p2 = HashMap::from([("b".to_owned(), "3".to_owned()), ("c".to_owned(), "4".to_owned())]);
        let env = HashMap::from([("a".to_owned(), "9".to_owned())]);

        let config = ConfigProperties::builder().with_supplier(p1).with_supplier(p2).with_env(env).with_system_properties(HashMap::new()).build();

        assert_eq!(config.get_string("a"), Some("9"));
        assert_eq!(config.get_string("b"), Some("3"));
        assert_eq!(config.get_string("c"), Some("4"));
    }

    #[test]
    fn system_properties_beat_environment() {
        let env = HashMap::from([("k".to_owned(), "env".to_owned())]);
        let system = HashMap::from([("k".to_owned(), "system".to_owned())]);
        let config = ConfigProperties::builder().with_env(env).with_system_properties(system).build();
        assert_eq!(config.get_string("k"), Some("system"));
    }

    #[test]
    fn duration_parses_plain_and_suffixed_forms() {
        assert_eq!(parse_duration("5000"), Some(Duration::from_millis(5000)));
        assert_eq!(parse_duration("60s"), Some(Duration::from_secs(60)));
        assert_eq!(parse_duration("1m"), Some(Duration::from_secs(60)));
        assert_eq!(parse_duration("bogus"), None);
    }

    #[test]
    fn csv_trims_and_drops_empty_entries() {
        let config = ConfigProperties::builder().with_supplier(HashMap::from([("k".to_owned(), "a, b ,,c".to_owned())])).build();
        assert_eq!(config.get_csv("k"), Some(vec!["a".to_owned(), "b".to_owned(), "c".to_owned()]));
    }

    #[test]
    fn missing_csv_key_is_none_not_empty() {
        let config = ConfigProperties::builder().build();
        assert_eq!(config.get_csv("missing"), None);
    }
}
