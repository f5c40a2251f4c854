//! The error surfaced from [`build()`](crate::build::AutoConfiguredSdkBuilder::build)
//! (§7 "Configuration error").

use thiserror::Error;

/// A failure while assembling the SDK from configuration: a misspelled
/// exporter name, an invalid duration, a non-positive cardinality limit, or
/// a missing required artifact. Wraps whatever non-configuration cause
/// triggered it, if any (§4.5 "wrapping non-ConfigurationException causes").
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("unknown {artifact} provider named '{name}'")]
    UnknownProvider { artifact: &'static str, name: String },

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("{0} and other exporters are mutually exclusive")]
    MutuallyExclusive(&'static str),

    #[error(transparent)]
    Sdk(#[from] otel_sdk::SdkError),

    #[error("{0}")]
    Other(String),
}

pub type ConfigurationResult<T> = Result<T, ConfigurationError>;
