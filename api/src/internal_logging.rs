//! Internal diagnostic logging for the SDK and its processors/exporters.
//!
//! These macros are for the SDK's own use (dropped measurements, exporter
//! failures, configuration warnings) and are compiled out entirely unless
//! the `internal-logs` feature enables the `tracing` backend. They are not
//! meant for application-level logging.

#![allow(unused_macros)]

/// Logs an informational internal event.
#[macro_export]
macro_rules! otel_info {
    (name: $name:expr $(, $key:ident = $value:expr)* $(,)?) => {
        #[cfg(feature = "internal-logs")]
        { tracing::info!(name: $name, target: env!("CARGO_PKG_NAME"), $($key = $value),*, ""); }
        #[cfg(not(feature = "internal-logs"))]
        { let _ = ($name, $(&$value),*); }
    };
}

/// Logs a warning: something was dropped or degraded but the SDK continues.
#[macro_export]
macro_rules! otel_warn {
    (name: $name:expr $(, $key:ident = $value:expr)* $(,)?) => {
        #[cfg(feature = "internal-logs")]
        { tracing::warn!(name: $name, target: env!("CARGO_PKG_NAME"), $($key = $value),*, ""); }
        #[cfg(not(feature = "internal-logs"))]
        { let _ = ($name, $(&$value),*); }
    };
}

/// Logs an SDK error (exporter failure, etc). Never used for recoverable
/// per-measurement drops -- use [`otel_warn!`] for those.
#[macro_export]
macro_rules! otel_error {
    (name: $name:expr $(, $key:ident = $value:expr)* $(,)?) => {
        #[cfg(feature = "internal-logs")]
        { tracing::error!(name: $name, target: env!("CARGO_PKG_NAME"), $($key = $value),*, ""); }
        #[cfg(not(feature = "internal-logs"))]
        { let _ = ($name, $(&$value),*); }
    };
}

/// Fine-grained tracing of SDK internals, off by default even with internal-logs on
/// unless the host also enables the `tracing` `TRACE` level.
#[macro_export]
macro_rules! otel_debug {
    (name: $name:expr $(, $key:ident = $value:expr)* $(,)?) => {
        #[cfg(feature = "internal-logs")]
        { tracing::debug!(name: $name, target: env!("CARGO_PKG_NAME"), $($key = $value),*, ""); }
        #[cfg(not(feature = "internal-logs"))]
        { let _ = ($name, $(&$value),*); }
    };
}
