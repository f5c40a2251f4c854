//! SDK-wide error type.
//!
//! The core never surfaces this from a recording call (§7 propagation
//! policy): it is returned only from explicit `force_flush()`/`shutdown()`
//! calls and from provider `build()`. Per-measurement problems (NaN, unknown
//! instrument, negative value on a monotonic counter) are dropped with a
//! rate-limited warning instead of an `Err`.

use thiserror::Error;

pub type SdkResult<T> = Result<T, SdkError>;

#[derive(Error, Debug)]
pub enum SdkError {
    #[error("export failed: {0}")]
    Export(String),

    #[error("export timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("operation attempted after shutdown")]
    AlreadyShutdown,

    #[error("channel to the background worker is closed")]
    ChannelClosed,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<String> for SdkError {
    fn from(s: String) -> Self {
        SdkError::Config(s)
    }
}
