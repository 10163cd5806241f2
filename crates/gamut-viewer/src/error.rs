//! Error taxonomy for the viewer core.
//!
//! Every failure is surfaced synchronously to the calling control layer;
//! nothing here triggers an automatic retry.

use thiserror::Error;

/// Main error type for viewer operations.
#[derive(Error, Debug)]
pub enum ViewerError {
    /// No compatible GPU context is available. Fatal at initialization.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// A requested allocation exceeds the negotiated device limits.
    /// Reported before dispatch; the previous cloud stays displayed.
    #[error("resource exhaustion: requested {requested} bytes, device limit {limit}")]
    ResourceExhaustion { requested: u64, limit: u64 },

    /// Input data that does not match its declared shape.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A selector or parameter outside the accepted set. Prior state is
    /// retained; the operation is a no-op.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Result type alias for viewer operations.
pub type Result<T> = std::result::Result<T, ViewerError>;
