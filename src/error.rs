//! Error types for the media pipeline
//!
//! A single crate-wide error enum covers buffer, stage and pipeline
//! operations. Stages report end-of-stream through [`Error::Exhausted`];
//! buffers convert any pull failure into permanent exhaustion.

use thiserror::Error;

/// Result type alias using the crate's [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for pipeline operations
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed argument: bad watermarks, out-of-range output index,
    /// wrong-direction connect
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Identifier lookup miss
    #[error("not found: {0}")]
    NotFound(String),

    /// Upstream production has ended
    #[error("upstream exhausted")]
    Exhausted,

    /// I/O failure while producing data
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Packet payload could not be allocated
    #[error("out of memory")]
    OutOfMemory,

    /// Capability not supported by this stage
    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// Container data could not be parsed
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// No async runtime available to run a refill task
    #[error("runtime unavailable: {0}")]
    Runtime(String),
}

impl Error {
    /// Whether this error marks the end of a stream rather than a fault
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Error::Exhausted)
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }
}
