//! # Error Definitions
//!
//! The three ways a fired call can fail, kept distinct because callers react
//! differently to each: channel failures are retryable, executions carry a
//! remote fault that must not be blindly retried, and codec failures mean the
//! two sides disagree on the schema.

use crate::channel::ChannelError;
use crate::fault::Fault;

use fleetpack::Error as PackError;

#[derive(Debug)]
pub enum RpcError {
    /// The channel failed before a response was decoded. `call` describes the
    /// originating call (`target.method`) for diagnostics.
    Channel { call: String, source: ChannelError },
    /// The remote method ran and failed; the marshalled fault is the
    /// re-thrown remote failure.
    Execution(Fault),
    /// Encoding or decoding failed. The peers disagree on the wire schema;
    /// retrying cannot help.
    Codec(PackError),
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Channel { call, source } => write!(f, "channel failure during {}: {}", call, source),
            Self::Execution(fault) => write!(f, "remote execution failed: {}", fault),
            Self::Codec(e) => write!(f, "codec failure: {}", e),
        }
    }
}

impl std::error::Error for RpcError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Channel { source, .. } => Some(source),
            Self::Execution(fault) => Some(fault),
            Self::Codec(e) => Some(e),
        }
    }
}

impl From<PackError> for RpcError {
    fn from(e: PackError) -> Self {
        Self::Codec(e)
    }
}

impl From<Fault> for RpcError {
    fn from(fault: Fault) -> Self {
        Self::Execution(fault)
    }
}

/// A specialized Result type for RPC operations.
pub type Result<T> = std::result::Result<T, RpcError>;
