//! # Channel Abstraction
//!
//! A minimal, async interface for moving encoded calls between peers.
//!
//! ## Philosophy
//!
//! - **Byte-Oriented**: A channel knows nothing about frames, values, or
//!   descriptors. It moves opaque buffers.
//! - **Correlation Inside**: `send_query` pairs its response with the request
//!   internally; callers never see correlation ids.

use std::fmt;

/// Errors that occur at the channel/transport layer.
#[derive(Debug, Clone)]
pub enum ChannelError {
    /// The peer is unreachable or the connection was dropped.
    ConnectionLost(String),
    /// The query timed out before a response arrived.
    Timeout,
    /// The channel was shut down while the operation was in flight.
    Closed,
    /// Generic I/O error or internal channel failure.
    Io(String),
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionLost(msg) => write!(f, "connection lost: {}", msg),
            Self::Timeout => write!(f, "query timed out"),
            Self::Closed => write!(f, "channel closed"),
            Self::Io(msg) => write!(f, "i/o error: {}", msg),
        }
    }
}

impl std::error::Error for ChannelError {}

pub type Result<T> = std::result::Result<T, ChannelError>;

/// A mechanism to send an encoded call to the remote dispatcher.
///
/// This trait is designed to be object-safe (`Arc<dyn Channel>`). Both
/// operations take `&self`; implementations must tolerate concurrent sends
/// from any number of tasks.
#[async_trait::async_trait]
pub trait Channel: Send + Sync + 'static {
    /// Sends a payload without waiting for a response.
    async fn send_one_way(&self, payload: Vec<u8>) -> Result<()>;

    /// Sends a payload and waits for the correlated response bytes.
    ///
    /// # invariants
    /// - Must return the response to *this* payload, even when queries
    ///   complete out of order.
    /// - Must return `Err` (never hang forever) if the peer goes away.
    /// - Must not interpret the payload content.
    async fn send_query(&self, payload: Vec<u8>) -> Result<Vec<u8>>;
}
