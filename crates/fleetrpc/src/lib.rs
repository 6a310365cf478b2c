//! # fleetrpc
//!
//! Remote procedure calls over opaque byte channels.
//!
//! A call names a target (a registered handler), a method, and carries its
//! arguments as [`fleetpack`] objects. Calls can be chained so that one
//! network round trip walks a path of receivers on the remote side. Remote
//! failures travel back as marshalled [`Fault`]s and surface locally as
//! [`RpcError::Execution`].
//!
//! The wire format is schema-agreed: the caller and the remote dispatcher
//! must resolve identical type descriptors for every method signature.
//! Nothing here frames or correlates messages; that is the [`Channel`]
//! implementation's concern.

pub mod chain;
pub mod channel;
pub mod error;
pub mod fault;
pub mod frame;
pub mod rpc;

pub use chain::RpcChain;
pub use channel::Channel;
pub use channel::ChannelError;
pub use error::Result;
pub use error::RpcError;
pub use fault::Fault;
pub use fault::FaultFrame;
pub use rpc::Rpc;
