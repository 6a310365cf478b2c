//! # fleetrun
//!
//! The server side of the RPC system: method tables with bound invokers, a
//! handler registry, and the dispatcher that turns request bytes into
//! invocations and response bytes.
//!
//! Also ships the plumbing that makes the workspace end-to-end runnable: a
//! framed duplex byte link, a correlating query link that implements
//! [`fleetrpc::Channel`] over it, a serving loop, and an in-process loopback
//! channel for tests.

pub mod direct;
pub mod dispatch;
pub mod invoke;
pub mod link;
pub mod registry;

pub use direct::DirectChannel;
pub use dispatch::DispatchError;
pub use dispatch::Dispatcher;
pub use invoke::Handler;
pub use invoke::HandlerBuilder;
pub use invoke::Invoker;
pub use invoke::MethodSpec;
pub use invoke::RegistryError;
pub use link::serve;
pub use link::ByteLink;
pub use link::DuplexLink;
pub use link::QueryLink;
pub use registry::HandlerRegistry;

#[cfg(test)]
mod tests;
