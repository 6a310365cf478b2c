//! # Calls
//!
//! An [`Rpc`] is an immutable description of one remote call: target handler,
//! method name, arguments, and the descriptor its result decodes under.
//! Whether the remote should send a result back is not part of the call; it
//! is chosen by the firing function.

use std::sync::Arc;

use crate::chain::RpcChain;
use crate::channel::Channel;
use crate::error::Result;
use crate::error::RpcError;
use crate::frame;
use crate::frame::CallFrame;

use fleetpack::Buf;
use fleetpack::ObjectCodec;
use fleetpack::TypeDesc;
use fleetpack::Value;

use tokio::task::JoinHandle;
use tracing::debug;

/// One remote call, ready to fire any number of times.
#[derive(Debug, Clone)]
pub struct Rpc {
    target: String,
    method: String,
    args: Vec<Value>,
    result_desc: TypeDesc,
}

impl Rpc {
    pub fn new(
        target: impl Into<String>,
        method: impl Into<String>,
        args: Vec<Value>,
        result_desc: TypeDesc,
    ) -> Self {
        Self { target: target.into(), method: method.into(), args, result_desc }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn result_desc(&self) -> &TypeDesc {
        &self.result_desc
    }

    /// `target.method`, for diagnostics.
    pub fn describe(&self) -> String {
        format!("{}.{}", self.target, self.method)
    }

    /// Chains `next` after this call: on the remote side this call's result
    /// becomes the receiver `next` is resolved against.
    pub fn join(self, next: Rpc) -> RpcChain {
        RpcChain::new(self, next)
    }

    pub(crate) fn encode(&self, codec: &ObjectCodec, expects_result: bool) -> Result<Vec<u8>> {
        let mut buf = Buf::new();
        CallFrame::new(&self.target, &self.method, expects_result, &self.args)
            .encode(&mut buf, codec)?;
        Ok(buf.into_bytes())
    }

    /// Sends the call as a query and awaits the decoded result inline.
    pub async fn fire_sync<C>(&self, codec: &ObjectCodec, channel: &C) -> Result<Value>
    where
        C: Channel + ?Sized,
    {
        let payload = self.encode(codec, true)?;
        debug!(call = %self.describe(), bytes = payload.len(), "firing query");
        let reply = channel
            .send_query(payload)
            .await
            .map_err(|source| RpcError::Channel { call: self.describe(), source })?;
        decode_reply(reply, codec, &self.result_desc)
    }

    /// Fires the call on a spawned task and hands back the join handle.
    /// Dropping the handle does not cancel the remote invocation.
    pub fn fire(&self, codec: Arc<ObjectCodec>, channel: Arc<dyn Channel>) -> JoinHandle<Result<Value>> {
        let call = self.clone();
        tokio::spawn(async move { call.fire_sync(codec.as_ref(), channel.as_ref()).await })
    }

    /// Sends the call one-way with no result expected; the remote invokes
    /// the method and discards its outcome.
    pub async fn fire_and_forget<C>(&self, codec: &ObjectCodec, channel: &C) -> Result<()>
    where
        C: Channel + ?Sized,
    {
        let payload = self.encode(codec, false)?;
        debug!(call = %self.describe(), bytes = payload.len(), "firing one-way");
        channel
            .send_one_way(payload)
            .await
            .map_err(|source| RpcError::Channel { call: self.describe(), source })
    }
}

/// Decodes a reply under the given result descriptor; a failure response
/// surfaces as [`RpcError::Execution`], never as a success value.
pub(crate) fn decode_reply(
    reply: Vec<u8>,
    codec: &ObjectCodec,
    result_desc: &TypeDesc,
) -> Result<Value> {
    let mut buf = Buf::from_bytes(reply);
    match frame::read_response(&mut buf, codec, result_desc)? {
        Ok(value) => Ok(value),
        Err(fault) => Err(RpcError::Execution(fault)),
    }
}
