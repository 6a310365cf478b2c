//! # Call Chains
//!
//! A chain walks a path of receivers in one network round trip: the remote
//! dispatcher invokes each entry in order and feeds entry *n*'s result to
//! entry *n+1* as the receiver context. Only the terminal entry's result
//! comes back.

use std::sync::Arc;

use crate::channel::Channel;
use crate::error::Result;
use crate::error::RpcError;
use crate::frame::CallFrame;
use crate::frame::ChainFrame;
use crate::rpc::decode_reply;
use crate::rpc::Rpc;

use fleetpack::Buf;
use fleetpack::ObjectCodec;
use fleetpack::Value;

use tokio::task::JoinHandle;
use tracing::debug;

/// An ordered chain of at least two calls, fired as a single request.
#[derive(Debug, Clone)]
pub struct RpcChain {
    head: Rpc,
    rest: Vec<Rpc>,
}

impl RpcChain {
    pub(crate) fn new(head: Rpc, next: Rpc) -> Self {
        Self { head, rest: vec![next] }
    }

    /// Appends another call; its receiver is the previous entry's result.
    pub fn join(mut self, next: Rpc) -> Self {
        self.rest.push(next);
        self
    }

    pub fn len(&self) -> usize {
        1 + self.rest.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = &Rpc> {
        std::iter::once(&self.head).chain(self.rest.iter())
    }

    /// The entry whose result descriptor decodes the response.
    fn terminal(&self) -> &Rpc {
        self.rest.last().unwrap_or(&self.head)
    }

    /// `a.m1 -> b.m2 -> ...`, for diagnostics.
    pub fn describe(&self) -> String {
        self.entries().map(Rpc::describe).collect::<Vec<_>>().join(" -> ")
    }

    /// Encodes the chain request. Every entry but the terminal one is marked
    /// as expecting a result: the remote needs each intermediate receiver to
    /// resolve the next entry. The terminal flag follows the firing mode.
    pub(crate) fn encode(&self, codec: &ObjectCodec, terminal_expects_result: bool) -> Result<Vec<u8>> {
        let len = self.len();
        let frames: Vec<CallFrame<'_>> = self
            .entries()
            .enumerate()
            .map(|(i, call)| {
                let expects = if i + 1 == len { terminal_expects_result } else { true };
                CallFrame::new(call.target(), call.method(), expects, call.args())
            })
            .collect();
        let mut buf = Buf::new();
        ChainFrame { entries: &frames }.encode(&mut buf, codec)?;
        Ok(buf.into_bytes())
    }

    /// Sends the chain as one query and awaits the terminal result inline.
    pub async fn fire_sync<C>(&self, codec: &ObjectCodec, channel: &C) -> Result<Value>
    where
        C: Channel + ?Sized,
    {
        let payload = self.encode(codec, true)?;
        debug!(chain = %self.describe(), bytes = payload.len(), "firing chain query");
        let reply = channel
            .send_query(payload)
            .await
            .map_err(|source| RpcError::Channel { call: self.describe(), source })?;
        decode_reply(reply, codec, self.terminal().result_desc())
    }

    /// Fires the chain on a spawned task and hands back the join handle.
    pub fn fire(&self, codec: Arc<ObjectCodec>, channel: Arc<dyn Channel>) -> JoinHandle<Result<Value>> {
        let chain = self.clone();
        tokio::spawn(async move { chain.fire_sync(codec.as_ref(), channel.as_ref()).await })
    }

    /// Sends the chain one-way; the remote walks the whole path and discards
    /// the terminal outcome.
    pub async fn fire_and_forget<C>(&self, codec: &ObjectCodec, channel: &C) -> Result<()>
    where
        C: Channel + ?Sized,
    {
        let payload = self.encode(codec, false)?;
        debug!(chain = %self.describe(), bytes = payload.len(), "firing chain one-way");
        channel
            .send_one_way(payload)
            .await
            .map_err(|source| RpcError::Channel { call: self.describe(), source })
    }
}
