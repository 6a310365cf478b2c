//! Loopback channel that feeds the dispatcher in-process, no link involved.
//! Mainly a test double; also handy for callers living in the same process
//! as the handlers they talk to.

use std::sync::Arc;

use fleetrpc::channel;
use fleetrpc::Channel;
use fleetrpc::ChannelError;

use crate::dispatch::Dispatcher;

pub struct DirectChannel {
    dispatcher: Arc<Dispatcher>,
}

impl DirectChannel {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait::async_trait]
impl Channel for DirectChannel {
    async fn send_one_way(&self, payload: Vec<u8>) -> channel::Result<()> {
        self.dispatcher
            .handle_one_way(payload)
            .map_err(|e| ChannelError::Io(e.to_string()))
    }

    async fn send_query(&self, payload: Vec<u8>) -> channel::Result<Vec<u8>> {
        self.dispatcher
            .handle_query(payload)
            .map_err(|e| ChannelError::Io(e.to_string()))
    }
}
