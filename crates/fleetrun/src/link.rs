//! # Links
//!
//! A [`ByteLink`] moves framed, ordered, opaque byte frames between two
//! peers. [`QueryLink`] layers query/response correlation over one and
//! implements [`Channel`], pairing each response with its query by id even
//! when the peer answers out of order. [`serve`] is the matching server loop.
//!
//! Link frame layout: `u64 correlation_id, u8 kind, payload` where kind is
//! `0` one-way, `1` query, `2` reply. One-way frames carry id `0`; it is
//! never correlated.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::warn;

use fleetpack::Buf;
use fleetrpc::channel;
use fleetrpc::Channel;
use fleetrpc::ChannelError;

use crate::dispatch::Dispatcher;

const KIND_ONE_WAY: u8 = 0;
const KIND_QUERY: u8 = 1;
const KIND_REPLY: u8 = 2;

/// How long a query waits for its reply before failing with
/// [`ChannelError::Timeout`].
const QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// A framed, ordered, duplex byte pipe.
#[async_trait::async_trait]
pub trait ByteLink: Send + Sync + 'static {
    async fn send(&self, frame: Vec<u8>) -> channel::Result<()>;

    /// Receives the next frame; `None` means the link is gone for good.
    async fn recv(&self) -> Option<Vec<u8>>;
}

/// In-memory [`ByteLink`] over tokio mpsc channels. Frames sent on one side
/// of a [`DuplexLink::pair`] appear on the other side's `recv`.
pub struct DuplexLink {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl DuplexLink {
    /// Creates two connected ends.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        let a = Self { tx: tx_a, rx: Mutex::new(rx_b) };
        let b = Self { tx: tx_b, rx: Mutex::new(rx_a) };
        (a, b)
    }
}

#[async_trait::async_trait]
impl ByteLink for DuplexLink {
    async fn send(&self, frame: Vec<u8>) -> channel::Result<()> {
        self.tx
            .send(frame)
            .map_err(|_| ChannelError::ConnectionLost("link closed".into()))
    }

    async fn recv(&self) -> Option<Vec<u8>> {
        self.rx.lock().await.recv().await
    }
}

fn encode_frame(id: u64, kind: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = Buf::with_capacity(9 + payload.len());
    buf.write_u64(id);
    buf.write_u8(kind);
    let mut bytes = buf.into_bytes();
    bytes.extend_from_slice(payload);
    bytes
}

fn decode_frame(bytes: Vec<u8>) -> fleetpack::Result<(u64, u8, Vec<u8>)> {
    let mut buf = Buf::from_bytes(bytes);
    let id = buf.read_u64()?;
    let kind = buf.read_u8()?;
    Ok((id, kind, buf.read_remaining()))
}

/// Query/response correlation over a [`ByteLink`], implementing [`Channel`].
///
/// A background pump routes reply frames to their waiting queries by
/// correlation id. When the link dies every pending query fails; nothing
/// waits forever.
pub struct QueryLink {
    link: Arc<dyn ByteLink>,
    pending: Arc<DashMap<u64, oneshot::Sender<channel::Result<Vec<u8>>>>>,
    id_gen: AtomicU64,
}

impl QueryLink {
    /// Takes ownership of the client end of a link and spawns the pump task.
    pub fn new(link: Box<dyn ByteLink>) -> Self {
        let link: Arc<dyn ByteLink> = Arc::from(link);
        let pending: Arc<DashMap<u64, oneshot::Sender<channel::Result<Vec<u8>>>>> =
            Arc::new(DashMap::new());

        let pump_link = link.clone();
        let pump_pending = pending.clone();
        tokio::spawn(async move {
            while let Some(frame) = pump_link.recv().await {
                match decode_frame(frame) {
                    Ok((id, KIND_REPLY, payload)) => {
                        match pump_pending.remove(&id) {
                            Some((_, tx)) => {
                                let _ = tx.send(Ok(payload));
                            }
                            // late reply after timeout, or a duplicate
                            None => debug!(id, "reply with no pending query"),
                        }
                    }
                    Ok((id, kind, _)) => warn!(id, kind, "unexpected frame kind on client link"),
                    Err(e) => warn!(error = %e, "undecodable link frame"),
                }
            }
            // link gone: fail everything still waiting
            let ids: Vec<u64> = pump_pending.iter().map(|entry| *entry.key()).collect();
            for id in ids {
                if let Some((_, tx)) = pump_pending.remove(&id) {
                    let _ = tx.send(Err(ChannelError::ConnectionLost("link closed".into())));
                }
            }
        });

        Self { link, pending, id_gen: AtomicU64::new(1) }
    }
}

#[async_trait::async_trait]
impl Channel for QueryLink {
    async fn send_one_way(&self, payload: Vec<u8>) -> channel::Result<()> {
        self.link.send(encode_frame(0, KIND_ONE_WAY, &payload)).await
    }

    async fn send_query(&self, payload: Vec<u8>) -> channel::Result<Vec<u8>> {
        let id = self.id_gen.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        if let Err(e) = self.link.send(encode_frame(id, KIND_QUERY, &payload)).await {
            self.pending.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(QUERY_TIMEOUT, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                self.pending.remove(&id);
                Err(ChannelError::Closed)
            }
            Err(_) => {
                self.pending.remove(&id);
                Err(ChannelError::Timeout)
            }
        }
    }
}

/// Server loop: dispatches every inbound frame until the link closes.
/// Queries are answered with a reply frame carrying the same correlation id;
/// one-ways are dispatched without a reply. Undecodable frames and requests
/// are logged and dropped.
pub async fn serve(link: Arc<dyn ByteLink>, dispatcher: Arc<Dispatcher>) {
    while let Some(frame) = link.recv().await {
        let (id, kind, payload) = match decode_frame(frame) {
            Ok(parts) => parts,
            Err(e) => {
                warn!(error = %e, "undecodable link frame");
                continue;
            }
        };
        match kind {
            KIND_ONE_WAY => {
                if let Err(e) = dispatcher.handle_one_way(payload) {
                    warn!(error = %e, "dropping corrupt one-way request");
                }
            }
            KIND_QUERY => match dispatcher.handle_query(payload) {
                Ok(response) => {
                    if link.send(encode_frame(id, KIND_REPLY, &response)).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!(id, error = %e, "dropping corrupt query"),
            },
            other => warn!(id, kind = other, "unexpected frame kind on server link"),
        }
    }
    debug!("link closed, server loop done");
}
