//! End-to-end tests: calls fired through a `QueryLink` over an in-memory
//! duplex link into a served dispatcher.

use std::sync::atomic::AtomicI32;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;

use fleetpack::ObjectCodec;
use fleetpack::TypeDesc;
use fleetpack::Value;
use fleetrpc::Channel;
use fleetrpc::Fault;
use fleetrpc::Rpc;
use fleetrpc::RpcError;
use fleetrun::serve;
use fleetrun::ByteLink;
use fleetrun::DirectChannel;
use fleetrun::Dispatcher;
use fleetrun::DuplexLink;
use fleetrun::HandlerBuilder;
use fleetrun::HandlerRegistry;
use fleetrun::QueryLink;

type R<T> = anyhow::Result<T>;

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

fn arg_i32(args: &[Value], i: usize) -> std::result::Result<i32, Fault> {
    args.get(i)
        .and_then(Value::as_i32)
        .ok_or_else(|| Fault::bare("bad-argument"))
}

/// Calculator plus chain fixtures plus a side-effect counter target.
fn build_cluster() -> R<(Arc<Dispatcher>, Arc<AtomicI32>)> {
    let registry = Arc::new(HandlerRegistry::new());

    let calculator = HandlerBuilder::new("calculator")
        .method("add", vec![TypeDesc::I32, TypeDesc::I32], TypeDesc::I32, |_, args| {
            Ok(Value::I32(arg_i32(args, 0)? + arg_i32(args, 1)?))
        })?
        .method("divide", vec![TypeDesc::I32, TypeDesc::I32], TypeDesc::I32, |_, args| {
            let num = arg_i32(args, 0)?;
            let den = arg_i32(args, 1)?;
            if den == 0 {
                return Err(Fault::new("divide-by-zero", "denominator was zero"));
            }
            Ok(Value::I32(num / den))
        })?
        .build();
    registry.register(calculator)?;

    let maker = HandlerBuilder::new("maker")
        .method("make", vec![], TypeDesc::I32, |_, _| Ok(Value::I32(10)))?
        .build();
    registry.register(maker)?;

    let adder = HandlerBuilder::new("adder")
        .method("add_to", vec![TypeDesc::I32], TypeDesc::I32, |context, args| {
            let base = context
                .and_then(Value::as_i32)
                .ok_or_else(|| Fault::bare("missing-context"))?;
            Ok(Value::I32(base + arg_i32(args, 0)?))
        })?
        .build();
    registry.register(adder)?;

    let bumps = Arc::new(AtomicI32::new(0));
    let count = bumps.clone();
    let counter = HandlerBuilder::new("counter")
        .method("bump", vec![], TypeDesc::I32, move |_, _| {
            Ok(Value::I32(count.fetch_add(1, Ordering::SeqCst) + 1))
        })?
        .build();
    registry.register(counter)?;

    let dispatcher = Dispatcher::new(registry, Arc::new(ObjectCodec::new()));
    Ok((Arc::new(dispatcher), bumps))
}

/// Serves the dispatcher on one end of an in-memory link and hands back a
/// channel speaking to it from the other end.
fn start_server(dispatcher: Arc<Dispatcher>) -> QueryLink {
    let (client, server) = DuplexLink::pair();
    tokio::spawn(serve(Arc::new(server), dispatcher));
    QueryLink::new(Box::new(client))
}

#[tokio::test]
async fn calculator_add_end_to_end() -> R<()> {
    init_tracing();
    let (dispatcher, _) = build_cluster()?;
    let codec = dispatcher.codec().clone();
    let channel = start_server(dispatcher);

    let add = Rpc::new("calculator", "add", vec![Value::I32(2), Value::I32(3)], TypeDesc::I32);
    let result = add.fire_sync(&codec, &channel).await?;
    assert_eq!(result, Value::I32(5));
    Ok(())
}

#[tokio::test]
async fn fired_handle_resolves_off_task() -> R<()> {
    init_tracing();
    let (dispatcher, _) = build_cluster()?;
    let codec = dispatcher.codec().clone();
    let channel: Arc<dyn Channel> = Arc::new(start_server(dispatcher));

    let add = Rpc::new("calculator", "add", vec![Value::I32(20), Value::I32(22)], TypeDesc::I32);
    let handle = add.fire(codec, channel);
    assert_eq!(handle.await??, Value::I32(42));
    Ok(())
}

#[tokio::test]
async fn divide_by_zero_surfaces_as_execution_error() -> R<()> {
    init_tracing();
    let (dispatcher, _) = build_cluster()?;
    let codec = dispatcher.codec().clone();
    let channel = start_server(dispatcher);

    let divide = Rpc::new("calculator", "divide", vec![Value::I32(1), Value::I32(0)], TypeDesc::I32);
    match divide.fire_sync(&codec, &channel).await {
        Err(RpcError::Execution(fault)) => {
            assert_eq!(fault.kind, "divide-by-zero");
            assert_eq!(fault.message.as_deref(), Some("denominator was zero"));
        }
        other => panic!("expected an execution error, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn unknown_target_surfaces_as_execution_error() -> R<()> {
    init_tracing();
    let (dispatcher, _) = build_cluster()?;
    let codec = dispatcher.codec().clone();
    let channel = start_server(dispatcher);

    let call = Rpc::new("nope", "anything", vec![], TypeDesc::I32);
    match call.fire_sync(&codec, &channel).await {
        Err(RpcError::Execution(fault)) => assert_eq!(fault.kind, "unknown-target"),
        other => panic!("expected an execution error, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn fire_and_forget_runs_the_side_effect() -> R<()> {
    init_tracing();
    let (dispatcher, bumps) = build_cluster()?;
    let codec = dispatcher.codec().clone();
    let channel = start_server(dispatcher);

    let bump = Rpc::new("counter", "bump", vec![], TypeDesc::I32);
    bump.fire_and_forget(&codec, &channel).await?;

    // the one-way races the assertion; poll briefly
    for _ in 0..100 {
        if bumps.load(Ordering::SeqCst) == 1 {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("one-way side effect never happened");
}

/// Counts frames leaving the client so a test can assert how many round
/// trips a call cost.
struct CountingLink {
    inner: DuplexLink,
    sent: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl ByteLink for CountingLink {
    async fn send(&self, frame: Vec<u8>) -> fleetrpc::channel::Result<()> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        self.inner.send(frame).await
    }

    async fn recv(&self) -> Option<Vec<u8>> {
        self.inner.recv().await
    }
}

#[tokio::test]
async fn three_entry_chain_costs_one_round_trip() -> R<()> {
    init_tracing();
    let (dispatcher, _) = build_cluster()?;
    let codec = dispatcher.codec().clone();

    let (client, server) = DuplexLink::pair();
    tokio::spawn(serve(Arc::new(server), dispatcher));
    let sent = Arc::new(AtomicUsize::new(0));
    let channel = QueryLink::new(Box::new(CountingLink { inner: client, sent: sent.clone() }));

    // 10, +5, +7
    let chain = Rpc::new("maker", "make", vec![], TypeDesc::I32)
        .join(Rpc::new("adder", "add_to", vec![Value::I32(5)], TypeDesc::I32))
        .join(Rpc::new("adder", "add_to", vec![Value::I32(7)], TypeDesc::I32));
    let result = chain.fire_sync(&codec, &channel).await?;

    assert_eq!(result, Value::I32(22));
    assert_eq!(sent.load(Ordering::SeqCst), 1);
    Ok(())
}

/// Releases client-bound reply frames in reverse order, two at a time, to
/// prove correlation does not rely on arrival order.
struct ReversingLink {
    inner: DuplexLink,
    held: Mutex<Option<Vec<u8>>>,
}

#[async_trait::async_trait]
impl ByteLink for ReversingLink {
    async fn send(&self, frame: Vec<u8>) -> fleetrpc::channel::Result<()> {
        let mut held = self.held.lock().await;
        match held.take() {
            Some(first) => {
                self.inner.send(frame).await?;
                self.inner.send(first).await
            }
            None => {
                *held = Some(frame);
                Ok(())
            }
        }
    }

    async fn recv(&self) -> Option<Vec<u8>> {
        self.inner.recv().await
    }
}

#[tokio::test]
async fn replies_correlate_out_of_order() -> R<()> {
    init_tracing();
    let (dispatcher, _) = build_cluster()?;
    let codec = dispatcher.codec().clone();

    let (client, server) = DuplexLink::pair();
    let reversing = ReversingLink { inner: server, held: Mutex::new(None) };
    tokio::spawn(async move {
        let link: Arc<dyn ByteLink> = Arc::new(reversing);
        serve(link, dispatcher).await;
    });
    let channel = Arc::new(QueryLink::new(Box::new(client)));

    let small = Rpc::new("calculator", "add", vec![Value::I32(1), Value::I32(2)], TypeDesc::I32);
    let large = Rpc::new("calculator", "add", vec![Value::I32(10), Value::I32(20)], TypeDesc::I32);

    let (a, b) = tokio::join!(
        small.fire_sync(&codec, channel.as_ref()),
        large.fire_sync(&codec, channel.as_ref()),
    );
    assert_eq!(a?, Value::I32(3));
    assert_eq!(b?, Value::I32(30));
    Ok(())
}

#[tokio::test]
async fn concurrent_queries_all_correlate() -> R<()> {
    init_tracing();
    let (dispatcher, _) = build_cluster()?;
    let codec = dispatcher.codec().clone();
    let channel: Arc<dyn Channel> = Arc::new(start_server(dispatcher));

    let mut expected = Vec::new();
    let mut handles = Vec::new();
    let mut rng = rand::thread_rng();
    for _ in 0..16 {
        let x: i32 = rng.gen_range(0..1000);
        let y: i32 = rng.gen_range(0..1000);
        expected.push(x + y);
        let add = Rpc::new("calculator", "add", vec![Value::I32(x), Value::I32(y)], TypeDesc::I32);
        handles.push(add.fire(codec.clone(), channel.clone()));
    }
    for (handle, want) in handles.into_iter().zip(expected) {
        assert_eq!(handle.await??, Value::I32(want));
    }
    Ok(())
}

#[tokio::test]
async fn direct_channel_loops_back_in_process() -> R<()> {
    init_tracing();
    let (dispatcher, _) = build_cluster()?;
    let codec = dispatcher.codec().clone();
    let channel = DirectChannel::new(dispatcher);

    let add = Rpc::new("calculator", "add", vec![Value::I32(2), Value::I32(3)], TypeDesc::I32);
    assert_eq!(add.fire_sync(&codec, &channel).await?, Value::I32(5));
    Ok(())
}
