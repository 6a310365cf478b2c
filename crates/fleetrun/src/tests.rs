use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use fleetpack::Buf;
use fleetpack::ObjectCodec;
use fleetpack::TypeDesc;
use fleetpack::Value;
use fleetrpc::frame;
use fleetrpc::frame::CallFrame;
use fleetrpc::frame::ChainFrame;
use fleetrpc::Fault;
use fleetrpc::FaultFrame;

use crate::DispatchError;
use crate::Dispatcher;
use crate::Handler;
use crate::HandlerBuilder;
use crate::HandlerRegistry;
use crate::RegistryError;

type R<T> = anyhow::Result<T>;

fn arg_i32(args: &[Value], i: usize) -> std::result::Result<i32, Fault> {
    args.get(i)
        .and_then(Value::as_i32)
        .ok_or_else(|| Fault::bare("bad-argument"))
}

fn calculator() -> R<Handler> {
    let handler = HandlerBuilder::new("calculator")
        .method("add", vec![TypeDesc::I32, TypeDesc::I32], TypeDesc::I32, |_, args| {
            Ok(Value::I32(arg_i32(args, 0)? + arg_i32(args, 1)?))
        })?
        .method("divide", vec![TypeDesc::I32, TypeDesc::I32], TypeDesc::I32, |_, args| {
            let num = arg_i32(args, 0)?;
            let den = arg_i32(args, 1)?;
            if den == 0 {
                let mut fault = Fault::new("divide-by-zero", "denominator was zero");
                fault.push_frame(FaultFrame::new("calculator::Divider", "divide"));
                return Err(fault);
            }
            Ok(Value::I32(num / den))
        })?
        .build();
    Ok(handler)
}

/// Dispatcher with a calculator plus the two chain fixtures: `maker` makes
/// values (or `Null`), `adder` adds its argument to the chain context and
/// counts its invocations.
fn dispatcher() -> R<(Dispatcher, Arc<AtomicUsize>)> {
    let registry = Arc::new(HandlerRegistry::new());
    registry.register(calculator()?)?;

    let maker = HandlerBuilder::new("maker")
        .method("make", vec![], TypeDesc::I32, |_, _| Ok(Value::I32(10)))?
        .method("nothing", vec![], TypeDesc::I32, |_, _| Ok(Value::Null))?
        .method("missing", vec![], TypeDesc::Str, |_, _| Ok(Value::Null))?
        .build();
    registry.register(maker)?;

    let invocations = Arc::new(AtomicUsize::new(0));
    let count = invocations.clone();
    let adder = HandlerBuilder::new("adder")
        .method("add_to", vec![TypeDesc::I32], TypeDesc::I32, move |context, args| {
            count.fetch_add(1, Ordering::SeqCst);
            let base = context
                .and_then(Value::as_i32)
                .ok_or_else(|| Fault::bare("missing-context"))?;
            Ok(Value::I32(base + arg_i32(args, 0)?))
        })?
        .build();
    registry.register(adder)?;

    Ok((Dispatcher::new(registry, Arc::new(ObjectCodec::new())), invocations))
}

fn encode_call(codec: &ObjectCodec, target: &str, method: &str, args: &[Value]) -> R<Vec<u8>> {
    let mut buf = Buf::new();
    CallFrame::new(target, method, true, args).encode(&mut buf, codec)?;
    Ok(buf.into_bytes())
}

fn decode(response: Vec<u8>, desc: &TypeDesc) -> R<std::result::Result<Value, Fault>> {
    let codec = ObjectCodec::new();
    let mut buf = Buf::from_bytes(response);
    Ok(frame::read_response(&mut buf, &codec, desc)?)
}

// ==== REGISTRATION TESTS ====

#[test]
fn builder_rejects_duplicate_method_names() -> R<()> {
    let result = HandlerBuilder::new("calculator")
        .method("add", vec![], TypeDesc::I32, |_, _| Ok(Value::I32(0)))?
        .method("add", vec![TypeDesc::I32], TypeDesc::I32, |_, _| Ok(Value::I32(0)));
    match result {
        Err(RegistryError::DuplicateMethod(name)) => assert_eq!(name, "add"),
        _ => panic!("expected DuplicateMethod"),
    }
    Ok(())
}

#[test]
fn handler_lookup_of_missing_method_fails() -> R<()> {
    let handler = calculator()?;
    assert!(handler.method("add").is_ok());
    assert!(handler.method("divide").is_ok());
    match handler.method("multiply") {
        Err(RegistryError::NoSuchMethod(name)) => assert_eq!(name, "multiply"),
        _ => panic!("expected NoSuchMethod"),
    }
    Ok(())
}

#[test]
fn registry_register_unregister_lookup() -> R<()> {
    let registry = HandlerRegistry::new();
    registry.register(calculator()?)?;
    assert!(registry.lookup("calculator").is_some());

    match registry.register(calculator()?) {
        Err(RegistryError::DuplicateTarget(name)) => assert_eq!(name, "calculator"),
        _ => panic!("expected DuplicateTarget"),
    }

    assert!(registry.unregister("calculator").is_some());
    assert!(registry.lookup("calculator").is_none());
    assert!(registry.unregister("calculator").is_none());
    Ok(())
}

// ==== DISPATCH TESTS ====

#[test]
fn query_invokes_the_resolved_method() -> R<()> {
    let (dispatcher, _) = dispatcher()?;
    let request = encode_call(
        dispatcher.codec(),
        "calculator",
        "add",
        &[Value::I32(2), Value::I32(3)],
    )?;
    let response = dispatcher.handle_query(request)?;
    assert_eq!(decode(response, &TypeDesc::I32)?, Ok(Value::I32(5)));
    Ok(())
}

#[test]
fn unknown_target_becomes_a_fault_response() -> R<()> {
    let (dispatcher, _) = dispatcher()?;
    let request = encode_call(dispatcher.codec(), "nope", "add", &[])?;
    let response = dispatcher.handle_query(request)?;
    match decode(response, &TypeDesc::I32)? {
        Err(fault) => assert_eq!(fault.kind, "unknown-target"),
        Ok(_) => panic!("expected a fault response"),
    }
    Ok(())
}

#[test]
fn unknown_method_becomes_a_fault_response() -> R<()> {
    let (dispatcher, _) = dispatcher()?;
    let request = encode_call(dispatcher.codec(), "calculator", "multiply", &[])?;
    let response = dispatcher.handle_query(request)?;
    match decode(response, &TypeDesc::I32)? {
        Err(fault) => assert_eq!(fault.kind, "unknown-method"),
        Ok(_) => panic!("expected a fault response"),
    }
    Ok(())
}

#[test]
fn wrong_argument_count_becomes_a_fault_response() -> R<()> {
    let (dispatcher, _) = dispatcher()?;
    let request = encode_call(dispatcher.codec(), "calculator", "add", &[Value::I32(2)])?;
    let response = dispatcher.handle_query(request)?;
    match decode(response, &TypeDesc::I32)? {
        Err(fault) => assert_eq!(fault.kind, "bad-argument-count"),
        Ok(_) => panic!("expected a fault response"),
    }
    Ok(())
}

#[test]
fn handler_fault_is_marshalled_without_dispatch_frames() -> R<()> {
    let (dispatcher, _) = dispatcher()?;
    let request = encode_call(
        dispatcher.codec(),
        "calculator",
        "divide",
        &[Value::I32(1), Value::I32(0)],
    )?;
    let response = dispatcher.handle_query(request)?;
    match decode(response, &TypeDesc::I32)? {
        Err(fault) => {
            assert_eq!(fault.kind, "divide-by-zero");
            // the handler frame survives, the dispatcher boundary does not
            assert_eq!(fault.frames.len(), 1);
            assert_eq!(fault.frames[0].type_name, "calculator::Divider");
            assert!(!fault.frames.iter().any(FaultFrame::is_dispatch_boundary));
        }
        Ok(_) => panic!("expected a fault response"),
    }
    Ok(())
}

#[test]
fn one_way_discards_the_fault() -> R<()> {
    let (dispatcher, _) = dispatcher()?;
    let request = encode_call(
        dispatcher.codec(),
        "calculator",
        "divide",
        &[Value::I32(1), Value::I32(0)],
    )?;
    dispatcher.handle_one_way(request)?;
    Ok(())
}

#[test]
fn corrupt_request_is_a_hard_error() -> R<()> {
    let (dispatcher, _) = dispatcher()?;
    // a lone chain discriminator with no entry count behind it
    match dispatcher.handle_query(vec![1]) {
        Err(DispatchError::Corrupt(_)) => Ok(()),
        other => panic!("expected Corrupt, got {:?}", other.map(|_| ())),
    }
}

// ==== CHAIN TESTS ====

fn encode_chain(codec: &ObjectCodec, entries: &[CallFrame<'_>]) -> R<Vec<u8>> {
    let mut buf = Buf::new();
    ChainFrame { entries }.encode(&mut buf, codec)?;
    Ok(buf.into_bytes())
}

#[test]
fn chain_threads_each_result_into_the_next_entry() -> R<()> {
    let (dispatcher, _) = dispatcher()?;
    let five = [Value::I32(5)];
    let request = encode_chain(
        dispatcher.codec(),
        &[
            CallFrame::new("maker", "make", true, &[]),
            CallFrame::new("adder", "add_to", true, &five),
        ],
    )?;
    let response = dispatcher.handle_query(request)?;
    assert_eq!(decode(response, &TypeDesc::I32)?, Ok(Value::I32(15)));
    Ok(())
}

#[test]
fn null_intermediate_result_short_circuits_the_chain() -> R<()> {
    let (dispatcher, invocations) = dispatcher()?;
    let five = [Value::I32(5)];
    let request = encode_chain(
        dispatcher.codec(),
        &[
            CallFrame::new("maker", "nothing", true, &[]),
            CallFrame::new("adder", "add_to", true, &five),
        ],
    )?;
    let response = dispatcher.handle_query(request)?;
    assert_eq!(decode(response, &TypeDesc::I32)?, Ok(Value::Null));
    // the second entry never ran
    assert_eq!(invocations.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn null_short_circuit_decodes_under_the_terminal_descriptor() -> R<()> {
    // the short-circuiting entry declares Str while the terminal entry (and
    // thus the caller) declares I32; the Null response must decode under
    // the caller's descriptor regardless
    let (dispatcher, invocations) = dispatcher()?;
    let five = [Value::I32(5)];
    let request = encode_chain(
        dispatcher.codec(),
        &[
            CallFrame::new("maker", "missing", true, &[]),
            CallFrame::new("adder", "add_to", true, &five),
        ],
    )?;
    let response = dispatcher.handle_query(request)?;
    assert_eq!(decode(response, &TypeDesc::I32)?, Ok(Value::Null));
    assert_eq!(invocations.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn unknown_intermediate_target_faults_the_chain() -> R<()> {
    let (dispatcher, _) = dispatcher()?;
    let five = [Value::I32(5)];
    let request = encode_chain(
        dispatcher.codec(),
        &[
            CallFrame::new("nope", "make", true, &[]),
            CallFrame::new("adder", "add_to", true, &five),
        ],
    )?;
    let response = dispatcher.handle_query(request)?;
    match decode(response, &TypeDesc::I32)? {
        Err(fault) => assert_eq!(fault.kind, "unknown-target"),
        Ok(_) => panic!("expected a fault response"),
    }
    Ok(())
}
