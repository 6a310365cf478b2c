//! # Dispatcher
//!
//! Turns request bytes into invocations and response bytes. Each request
//! walks Received -> Resolved -> Invoked -> Responded; a query always gets a
//! response, even when resolution or the handler fails. Handler faults and
//! resolution failures become failure responses; the only hard error is a
//! request the dispatcher cannot decode at all.

use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use fleetpack::Buf;
use fleetpack::ObjectCodec;
use fleetpack::TypeDesc;
use fleetpack::Value;
use fleetrpc::fault::FaultFrame;
use fleetrpc::frame;
use fleetrpc::frame::CallHead;
use fleetrpc::frame::RequestHead;
use fleetrpc::Fault;

use crate::registry::HandlerRegistry;

/// The request bytes could not be decoded; no response can be formed.
#[derive(Debug)]
pub enum DispatchError {
    Corrupt(fleetpack::Error),
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Corrupt(e) => write!(f, "undecodable request: {}", e),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Corrupt(e) => Some(e),
        }
    }
}

impl From<fleetpack::Error> for DispatchError {
    fn from(e: fleetpack::Error) -> Self {
        Self::Corrupt(e)
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;

/// The value and declared descriptor an invocation produced, or the fault to
/// send back instead.
type Outcome = std::result::Result<(Value, TypeDesc), Fault>;

/// Server-side request processor. Cheap to share (`Arc`); all state lives in
/// the registry and codec it references.
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    codec: Arc<ObjectCodec>,
}

impl Dispatcher {
    pub fn new(registry: Arc<HandlerRegistry>, codec: Arc<ObjectCodec>) -> Self {
        Self { registry, codec }
    }

    pub fn codec(&self) -> &Arc<ObjectCodec> {
        &self.codec
    }

    /// Processes a query and always produces response bytes, marshalling
    /// resolution failures and handler faults as failure responses.
    pub fn handle_query(&self, bytes: Vec<u8>) -> Result<Vec<u8>> {
        let outcome = self.process(bytes)?;
        let mut out = Buf::new();
        match outcome {
            Ok((value, desc)) => {
                if let Err(e) = frame::write_success(&mut out, &self.codec, &value, &desc) {
                    // the handler produced a value that does not match its
                    // declared result descriptor
                    warn!(error = %e, "result did not match its declared descriptor");
                    out = Buf::new();
                    frame::write_failure(&mut out, &Fault::new("bad-result", e.to_string()))?;
                }
            }
            Err(fault) => {
                debug!(fault = %fault, "responding with fault");
                frame::write_failure(&mut out, &fault)?;
            }
        }
        debug!("responded");
        Ok(out.into_bytes())
    }

    /// Same pipeline as a query; the outcome is discarded, faults are only
    /// logged.
    pub fn handle_one_way(&self, bytes: Vec<u8>) -> Result<()> {
        if let Err(fault) = self.process(bytes)? {
            warn!(fault = %fault, "one-way invocation failed");
        }
        Ok(())
    }

    fn process(&self, bytes: Vec<u8>) -> Result<Outcome> {
        let mut buf = Buf::from_bytes(bytes);
        let head = RequestHead::read_from(&mut buf)?;
        debug!("received");
        match head {
            RequestHead::Call(head) => self.invoke_entry(&mut buf, &head, None),
            RequestHead::Chain { entries } => self.run_chain(&mut buf, entries),
        }
    }

    /// Resolves and invokes one call entry. Resolution failures come back as
    /// faults without touching the argument bytes; only argument objects that
    /// fail to decode against the resolved signature are a hard error.
    fn invoke_entry(&self, buf: &mut Buf, head: &CallHead, context: Option<&Value>) -> Result<Outcome> {
        let Some(handler) = self.registry.lookup(&head.target) else {
            return Ok(Err(Fault::new(
                "unknown-target",
                format!("no handler registered as {}", head.target),
            )));
        };
        let Ok(spec) = handler.method(&head.method) else {
            return Ok(Err(Fault::new(
                "unknown-method",
                format!("{} has no method {}", head.target, head.method),
            )));
        };
        if head.argc != spec.param_descs.len() {
            return Ok(Err(Fault::new(
                "bad-argument-count",
                format!(
                    "{}.{} takes {} arguments, got {}",
                    head.target,
                    head.method,
                    spec.param_descs.len(),
                    head.argc
                ),
            )));
        }
        debug!(target = %head.target, method = %head.method, "resolved");

        let mut args = Vec::with_capacity(head.argc);
        for desc in &spec.param_descs {
            args.push(self.codec.read_object(buf, desc)?);
        }

        match (spec.invoker)(context, &args) {
            Ok(value) => {
                debug!(target = %head.target, method = %head.method, "invoked");
                Ok(Ok((value, spec.result_desc.clone())))
            }
            Err(mut fault) => {
                // mark where handler code ends so the marshaller can trim
                // everything outward of it
                fault.push_frame(FaultFrame::dispatch_boundary(&spec.name));
                Ok(Err(fault))
            }
        }
    }

    /// Walks a chain: entry *n*'s result is the receiver context for entry
    /// *n+1*. A `Null` intermediate result short-circuits the remaining
    /// entries and the chain resolves to `Null`.
    fn run_chain(&self, buf: &mut Buf, entries: usize) -> Result<Outcome> {
        if entries == 0 {
            return Ok(Err(Fault::bare("empty-chain")));
        }
        let mut context: Option<Value> = None;
        let mut resolved = (Value::Null, TypeDesc::Bool);
        for i in 0..entries {
            let head = CallHead::read_from(buf)?;
            match self.invoke_entry(buf, &head, context.as_ref())? {
                Ok((value, desc)) => {
                    if i + 1 < entries && value.is_null() {
                        debug!(entry = i, "null intermediate result short-circuits the chain");
                        // the caller decodes with the terminal entry's
                        // descriptor, which is unknown here; this relies on
                        // Null encoding as a lone absent flag under every
                        // descriptor
                        return Ok(Ok((Value::Null, desc)));
                    }
                    resolved = (value.clone(), desc);
                    context = Some(value);
                }
                Err(fault) => return Ok(Err(fault)),
            }
        }
        Ok(Ok(resolved))
    }
}
