//! # Wire Frames
//!
//! Byte layout of requests and responses. Every frame is written into and
//! read from a [`Buf`]; argument and result objects go through the shared
//! [`ObjectCodec`].
//!
//! Layout:
//! - request: `bool is_chain=false, str target, str method,
//!   bool expects_result, i32 argc, argc x object`
//! - chain: `bool is_chain=true, i32 entry_count, entry_count x entry`
//!   where an entry is a request body without the leading discriminator
//! - response: `bool success`, then the result object or a marshalled fault
//!
//! ## Invariants
//! - **Panic Safety**: all decoding paths return `Result`, never panicking on
//!   unknown bytes.
//! - **Two-Phase Decode**: argument objects can only be read once the
//!   receiver has resolved the method's parameter descriptors, so the head
//!   decoders stop right before the argument objects and leave the cursor
//!   there.

use crate::fault::Fault;

use fleetpack::Buf;
use fleetpack::Error;
use fleetpack::ObjectCodec;
use fleetpack::Result;
use fleetpack::TypeDesc;
use fleetpack::Value;

/// Encodes one outbound call.
pub struct CallFrame<'a> {
    pub target: &'a str,
    pub method: &'a str,
    pub expects_result: bool,
    pub args: &'a [Value],
}

impl<'a> CallFrame<'a> {
    pub fn new(target: &'a str, method: &'a str, expects_result: bool, args: &'a [Value]) -> Self {
        Self { target, method, expects_result, args }
    }

    /// Encode this call as a standalone (non-chain) request.
    pub fn encode(&self, buf: &mut Buf, codec: &ObjectCodec) -> Result<()> {
        buf.write_bool(false);
        self.encode_entry(buf, codec)
    }

    /// Encode the entry body, without the leading chain discriminator.
    pub fn encode_entry(&self, buf: &mut Buf, codec: &ObjectCodec) -> Result<()> {
        buf.write_str(self.target);
        buf.write_str(self.method);
        buf.write_bool(self.expects_result);
        buf.write_i32(self.args.len() as i32);
        for arg in self.args {
            codec.write_object(buf, arg)?;
        }
        Ok(())
    }
}

/// Encodes an outbound chain request: the entries execute in order on the
/// remote side within a single round trip.
pub struct ChainFrame<'a> {
    pub entries: &'a [CallFrame<'a>],
}

impl<'a> ChainFrame<'a> {
    pub fn encode(&self, buf: &mut Buf, codec: &ObjectCodec) -> Result<()> {
        buf.write_bool(true);
        buf.write_i32(self.entries.len() as i32);
        for entry in self.entries {
            entry.encode_entry(buf, codec)?;
        }
        Ok(())
    }
}

/// Decoded head of one call entry.
///
/// **Invariant**: after `read_from` the buffer cursor sits on the first
/// argument object; the receiver reads `argc` objects with the resolved
/// parameter descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallHead {
    pub target: String,
    pub method: String,
    pub expects_result: bool,
    pub argc: usize,
}

impl CallHead {
    pub fn read_from(buf: &mut Buf) -> Result<Self> {
        let target = buf.read_str()?;
        let method = buf.read_str()?;
        let expects_result = buf.read_bool()?;
        let argc = buf.read_i32()?;
        if argc < 0 {
            return Err(Error::NegativeLength(argc));
        }
        Ok(Self { target, method, expects_result, argc: argc as usize })
    }
}

/// Top-level request discriminator.
pub enum RequestHead {
    Call(CallHead),
    /// A chain of this many entries follows; each entry head is read with
    /// [`CallHead::read_from`] after the previous entry's arguments.
    Chain { entries: usize },
}

impl RequestHead {
    pub fn read_from(buf: &mut Buf) -> Result<Self> {
        if !buf.read_bool()? {
            return Ok(Self::Call(CallHead::read_from(buf)?));
        }
        let entries = buf.read_i32()?;
        if entries < 0 {
            return Err(Error::NegativeLength(entries));
        }
        Ok(Self::Chain { entries: entries as usize })
    }
}

/// Writes a success response: `true` then the result object under its
/// declared descriptor.
pub fn write_success(
    buf: &mut Buf,
    codec: &ObjectCodec,
    value: &Value,
    desc: &TypeDesc,
) -> Result<()> {
    buf.write_bool(true);
    codec.write_object_as(buf, value, desc)
}

/// Writes a failure response: `false` then the marshalled fault.
pub fn write_failure(buf: &mut Buf, fault: &Fault) -> Result<()> {
    buf.write_bool(false);
    fault.write_to(buf)
}

/// Decodes a response under the declared result descriptor. A failure
/// response yields the marshalled fault in the inner `Err`; the outer
/// `Result` only fails on undecodable bytes.
pub fn read_response(
    buf: &mut Buf,
    codec: &ObjectCodec,
    result_desc: &TypeDesc,
) -> Result<std::result::Result<Value, Fault>> {
    if buf.read_bool()? {
        Ok(Ok(codec.read_object(buf, result_desc)?))
    } else {
        Ok(Err(Fault::read_from(buf)?))
    }
}
