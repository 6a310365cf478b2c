//! # Fault Marshalling
//!
//! A `Fault` is a remote failure made portable: the failure kind, an optional
//! message, and a trace of frames describing where it happened. Faults travel
//! in failure responses and surface on the calling side as
//! [`crate::RpcError::Execution`].
//!
//! ## Invariants
//! - A fault crosses the wire at most once; the caller consumes it exactly
//!   once when the response is decoded.
//! - Serialized traces stop at the dispatch boundary: frames the dispatcher
//!   appends to mark its own machinery are never sent to the caller.

use std::fmt;

use fleetpack::Buf;
use fleetpack::Error;
use fleetpack::Result;

/// Marker `type_name` for the frame the dispatcher appends when it catches a
/// handler failure. Everything from this frame outward is dispatch machinery,
/// not handler code, and gets trimmed from the serialized trace.
const DISPATCH_BOUNDARY: &str = "fleet.dispatch";

/// One frame of a fault's trace, innermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultFrame {
    pub loader: Option<String>,
    pub module: Option<String>,
    pub type_name: String,
    pub method_name: String,
    pub file: Option<String>,
    pub line: i32,
}

impl FaultFrame {
    pub fn new(type_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            loader: None,
            module: None,
            type_name: type_name.into(),
            method_name: method_name.into(),
            file: None,
            line: -1,
        }
    }

    /// The frame the dispatcher appends before marshalling a handler fault.
    pub fn dispatch_boundary(method_name: impl Into<String>) -> Self {
        Self::new(DISPATCH_BOUNDARY, method_name)
    }

    pub fn is_dispatch_boundary(&self) -> bool {
        self.type_name == DISPATCH_BOUNDARY
    }

    fn write_to(&self, buf: &mut Buf) -> Result<()> {
        buf.write_nullable(self.loader.as_ref(), |b, v| {
            b.write_str(v);
            Ok(())
        })?;
        buf.write_nullable(self.module.as_ref(), |b, v| {
            b.write_str(v);
            Ok(())
        })?;
        buf.write_str(&self.type_name);
        buf.write_str(&self.method_name);
        buf.write_nullable(self.file.as_ref(), |b, v| {
            b.write_str(v);
            Ok(())
        })?;
        buf.write_i32(self.line);
        Ok(())
    }

    fn read_from(buf: &mut Buf) -> Result<Self> {
        Ok(Self {
            loader: buf.read_nullable(|b| b.read_str())?,
            module: buf.read_nullable(|b| b.read_str())?,
            type_name: buf.read_str()?,
            method_name: buf.read_str()?,
            file: buf.read_nullable(|b| b.read_str())?,
            line: buf.read_i32()?,
        })
    }
}

/// A marshalled remote failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// Short machine-matchable failure kind, e.g. `"divide-by-zero"`.
    pub kind: String,
    pub message: Option<String>,
    /// Trace frames, innermost first. Empty when the origin had no trace.
    pub frames: Vec<FaultFrame>,
}

impl Fault {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self { kind: kind.into(), message: Some(message.into()), frames: Vec::new() }
    }

    pub fn bare(kind: impl Into<String>) -> Self {
        Self { kind: kind.into(), message: None, frames: Vec::new() }
    }

    pub fn with_frames(mut self, frames: Vec<FaultFrame>) -> Self {
        self.frames = frames;
        self
    }

    pub fn push_frame(&mut self, frame: FaultFrame) {
        self.frames.push(frame);
    }

    /// Serializes the fault: kind, nullable message, then the trace up to
    /// (excluding) the first dispatch-boundary frame. The whole trace is sent
    /// when no boundary frame is present.
    pub fn write_to(&self, buf: &mut Buf) -> Result<()> {
        buf.write_str(&self.kind);
        buf.write_nullable(self.message.as_ref(), |b, v| {
            b.write_str(v);
            Ok(())
        })?;
        let cut = self
            .frames
            .iter()
            .position(FaultFrame::is_dispatch_boundary)
            .unwrap_or(self.frames.len());
        let frames = &self.frames[..cut];
        buf.write_i32(frames.len() as i32);
        for frame in frames {
            frame.write_to(buf)?;
        }
        Ok(())
    }

    pub fn read_from(buf: &mut Buf) -> Result<Self> {
        let kind = buf.read_str()?;
        let message = buf.read_nullable(|b| b.read_str())?;
        let count = buf.read_i32()?;
        if count < 0 {
            return Err(Error::NegativeLength(count));
        }
        // a frame is several bytes, so remaining() bounds any honest count;
        // never let a corrupt count size the allocation
        let mut frames = Vec::with_capacity((count as usize).min(buf.remaining()));
        for _ in 0..count {
            frames.push(FaultFrame::read_from(buf)?);
        }
        Ok(Self { kind, message, frames })
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{}: {}", self.kind, msg),
            None => f.write_str(&self.kind),
        }
    }
}

impl std::error::Error for Fault {}
