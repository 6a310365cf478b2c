//! Descriptor-driven object codec.
//!
//! Maps a [`TypeDesc`] to the read/write routine for that shape, recursing
//! into nested element types. Dispatch is a match over the closed descriptor
//! union; only enums and user-defined composites go through a name-keyed
//! registry, populated once at startup and immutable afterwards (share the
//! codec via `Arc`).
//!
//! ## Invariants
//!
//! - Every object write is nullable-wrapped: exactly one leading presence
//!   boolean, then the payload. This is the only self-describing element of
//!   the format, and the optional codec depends on it (see `read_object`).
//! - Codecs are reentrant; a read/write may recursively invoke the codec for
//!   nested types.

use std::collections::HashMap;

use crate::buf::Buf;
use crate::desc::TypeDesc;
use crate::types::Error;
use crate::types::Result;
use crate::value::Value;

pub type CompositeRead = fn(&mut Buf, &ObjectCodec) -> Result<Value>;
pub type CompositeWrite = fn(&mut Buf, &Value, &ObjectCodec) -> Result<()>;

/// How a registered composite type moves across the wire.
pub enum CompositeCodec {
    /// Generic field-by-field codec: the ordered descriptors of the type's
    /// fields. The value must carry exactly this many fields.
    Fields(Vec<TypeDesc>),
    /// Escape hatch for types that want full control of their layout.
    Custom { read: CompositeRead, write: CompositeWrite },
}

/// Registry plus dispatch for reading and writing [`Value`]s.
#[derive(Default)]
pub struct ObjectCodec {
    enums: HashMap<&'static str, &'static [&'static str]>,
    composites: HashMap<&'static str, CompositeCodec>,
}

impl ObjectCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds an enum name to its ordered variant list. Ordinals index into
    /// this list on both sides; reordering variants between peers corrupts
    /// data, which the bounds check turns into a loud decode error.
    pub fn register_enum(&mut self, name: &'static str, variants: &'static [&'static str]) {
        self.enums.insert(name, variants);
    }

    pub fn register_composite(&mut self, name: &'static str, codec: CompositeCodec) {
        self.composites.insert(name, codec);
    }

    /// Resolves an ordinal to its registered variant name.
    pub fn variant_name(&self, name: &'static str, ordinal: i32) -> Result<&'static str> {
        let variants = self.enums.get(name).ok_or(Error::UnknownEnum(name))?;
        usize::try_from(ordinal)
            .ok()
            .and_then(|idx| variants.get(idx))
            .copied()
            .ok_or(Error::UnknownEnumOrdinal { name, ordinal, variants: variants.len() })
    }

    /// Writes a value, inferring the descriptor from its concrete shape.
    ///
    /// `Null` and absent optionals encode as a single `false` presence flag;
    /// present optionals are transparent and delegate to the wrapped value.
    pub fn write_object(&self, buf: &mut Buf, value: &Value) -> Result<()> {
        match value {
            Value::Null | Value::Optional(None) => {
                buf.write_bool(false);
                Ok(())
            }
            Value::Optional(Some(inner)) => self.write_object(buf, inner),
            present => {
                buf.write_bool(true);
                self.write_payload(buf, present)
            }
        }
    }

    /// Writes a value against an explicit descriptor, validating that the
    /// value conforms. Required whenever the value may be `Null` (the shape
    /// cannot be inferred from nothing) and used for all declared-signature
    /// writes.
    pub fn write_object_as(&self, buf: &mut Buf, value: &Value, desc: &TypeDesc) -> Result<()> {
        if let TypeDesc::Optional(inner) = desc {
            // transparent: the wrapped value's presence flag is the flag
            return match value {
                Value::Optional(None) | Value::Null => {
                    buf.write_bool(false);
                    Ok(())
                }
                Value::Optional(Some(v)) => self.write_object_as(buf, v, inner),
                other => self.write_object_as(buf, other, inner),
            };
        }
        if value.is_null() {
            buf.write_bool(false);
            return Ok(());
        }
        match (desc, value) {
            (TypeDesc::Array(element), Value::Array(items))
            | (TypeDesc::List(element), Value::List(items)) => {
                buf.write_bool(true);
                buf.write_i32(items.len() as i32);
                for item in items {
                    self.write_object_as(buf, item, element)?;
                }
                Ok(())
            }
            (TypeDesc::Map(key, val), Value::Map(entries)) => {
                buf.write_bool(true);
                buf.write_i32(entries.len() as i32);
                for (k, v) in entries {
                    self.write_object_as(buf, k, key)?;
                    self.write_object_as(buf, v, val)?;
                }
                Ok(())
            }
            _ => {
                if !self.conforms(value, desc) {
                    return Err(Error::ShapeMismatch {
                        expected: desc.to_string(),
                        found: value.kind(),
                    });
                }
                buf.write_bool(true);
                self.write_payload(buf, value)
            }
        }
    }

    /// Reads a value of the given shape.
    ///
    /// Optionals peek the shared presence flag under a cursor mark: if the
    /// value is absent the flag is consumed and the optional is empty; if
    /// present, the cursor is rewound to *before* the flag and the full
    /// nullable object is re-read, so the inner read sees the same single
    /// flag the optional peeked at.
    pub fn read_object(&self, buf: &mut Buf, desc: &TypeDesc) -> Result<Value> {
        if let TypeDesc::Optional(inner) = desc {
            let mark = buf.mark();
            if !buf.read_bool()? {
                return Ok(Value::none());
            }
            buf.rewind(mark);
            let value = self.read_object(buf, inner)?;
            return Ok(Value::some(value));
        }
        if !buf.read_bool()? {
            return Ok(Value::Null);
        }
        match desc {
            TypeDesc::Bool => Ok(Value::Bool(buf.read_bool()?)),
            TypeDesc::I32 => Ok(Value::I32(buf.read_i32()?)),
            TypeDesc::I64 => Ok(Value::I64(buf.read_i64()?)),
            TypeDesc::F32 => Ok(Value::F32(buf.read_f32()?)),
            TypeDesc::F64 => Ok(Value::F64(buf.read_f64()?)),
            TypeDesc::Str => Ok(Value::Str(buf.read_str()?)),
            TypeDesc::UniqueId => Ok(Value::UniqueId(buf.read_unique_id()?)),
            TypeDesc::Blob => Ok(Value::Blob(buf.read_blob()?)),
            TypeDesc::Enum(name) => {
                let ordinal = buf.read_i32()?;
                // resolves to validate the ordinal against the variant list
                self.variant_name(name, ordinal)?;
                Ok(Value::Enum { name, ordinal })
            }
            TypeDesc::Array(element) => Ok(Value::Array(self.read_sequence(buf, element)?)),
            TypeDesc::List(element) => Ok(Value::List(self.read_sequence(buf, element)?)),
            TypeDesc::Map(key, value) => {
                let count = read_count(buf)?;
                let mut entries = Vec::with_capacity(count.min(buf.remaining()));
                for _ in 0..count {
                    let k = self.read_object(buf, key)?;
                    let v = self.read_object(buf, value)?;
                    entries.push((k, v));
                }
                Ok(Value::Map(entries))
            }
            TypeDesc::Composite(name) => match self.composite(name)? {
                CompositeCodec::Fields(descs) => {
                    let mut fields = Vec::with_capacity(descs.len());
                    for field_desc in descs {
                        fields.push(self.read_object(buf, field_desc)?);
                    }
                    Ok(Value::Composite { name, fields })
                }
                CompositeCodec::Custom { read, .. } => read(buf, self),
            },
            TypeDesc::Optional(_) => unreachable!("optionals are handled above"),
        }
    }

    fn write_payload(&self, buf: &mut Buf, value: &Value) -> Result<()> {
        match value {
            Value::Bool(v) => buf.write_bool(*v),
            Value::I32(v) => buf.write_i32(*v),
            Value::I64(v) => buf.write_i64(*v),
            Value::F32(v) => buf.write_f32(*v),
            Value::F64(v) => buf.write_f64(*v),
            Value::Str(v) => buf.write_str(v),
            Value::UniqueId(v) => buf.write_unique_id(*v),
            Value::Blob(v) => buf.write_blob(v),
            Value::Enum { name, ordinal } => {
                self.variant_name(name, *ordinal)?;
                buf.write_i32(*ordinal);
            }
            Value::Array(items) | Value::List(items) => {
                buf.write_i32(items.len() as i32);
                for item in items {
                    self.write_object(buf, item)?;
                }
            }
            Value::Map(entries) => {
                buf.write_i32(entries.len() as i32);
                for (k, v) in entries {
                    self.write_object(buf, k)?;
                    self.write_object(buf, v)?;
                }
            }
            Value::Composite { name, fields } => match self.composite(name)? {
                CompositeCodec::Fields(descs) => {
                    if descs.len() != fields.len() {
                        return Err(Error::FieldCountMismatch {
                            name,
                            expected: descs.len(),
                            found: fields.len(),
                        });
                    }
                    for (field, desc) in fields.iter().zip(descs) {
                        self.write_object_as(buf, field, desc)?;
                    }
                }
                CompositeCodec::Custom { write, .. } => write(buf, value, self)?,
            },
            Value::Null | Value::Optional(_) => {
                unreachable!("nullable shapes are handled before payload writes")
            }
        }
        Ok(())
    }

    fn read_sequence(&self, buf: &mut Buf, element: &TypeDesc) -> Result<Vec<Value>> {
        let count = read_count(buf)?;
        // count is wire data; every element costs at least its presence
        // flag, so the bytes left bound any honest count and must also
        // bound the allocation
        let mut items = Vec::with_capacity(count.min(buf.remaining()));
        for _ in 0..count {
            items.push(self.read_object(buf, element)?);
        }
        Ok(items)
    }

    fn composite(&self, name: &'static str) -> Result<&CompositeCodec> {
        self.composites
            .get(name)
            .ok_or_else(|| Error::UnknownComposite(name.to_string()))
    }

    /// Shape check for descriptor-directed scalar writes; containers recurse
    /// through their element descriptors before reaching this.
    fn conforms(&self, value: &Value, desc: &TypeDesc) -> bool {
        match (desc, value) {
            (TypeDesc::Bool, Value::Bool(_)) => true,
            (TypeDesc::I32, Value::I32(_)) => true,
            (TypeDesc::I64, Value::I64(_)) => true,
            (TypeDesc::F32, Value::F32(_)) => true,
            (TypeDesc::F64, Value::F64(_)) => true,
            (TypeDesc::Str, Value::Str(_)) => true,
            (TypeDesc::UniqueId, Value::UniqueId(_)) => true,
            (TypeDesc::Blob, Value::Blob(_)) => true,
            (TypeDesc::Enum(de), Value::Enum { name, .. }) => de == name,
            (TypeDesc::Composite(dc), Value::Composite { name, .. }) => dc == name,
            _ => false,
        }
    }
}

fn read_count(buf: &mut Buf) -> Result<usize> {
    let count = buf.read_i32()?;
    if count < 0 {
        return Err(Error::NegativeLength(count));
    }
    Ok(count as usize)
}
