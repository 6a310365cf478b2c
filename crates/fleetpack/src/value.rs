//! Dynamic values.
//!
//! `Value` is the runtime counterpart of [`crate::TypeDesc`]: a closed enum
//! the codec matches over instead of inspecting arbitrary runtime types.
//! Arguments and results of remote calls travel as values.

use crate::desc::TypeDesc;

/// A dynamic value that can cross the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The absent value; writable against any descriptor, encoded as a
    /// single `false` presence flag.
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    UniqueId(u128),
    Blob(Vec<u8>),
    /// An enum constant, addressed by its registered name and ordinal.
    Enum { name: &'static str, ordinal: i32 },
    Array(Vec<Value>),
    List(Vec<Value>),
    /// Entries in encounter order; order is preserved across the wire.
    Map(Vec<(Value, Value)>),
    Optional(Option<Box<Value>>),
    Composite { name: &'static str, fields: Vec<Value> },
}

impl Value {
    pub fn str(v: impl Into<String>) -> Self {
        Self::Str(v.into())
    }

    pub fn some(v: Value) -> Self {
        Self::Optional(Some(Box::new(v)))
    }

    pub const fn none() -> Self {
        Self::Optional(None)
    }

    /// Short name of the value's raw kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Str(_) => "str",
            Self::UniqueId(_) => "unique-id",
            Self::Blob(_) => "blob",
            Self::Enum { .. } => "enum",
            Self::Array(_) => "array",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Optional(_) => "optional",
            Self::Composite { .. } => "composite",
        }
    }

    /// Infers a descriptor from the value's shape where one is determined.
    /// `Null` has no shape, empty containers cannot name their element type,
    /// and an absent optional hides the type it would have carried.
    pub fn describe(&self) -> Option<TypeDesc> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(TypeDesc::Bool),
            Self::I32(_) => Some(TypeDesc::I32),
            Self::I64(_) => Some(TypeDesc::I64),
            Self::F32(_) => Some(TypeDesc::F32),
            Self::F64(_) => Some(TypeDesc::F64),
            Self::Str(_) => Some(TypeDesc::Str),
            Self::UniqueId(_) => Some(TypeDesc::UniqueId),
            Self::Blob(_) => Some(TypeDesc::Blob),
            Self::Enum { name, .. } => Some(TypeDesc::Enum(name)),
            Self::Array(items) => items.first()?.describe().map(TypeDesc::array),
            Self::List(items) => items.first()?.describe().map(TypeDesc::list),
            Self::Map(entries) => {
                let (key, value) = entries.first()?;
                Some(TypeDesc::map(key.describe()?, value.describe()?))
            }
            Self::Optional(inner) => inner.as_deref()?.describe().map(TypeDesc::optional),
            Self::Composite { name, .. } => Some(TypeDesc::Composite(name)),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }
}
