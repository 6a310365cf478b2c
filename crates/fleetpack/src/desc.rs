//! Structural type descriptors.
//!
//! A `TypeDesc` describes the shape of a value: a raw kind plus, for
//! parameterized kinds, the descriptors of its type arguments. Descriptors
//! are supplied by the call site from the declared method signature and are
//! never transmitted on the wire: the protocol is schema-agreed, not
//! self-describing. Writer and reader must resolve an identical descriptor
//! for the same logical value or decoding corrupts the stream.

/// The closed set of value shapes the codec can move across the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDesc {
    Bool,
    I32,
    I64,
    F32,
    F64,
    Str,
    UniqueId,
    Blob,
    /// An enum registered under this name; encoded as its ordinal.
    Enum(&'static str),
    /// Fixed-shape sequence of one element type.
    Array(Box<TypeDesc>),
    /// Growable ordered collection of one element type.
    List(Box<TypeDesc>),
    /// Keyed collection; carries both parameter descriptors by construction.
    Map(Box<TypeDesc>, Box<TypeDesc>),
    /// A possibly-absent value; shares the inner value's presence flag.
    Optional(Box<TypeDesc>),
    /// A user-defined composite registered under this name.
    Composite(&'static str),
}

impl TypeDesc {
    pub fn array(element: TypeDesc) -> Self {
        Self::Array(Box::new(element))
    }

    pub fn list(element: TypeDesc) -> Self {
        Self::List(Box::new(element))
    }

    pub fn map(key: TypeDesc, value: TypeDesc) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }

    pub fn optional(inner: TypeDesc) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// Short name of the raw kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Str => "str",
            Self::UniqueId => "unique-id",
            Self::Blob => "blob",
            Self::Enum(_) => "enum",
            Self::Array(_) => "array",
            Self::List(_) => "list",
            Self::Map(_, _) => "map",
            Self::Optional(_) => "optional",
            Self::Composite(_) => "composite",
        }
    }
}

impl std::fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enum(name) => write!(f, "enum<{}>", name),
            Self::Array(el) => write!(f, "array<{}>", el),
            Self::List(el) => write!(f, "list<{}>", el),
            Self::Map(k, v) => write!(f, "map<{}, {}>", k, v),
            Self::Optional(inner) => write!(f, "optional<{}>", inner),
            Self::Composite(name) => write!(f, "composite<{}>", name),
            other => f.write_str(other.kind()),
        }
    }
}
