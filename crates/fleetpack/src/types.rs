//! Core types for the fleetpack binary format.

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A read ran past the written length of the buffer. Always fatal: it
    /// indicates a schema mismatch between writer and reader.
    CorruptBuffer { wanted: usize, available: usize },
    /// A length-prefixed string was not valid UTF-8.
    InvalidUtf8,
    /// A length prefix on the wire was negative.
    NegativeLength(i32),
    /// No enum binding registered under this name.
    UnknownEnum(&'static str),
    /// A decoded enum ordinal fell outside the registered variant list.
    /// Ordinal drift between peers is fatal by design, never recovered.
    UnknownEnumOrdinal { name: &'static str, ordinal: i32, variants: usize },
    /// No composite binding registered under this name.
    UnknownComposite(String),
    /// The value does not match the descriptor it was written or read as.
    ShapeMismatch { expected: String, found: &'static str },
    /// A composite value carried a different field count than its binding.
    FieldCountMismatch { name: &'static str, expected: usize, found: usize },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CorruptBuffer { wanted, available } => {
                write!(f, "Corrupt buffer: wanted {} bytes, {} available", wanted, available)
            }
            Self::InvalidUtf8 => write!(f, "String payload is not valid UTF-8"),
            Self::NegativeLength(len) => write!(f, "Negative length prefix: {}", len),
            Self::UnknownEnum(name) => write!(f, "No enum binding registered for '{}'", name),
            Self::UnknownEnumOrdinal { name, ordinal, variants } => {
                write!(f, "Ordinal {} out of range for enum '{}' ({} variants)", ordinal, name, variants)
            }
            Self::UnknownComposite(name) => {
                write!(f, "No composite binding registered for '{}'", name)
            }
            Self::ShapeMismatch { expected, found } => {
                write!(f, "Value shape mismatch: descriptor {}, value {}", expected, found)
            }
            Self::FieldCountMismatch { name, expected, found } => {
                write!(f, "Composite '{}' has {} fields, value carries {}", name, expected, found)
            }
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
