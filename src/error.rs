//! Error types shared by the schema loader, parser, decoder and encoder.

/// All failures surfaced by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed schema document, or a schema lookup (field, type,
    /// ObjectDescriptor target) that does not resolve.
    #[error("schema: {0}")]
    Schema(String),

    /// The wire tag does not match the schema type, even after tag casting.
    #[error("processing '{name}': expected {expected} but got {found}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: String,
    },

    /// Out-of-range or malformed content octets.
    #[error("invalid value: {0}")]
    Value(String),

    /// The input ended in the middle of an element.
    #[error("truncated element")]
    Truncated,

    /// A time value that does not serialize back to its input bytes.
    #[error("time did not round-trip: given {given:?}, serialized {serialized:?}")]
    RoundTrip { given: String, serialized: String },

    /// An encode call left a required SEQUENCE slot empty.
    #[error("missing mandatory field '{0}'")]
    MissingField(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
