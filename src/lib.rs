//! # asn1dyn — schema-driven ASN.1 BER codec
//!
//! Encodes and decodes ASN.1 BER messages whose structure is supplied at
//! runtime as a JSON schema, rather than fixed at compile time. Decoding
//! produces a tree of labeled [`Value`]s; encoding is driven by a fluent
//! builder keyed by schema field names (or directly from a [`Value`] tree).
//!
//! ## Schema structure
//!
//! A schema document is a JSON dictionary of named types. Nodes use
//! `$`-prefixed reserved keys: `$type`, `$id`, `$tag`,
//! `$implicit`/`$explicit`, `$optional`, `$default`, `$min`/`$max`,
//! `$format`, `$field` and `$of`.
//!
//! ## Types
//!
//! - Universal: `BOOLEAN`, `INTEGER`, `REAL`, `ENUMERATED`, `BIT_STRING`,
//!   `OCTET_STRING`, `NULL`, `ObjectIdentifier`, `ObjectDescriptor`,
//!   `UTF8String`, `NumericString`, `PrintableString`, `IA5String`,
//!   `UTCTime`, `GeneralizedTime`, `SEQUENCE` (with `$field` or `$of`)
//! - Virtual: `CHOICE` (alternatives disambiguated by tag), `ANY`
//!   (resolved at decode time through a preceding `ObjectDescriptor`)
//!
//! ## Example
//!
//! ```
//! use asn1dyn::{Codec, CodecConfig, Value};
//!
//! let codec = Codec::from_json(
//!     r#"{"X": {"$type": "INTEGER"}}"#,
//!     CodecConfig::default(),
//! ).unwrap();
//!
//! let bytes = codec.encode("X", &Value::Int(127)).unwrap();
//! assert_eq!(bytes, [0x02, 0x01, 0x7f]);
//! assert_eq!(codec.decode("X", &bytes).unwrap(), Value::Int(127));
//! ```

pub mod config;
pub mod decode;
pub mod encode;
pub mod error;
pub mod primitive;
pub mod reader;
pub mod schema;
pub mod tlv;
pub mod value;

pub use config::{set_default_mode, CodecConfig, TagMode};
pub use decode::Codec;
pub use encode::Element;
pub use error::{Error, Result};
pub use reader::TlvReader;
pub use schema::{AsnType, Schema, SchemaNode};
pub use tlv::{Tag, TagClass, Tlv};
pub use value::{BitStr, Oid, Value};
