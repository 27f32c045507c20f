//! Runtime values produced by decoding and consumed by the encoder.

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fmt;

/// An OBJECT IDENTIFIER as its component arcs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Oid(pub Vec<u32>);

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

impl FromIterator<u32> for Oid {
    fn from_iter<T: IntoIterator<Item = u32>>(iter: T) -> Self {
        Oid(iter.into_iter().collect())
    }
}

/// A BIT STRING: bits packed into bytes, with the number of valid bits
/// recorded. Padding bits are zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitStr {
    pub bytes: Vec<u8>,
    pub bit_length: usize,
}

impl BitStr {
    pub fn new(bytes: Vec<u8>, bit_length: usize) -> Self {
        BitStr { bytes, bit_length }
    }

    /// The bit at `i`, or 0 when the index is out of range.
    pub fn at(&self, i: usize) -> u8 {
        if i >= self.bit_length {
            return 0;
        }
        (self.bytes[i / 8] >> (7 - (i % 8) as u32)) & 1
    }

    /// A copy with the padding bits moved to the front.
    pub fn right_align(&self) -> Vec<u8> {
        let shift = (8 - self.bit_length % 8) % 8;
        if shift == 0 || self.bytes.is_empty() {
            return self.bytes.clone();
        }
        let mut out = Vec::with_capacity(self.bytes.len());
        out.push(self.bytes[0] >> shift);
        for i in 1..self.bytes.len() {
            out.push((self.bytes[i - 1] << (8 - shift)) | (self.bytes[i] >> shift));
        }
        out
    }
}

/// A single decoded value (leaf or compound).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    /// Character strings, ENUMERATED names and ObjectDescriptor contents.
    Str(String),
    Bytes(Vec<u8>),
    Oid(Oid),
    BitStr(BitStr),
    Time(NaiveDateTime),
    /// SEQUENCE output; single-key for CHOICE.
    Map(HashMap<String, Value>),
    /// SEQUENCE OF output, in wire order.
    Seq(Vec<Value>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }

    /// Looks up `name` in a [`Value::Map`].
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(name))
    }
}
