//! The in-memory form of one BER element and the tag/length/value parser.

use crate::error::{Error, Result};
use crate::primitive::{append_base128, parse_base128};
use crate::schema::AsnType;
use log::trace;

/// The four BER tag classes (bits 7-6 of the identifier octet).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagClass {
    Universal = 0,
    Application = 1,
    ContextSpecific = 2,
    Private = 3,
}

impl TagClass {
    pub fn from_bits(b: u8) -> Self {
        match (b >> 6) & 0x03 {
            0 => TagClass::Universal,
            1 => TagClass::Application,
            2 => TagClass::ContextSpecific,
            _ => TagClass::Private,
        }
    }

    pub fn to_bits(self) -> u8 {
        (self as u8) << 6
    }
}

/// A BER tag: class, constructed bit and tag number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub class: TagClass,
    pub number: u32,
    pub constructed: bool,
}

impl Tag {
    pub fn universal(number: u32, constructed: bool) -> Self {
        Tag {
            class: TagClass::Universal,
            number,
            constructed,
        }
    }

    pub fn context(number: u32, constructed: bool) -> Self {
        Tag {
            class: TagClass::ContextSpecific,
            number,
            constructed,
        }
    }

    /// Parses the identifier octets. Tag numbers >= 31 continue in a
    /// base-128 varint that must itself be in minimal form.
    pub fn parse(data: &[u8]) -> Result<(Tag, usize)> {
        let Some(&b) = data.first() else {
            return Err(Error::Truncated);
        };
        let class = TagClass::from_bits(b);
        let constructed = b & 0x20 != 0;
        let mut number = u32::from(b & 0x1f);
        let mut pos = 1;
        if number == 0x1f {
            let (n, next) = parse_base128(data, 1)?;
            if n < 0x1f {
                return Err(Error::Value("non-minimal tag".into()));
            }
            number = n;
            pos = next;
        }
        Ok((
            Tag {
                class,
                number,
                constructed,
            },
            pos,
        ))
    }

    /// Appends the identifier octets for this tag.
    pub fn append_to(&self, dst: &mut Vec<u8>) {
        let mut b = self.class.to_bits();
        if self.constructed {
            b |= 0x20;
        }
        if self.number >= 31 {
            dst.push(b | 0x1f);
            append_base128(dst, self.number);
        } else {
            dst.push(b | self.number as u8);
        }
    }

    /// A diagnostic name: the universal type name, `[n]`, `ApplicationN`
    /// or `PrivateN`.
    pub fn type_name(&self) -> String {
        match self.class {
            TagClass::Universal => match AsnType::from_tag(self.number) {
                Some(ty) => ty.name().to_string(),
                None => format!("Universal{}", self.number),
            },
            TagClass::Application => format!("Application{}", self.number),
            TagClass::ContextSpecific => format!("[{}]", self.number),
            TagClass::Private => format!("Private{}", self.number),
        }
    }
}

/// One parsed BER element: its tag, raw content octets and, for
/// constructed elements, the parsed children in wire order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tlv {
    pub tag: Tag,
    value: Vec<u8>,
    children: Vec<Tlv>,
    consumed: usize,
}

impl Tlv {
    /// Attempts to parse one complete element from the front of `data`.
    ///
    /// Returns `Ok(None)` when the input holds only a prefix of an element
    /// (more bytes are needed), and `Ok(Some((tlv, rest)))` with the bytes
    /// following the element otherwise. Inside a constructed body the
    /// declared length bounds everything, so there an overrun or residual
    /// byte is an error rather than "need more".
    pub fn parse(data: &[u8]) -> Result<Option<(Tlv, &[u8])>> {
        if data.len() < 2 {
            return Ok(None);
        }
        let (tag, tag_len) = match Tag::parse(data) {
            Ok(v) => v,
            Err(Error::Truncated) => return Ok(None),
            Err(e) => return Err(e),
        };
        let Some((len, len_len)) = parse_length(&data[tag_len..])? else {
            return Ok(None);
        };
        let header = tag_len + len_len;
        if data.len() - header < len {
            return Ok(None);
        }
        let content = &data[header..header + len];
        let tlv = Tlv::assemble(tag, content, header + len)?;
        Ok(Some((tlv, &data[header + len..])))
    }

    fn assemble(tag: Tag, content: &[u8], consumed: usize) -> Result<Tlv> {
        trace!("parse: {} len {}", tag.type_name(), content.len());
        let children = if tag.constructed {
            parse_children(content)?
        } else {
            Vec::new()
        };
        Ok(Tlv {
            tag,
            value: content.to_vec(),
            children,
            consumed,
        })
    }

    /// The raw content octets (for constructed elements, the concatenated
    /// encodings of the children).
    pub fn content(&self) -> &[u8] {
        &self.value
    }

    pub fn children(&self) -> &[Tlv] {
        &self.children
    }

    /// Content length in bytes.
    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Size of the full tag+length+value span this element was parsed
    /// from.
    pub fn consumed(&self) -> usize {
        self.consumed
    }
}

fn parse_length(data: &[u8]) -> Result<Option<(usize, usize)>> {
    let Some(&b) = data.first() else {
        return Ok(None);
    };
    if b & 0x80 == 0 {
        return Ok(Some((usize::from(b), 1)));
    }
    let k = usize::from(b & 0x7f);
    if k == 0 {
        return Err(Error::Value("indefinite length not supported".into()));
    }
    if k > std::mem::size_of::<usize>() {
        return Err(Error::Value(format!("length prefix too large: {k} bytes")));
    }
    if data.len() < 1 + k {
        return Ok(None);
    }
    let mut len = 0usize;
    for &d in &data[1..=k] {
        len = (len << 8) | usize::from(d);
    }
    Ok(Some((len, 1 + k)))
}

/// Parses the children of a constructed body. The body is exactly bounded,
/// so running out of bytes here is a truncation error.
fn parse_children(mut buf: &[u8]) -> Result<Vec<Tlv>> {
    let mut out = Vec::new();
    while !buf.is_empty() {
        let (tag, tag_len) = Tag::parse(buf)?;
        let (len, len_len) = parse_length(&buf[tag_len..])?.ok_or(Error::Truncated)?;
        let header = tag_len + len_len;
        if buf.len() - header < len {
            return Err(Error::Truncated);
        }
        let content = &buf[header..header + len];
        out.push(Tlv::assemble(tag, content, header + len)?);
        buf = &buf[header + len..];
    }
    Ok(out)
}
