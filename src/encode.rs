//! Schema-guided encoding: a fluent element builder keyed by schema field
//! names, a preprocess pass that materializes IMPLICIT/EXPLICIT tags and
//! computes lengths, and the serializer.

use crate::config::{CodecConfig, TagMode};
use crate::decode::{Codec, GENERALIZED_FORMAT, UTC_FORMAT};
use crate::error::{Error, Result};
use crate::primitive;
use crate::schema::{AsnType, Schema, SchemaNode};
use crate::tlv::{Tag, TagClass};
use crate::value::{BitStr, Oid, Value};
use chrono::NaiveDateTime;

/// One element of the tree being built. SEQUENCE children sit in slots
/// ordered like the id-sorted field list; SEQUENCE OF children are
/// appended. CHOICE and ANY elements hold their single resolved child and
/// dissolve during preprocess unless a wrapper must be kept.
#[derive(Debug)]
pub struct Element<'s> {
    doc: &'s Schema,
    schema: &'s SchemaNode,
    tag: Tag,
    data: Vec<u8>,
    children: Vec<Option<Element<'s>>>,
    len: usize,
    /// A `[N]` wrapper materialized by preprocess; exempt from tagging.
    wrapper: bool,
    /// Mounted as a CHOICE alternative (forces EXPLICIT for nested CHOICE).
    in_choice: bool,
}

impl<'s> Element<'s> {
    /// An empty constructed mount point for a SEQUENCE, CHOICE or ANY
    /// schema node.
    pub(crate) fn container(doc: &'s Schema, schema: &'s SchemaNode) -> Result<Self> {
        let (tag, children) = match schema.ty {
            AsnType::Sequence if !schema.fields.is_empty() => (
                Tag::universal(0x10, true),
                (0..schema.fields.len()).map(|_| None).collect(),
            ),
            AsnType::Sequence if schema.of.is_some() => (Tag::universal(0x10, true), Vec::new()),
            AsnType::Choice | AsnType::Any => (Tag::context(0, true), vec![None]),
            _ => {
                return Err(Error::Schema(format!(
                    "'{}' ({}) is not a constructed type",
                    schema.name,
                    schema.ty.name()
                )))
            }
        };
        Ok(Element {
            doc,
            schema,
            tag,
            data: Vec::new(),
            children,
            len: 0,
            wrapper: false,
            in_choice: false,
        })
    }

    fn leaf(doc: &'s Schema, schema: &'s SchemaNode, data: Vec<u8>) -> Result<Self> {
        let number = schema.ty.universal_tag().ok_or_else(|| {
            Error::Schema(format!("'{}' has no universal tag", schema.name))
        })?;
        Ok(Element {
            doc,
            schema,
            tag: Tag::universal(number, false),
            data,
            children: Vec::new(),
            len: 0,
            wrapper: false,
            in_choice: false,
        })
    }

    /// Builds a whole element tree from a [`Value`] shaped like the
    /// decoder's output: maps for SEQUENCE, lists for SEQUENCE OF,
    /// single-key maps for CHOICE and ANY, enum names as strings.
    pub fn from_value(doc: &'s Schema, schema: &'s SchemaNode, value: &Value) -> Result<Self> {
        match schema.ty {
            AsnType::Sequence if !schema.fields.is_empty() => {
                let map = value.as_map().ok_or_else(|| kind_err(schema, "a map"))?;
                for key in map.keys() {
                    if schema.field(key).is_none() {
                        return Err(Error::Schema(format!(
                            "'{}' does not contain the field '{key}'",
                            schema.name
                        )));
                    }
                }
                let mut el = Element::container(doc, schema)?;
                for (rank, sh) in schema.fields.iter().enumerate() {
                    if let Some(v) = map.get(&sh.name) {
                        el.children[rank] = Some(Element::from_value(doc, sh, v)?);
                    }
                }
                Ok(el)
            }
            AsnType::Sequence => {
                let items = value.as_seq().ok_or_else(|| kind_err(schema, "a list"))?;
                let of = schema
                    .of()
                    .ok_or_else(|| Error::Schema(format!("'{}' misses '$of'", schema.name)))?;
                let mut el = Element::container(doc, schema)?;
                for item in items {
                    el.children.push(Some(Element::from_value(doc, of, item)?));
                }
                Ok(el)
            }
            AsnType::Choice => {
                let (name, inner) = single_entry(schema, value)?;
                let sh = schema.field(name).ok_or_else(|| {
                    Error::Schema(format!("'{}' does not contain the field '{name}'", schema.name))
                })?;
                let mut child = Element::from_value(doc, sh, inner)?;
                child.in_choice = true;
                let mut el = Element::container(doc, schema)?;
                el.children[0] = Some(child);
                Ok(el)
            }
            AsnType::Any => {
                let (name, inner) = single_entry(schema, value)?;
                let sh = any_target(doc, schema, name)?;
                let mut el = Element::container(doc, schema)?;
                el.children[0] = Some(Element::from_value(doc, sh, inner)?);
                Ok(el)
            }
            _ => Element::leaf_value(doc, schema, value),
        }
    }

    fn leaf_value(doc: &'s Schema, schema: &'s SchemaNode, value: &Value) -> Result<Self> {
        let data = match (schema.ty, value) {
            (AsnType::Null, Value::Null) => Vec::new(),
            (AsnType::Boolean, Value::Bool(b)) => vec![if *b { 0xff } else { 0x00 }],
            (AsnType::Integer, Value::Int(v)) => {
                if !schema.int_in_bounds(*v) {
                    return Err(Error::Value(format!(
                        "'{}' {} out of range value: {v}",
                        schema.name,
                        schema.ty.name()
                    )));
                }
                primitive::encode_int(*v)
            }
            (AsnType::Enumerated, Value::Str(name)) => {
                let v = schema.enum_value(name).ok_or_else(|| {
                    Error::Value(format!(
                        "'{}' {} wrong value: '{name}'",
                        schema.name,
                        schema.ty.name()
                    ))
                })?;
                primitive::encode_int(v)
            }
            (AsnType::Real, Value::Real(v)) => primitive::encode_real(*v)?,
            (AsnType::Real, Value::Int(v)) => primitive::encode_real(*v as f64)?,
            (AsnType::BitString, Value::BitStr(bits)) => encode_bit_string(schema, bits)?,
            (AsnType::OctetString, Value::Bytes(bytes)) => {
                check_len(schema, bytes.len())?;
                bytes.clone()
            }
            (AsnType::ObjectIdentifier, Value::Oid(oid)) => encode_oid(schema, oid)?,
            (AsnType::ObjectDescriptor, Value::Str(s)) => s.clone().into_bytes(),
            (AsnType::Utf8String, Value::Str(s)) => {
                check_len(schema, s.len())?;
                s.clone().into_bytes()
            }
            (AsnType::NumericString, Value::Str(s)) => {
                check_chars(schema, s, |b| primitive::is_numeric(b))?;
                check_len(schema, s.len())?;
                s.clone().into_bytes()
            }
            (AsnType::PrintableString, Value::Str(s)) => {
                check_chars(schema, s, |b| primitive::is_printable(b, true, true))?;
                check_len(schema, s.len())?;
                s.clone().into_bytes()
            }
            (AsnType::Ia5String, Value::Str(s)) => {
                check_chars(schema, s, primitive::is_ia5)?;
                check_len(schema, s.len())?;
                s.clone().into_bytes()
            }
            (AsnType::UtcTime, Value::Time(t)) => {
                let format = schema.format.as_deref().unwrap_or(UTC_FORMAT);
                format_time(schema, t, format)?
            }
            (AsnType::GeneralizedTime, Value::Time(t)) => {
                format_time(schema, t, GENERALIZED_FORMAT)?
            }
            (ty, _) => {
                return Err(Error::Value(format!(
                    "'{}' {} cannot encode this value kind",
                    schema.name,
                    ty.name()
                )))
            }
        };
        Element::leaf(doc, schema, data)
    }

    fn expect_kind(&self, ty: AsnType) -> Result<()> {
        if self.schema.ty == ty {
            Ok(())
        } else {
            Err(Error::Schema(format!(
                "'{}' is not a {}",
                self.schema.name,
                ty.name()
            )))
        }
    }

    fn field_schema(&self, name: &str) -> Result<&'s SchemaNode> {
        self.schema.field(name).ok_or_else(|| {
            Error::Schema(format!(
                "'{}' does not contain the field '{name}'",
                self.schema.name
            ))
        })
    }

    // ---- SEQUENCE mount points -------------------------------------------

    /// Sets the named field of a SEQUENCE from a [`Value`].
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        self.expect_kind(AsnType::Sequence)?;
        let sh = self.field_schema(name)?;
        let rank = self.schema.field_rank(name).ok_or_else(|| {
            Error::Schema(format!("'{}' corrupt field '{name}'", self.schema.name))
        })?;
        if self.children[rank].is_some() {
            return Err(Error::Schema(format!(
                "'{}' field '{name}' already set",
                self.schema.name
            )));
        }
        let el = Element::from_value(self.doc, sh, &value)?;
        self.children[rank] = Some(el);
        Ok(())
    }

    /// Appends one item to a SEQUENCE OF from a [`Value`].
    pub fn add(&mut self, value: Value) -> Result<()> {
        self.expect_kind(AsnType::Sequence)?;
        let of = self
            .schema
            .of()
            .ok_or_else(|| Error::Schema(format!("'{}' misses '$of'", self.schema.name)))?;
        let el = Element::from_value(self.doc, of, &value)?;
        self.children.push(Some(el));
        Ok(())
    }

    /// Appends a constructed SEQUENCE OF item and returns it for filling.
    pub fn add_sequence(&mut self) -> Result<&mut Element<'s>> {
        self.expect_kind(AsnType::Sequence)?;
        let of = self
            .schema
            .of()
            .ok_or_else(|| Error::Schema(format!("'{}' misses '$of'", self.schema.name)))?;
        let el = Element::container(self.doc, of)?;
        self.children.push(None);
        let last = self.children.len() - 1;
        Ok(self.children[last].insert(el))
    }

    fn mount_child(&mut self, name: &str, ty: AsnType) -> Result<&mut Element<'s>> {
        self.expect_kind(AsnType::Sequence)?;
        let sh = self.field_schema(name)?;
        if sh.ty != ty {
            return Err(Error::Schema(format!(
                "'{name}' is not a {}",
                ty.name()
            )));
        }
        let rank = self.schema.field_rank(name).ok_or_else(|| {
            Error::Schema(format!("'{}' corrupt field '{name}'", self.schema.name))
        })?;
        let el = Element::container(self.doc, sh)?;
        Ok(self.children[rank].insert(el))
    }

    /// Mounts a nested SEQUENCE field and returns it for filling.
    pub fn set_sequence(&mut self, name: &str) -> Result<&mut Element<'s>> {
        self.mount_child(name, AsnType::Sequence)
    }

    /// Mounts a CHOICE field and returns it for choosing.
    pub fn set_choice(&mut self, name: &str) -> Result<&mut Element<'s>> {
        self.mount_child(name, AsnType::Choice)
    }

    /// Mounts an ANY field and returns it for resolving.
    pub fn set_any(&mut self, name: &str) -> Result<&mut Element<'s>> {
        self.mount_child(name, AsnType::Any)
    }

    // Thin typed conveniences over `set`.

    pub fn set_null(&mut self, name: &str) -> Result<()> {
        self.set(name, Value::Null)
    }

    pub fn set_boolean(&mut self, name: &str, val: bool) -> Result<()> {
        self.set(name, Value::Bool(val))
    }

    pub fn set_integer(&mut self, name: &str, val: i64) -> Result<()> {
        self.set(name, Value::Int(val))
    }

    pub fn set_real(&mut self, name: &str, val: f64) -> Result<()> {
        self.set(name, Value::Real(val))
    }

    pub fn set_enumerated(&mut self, name: &str, val: &str) -> Result<()> {
        self.set(name, Value::Str(val.to_string()))
    }

    pub fn set_bit_string(&mut self, name: &str, val: BitStr) -> Result<()> {
        self.set(name, Value::BitStr(val))
    }

    pub fn set_octet_string(&mut self, name: &str, val: &[u8]) -> Result<()> {
        self.set(name, Value::Bytes(val.to_vec()))
    }

    pub fn set_utf8_string(&mut self, name: &str, val: &str) -> Result<()> {
        self.set(name, Value::Str(val.to_string()))
    }

    pub fn set_numeric_string(&mut self, name: &str, val: &str) -> Result<()> {
        self.set(name, Value::Str(val.to_string()))
    }

    pub fn set_printable_string(&mut self, name: &str, val: &str) -> Result<()> {
        self.set(name, Value::Str(val.to_string()))
    }

    pub fn set_ia5_string(&mut self, name: &str, val: &str) -> Result<()> {
        self.set(name, Value::Str(val.to_string()))
    }

    pub fn set_oid(&mut self, name: &str, val: Oid) -> Result<()> {
        self.set(name, Value::Oid(val))
    }

    pub fn set_object_descriptor(&mut self, name: &str, val: &str) -> Result<()> {
        self.set(name, Value::Str(val.to_string()))
    }

    pub fn set_utc_time(&mut self, name: &str, val: NaiveDateTime) -> Result<()> {
        self.set(name, Value::Time(val))
    }

    pub fn set_generalized_time(&mut self, name: &str, val: NaiveDateTime) -> Result<()> {
        self.set(name, Value::Time(val))
    }

    // ---- CHOICE mount points ---------------------------------------------

    /// Selects the named CHOICE alternative from a [`Value`].
    pub fn choose(&mut self, name: &str, value: Value) -> Result<()> {
        self.expect_kind(AsnType::Choice)?;
        let sh = self.field_schema(name)?;
        let mut el = Element::from_value(self.doc, sh, &value)?;
        el.in_choice = true;
        self.children[0] = Some(el);
        Ok(())
    }

    fn choice_mount(&mut self, name: &str, ty: AsnType) -> Result<&mut Element<'s>> {
        self.expect_kind(AsnType::Choice)?;
        let sh = self.field_schema(name)?;
        if sh.ty != ty {
            return Err(Error::Schema(format!("'{name}' is not a {}", ty.name())));
        }
        let mut el = Element::container(self.doc, sh)?;
        el.in_choice = true;
        Ok(self.children[0].insert(el))
    }

    pub fn choose_sequence(&mut self, name: &str) -> Result<&mut Element<'s>> {
        self.choice_mount(name, AsnType::Sequence)
    }

    pub fn choose_choice(&mut self, name: &str) -> Result<&mut Element<'s>> {
        self.choice_mount(name, AsnType::Choice)
    }

    pub fn choose_any(&mut self, name: &str) -> Result<&mut Element<'s>> {
        self.choice_mount(name, AsnType::Any)
    }

    // ---- ANY mount points ------------------------------------------------

    /// Resolves an ANY element to the named concrete schema and sets its
    /// value.
    pub fn resolve(&mut self, name: &str, value: Value) -> Result<()> {
        self.expect_kind(AsnType::Any)?;
        let sh = any_target(self.doc, self.schema, name)?;
        let el = Element::from_value(self.doc, sh, &value)?;
        self.children[0] = Some(el);
        Ok(())
    }

    fn any_mount(&mut self, name: &str, ty: AsnType) -> Result<&mut Element<'s>> {
        self.expect_kind(AsnType::Any)?;
        let sh = any_target(self.doc, self.schema, name)?;
        if sh.ty != ty {
            return Err(Error::Schema(format!("'{name}' is not a {}", ty.name())));
        }
        let el = Element::container(self.doc, sh)?;
        Ok(self.children[0].insert(el))
    }

    pub fn resolve_sequence(&mut self, name: &str) -> Result<&mut Element<'s>> {
        self.any_mount(name, AsnType::Sequence)
    }

    pub fn resolve_choice(&mut self, name: &str) -> Result<&mut Element<'s>> {
        self.any_mount(name, AsnType::Choice)
    }

    // ---- Path insertion --------------------------------------------------

    /// Sets a value at a field path, creating constructed intermediate
    /// elements along the way.
    pub fn set_path(&mut self, value: Value, path: &[&str]) -> Result<()> {
        match path {
            [] => Err(Error::Schema("empty path".into())),
            [last] => match self.schema.ty {
                AsnType::Sequence => self.set(last, value),
                AsnType::Choice => self.choose(last, value),
                AsnType::Any => self.resolve(last, value),
                _ => Err(Error::Schema(format!(
                    "'{}' is not a constructed type",
                    self.schema.name
                ))),
            },
            [head, rest @ ..] => self.descend(head)?.set_path(value, rest),
        }
    }

    /// Returns the existing mount for `name`, creating it when absent.
    fn descend(&mut self, name: &str) -> Result<&mut Element<'s>> {
        let doc = self.doc;
        match self.schema.ty {
            AsnType::Sequence => {
                let sh = self.field_schema(name)?;
                let rank = self.schema.field_rank(name).ok_or_else(|| {
                    Error::Schema(format!("'{}' corrupt field '{name}'", self.schema.name))
                })?;
                let slot = &mut self.children[rank];
                let el = match slot.take() {
                    Some(e) => e,
                    None => Element::container(doc, sh)?,
                };
                Ok(slot.insert(el))
            }
            AsnType::Choice => {
                let sh = self.field_schema(name)?;
                let slot = &mut self.children[0];
                let el = match slot.take() {
                    Some(e) if e.schema.name == name => e,
                    _ => {
                        let mut el = Element::container(doc, sh)?;
                        el.in_choice = true;
                        el
                    }
                };
                Ok(slot.insert(el))
            }
            AsnType::Any => {
                let sh = any_target(doc, self.schema, name)?;
                let slot = &mut self.children[0];
                let el = match slot.take() {
                    Some(e) if e.schema.name == name => e,
                    _ => Element::container(doc, sh)?,
                };
                Ok(slot.insert(el))
            }
            _ => Err(Error::Schema(format!(
                "'{}' is not a constructed type",
                self.schema.name
            ))),
        }
    }

    // ---- Preprocess and serialize ----------------------------------------

    /// Full encoded size of this element (tag + length prefix + content),
    /// valid after preprocess.
    fn encoded_size(&self) -> usize {
        let tag_len = 1 + if self.tag.number >= 31 {
            primitive::base128_len(self.tag.number)
        } else {
            0
        };
        tag_len + primitive::length_len(self.len) + self.len
    }

    /// Bottom-up pass: dissolves CHOICE/ANY containers, materializes
    /// IMPLICIT overwrites and EXPLICIT wrappers, and computes lengths.
    fn preprocess(mut self, config: &CodecConfig) -> Result<Element<'s>> {
        let mut kids = Vec::with_capacity(self.children.len());
        for child in self.children {
            kids.push(match child {
                Some(el) => Some(el.preprocess(config)?),
                None => None,
            });
        }
        self.children = kids;

        if !self.wrapper {
            match self.schema.ty {
                AsnType::Choice => {
                    let inner = self
                        .children
                        .get_mut(0)
                        .and_then(Option::take)
                        .ok_or_else(|| Error::MissingField(self.schema.name.clone()))?;
                    // A tagged CHOICE is always EXPLICIT: the alternative's
                    // own tag must survive to disambiguate on decode. The
                    // same holds for a CHOICE nested inside a CHOICE.
                    return if self.schema.is_tagged() || self.in_choice {
                        let n = self.schema.effective_tag().ok_or_else(|| {
                            Error::Schema(format!(
                                "CHOICE '{}' carries neither '$tag' nor '$id'",
                                self.schema.name
                            ))
                        })?;
                        Ok(wrap(inner, n))
                    } else {
                        Ok(inner)
                    };
                }
                AsnType::Any => {
                    let inner = self
                        .children
                        .get_mut(0)
                        .and_then(Option::take)
                        .ok_or_else(|| Error::MissingField(self.schema.name.clone()))?;
                    // ANY's inner type is dynamic, so its tag must survive
                    // too: tagged ANY wraps EXPLICITly.
                    return match self.schema.tag {
                        Some(n) => Ok(wrap(inner, n)),
                        None => Ok(inner),
                    };
                }
                _ => {}
            }
        }

        self.len = if self.tag.constructed {
            self.children
                .iter()
                .flatten()
                .map(Element::encoded_size)
                .sum()
        } else {
            self.data.len()
        };

        if !self.wrapper {
            if let Some(n) = self.schema.tag {
                match self.schema.tag_mode(config) {
                    TagMode::Implicit => {
                        // Constructed flag is inherited from the base type.
                        self.tag.class = TagClass::ContextSpecific;
                        self.tag.number = n;
                    }
                    TagMode::Explicit => return Ok(wrap(self, n)),
                }
            }
        }
        Ok(self)
    }

    fn serialize(&self, out: &mut Vec<u8>) -> Result<()> {
        self.tag.append_to(out);
        primitive::append_length(out, self.len);
        if self.tag.constructed {
            for (i, child) in self.children.iter().enumerate() {
                match child {
                    Some(el) => el.serialize(out)?,
                    None => {
                        let sh = &self.schema.fields[i];
                        if !sh.optional {
                            return Err(Error::MissingField(sh.name.clone()));
                        }
                    }
                }
            }
        } else {
            out.extend_from_slice(&self.data);
        }
        Ok(())
    }

    /// Runs preprocess and serialization, consuming the built tree.
    pub fn encode(self, config: &CodecConfig) -> Result<Vec<u8>> {
        let el = self.preprocess(config)?;
        let mut out = Vec::with_capacity(el.encoded_size());
        el.serialize(&mut out)?;
        Ok(out)
    }
}

impl Codec {
    /// A fresh mount point for building a value of the named type.
    pub fn builder(&self, type_name: &str) -> Result<Element<'_>> {
        let schema = self
            .schema()
            .get(type_name)
            .ok_or_else(|| Error::Schema(format!("unknown type '{type_name}'")))?;
        Element::container(self.schema(), schema)
    }

    /// Encodes a built element tree.
    pub fn encode_element(&self, element: Element<'_>) -> Result<Vec<u8>> {
        element.encode(self.config())
    }

    /// Encodes a [`Value`] tree against the named top-level type.
    pub fn encode(&self, type_name: &str, value: &Value) -> Result<Vec<u8>> {
        let schema = self
            .schema()
            .get(type_name)
            .ok_or_else(|| Error::Schema(format!("unknown type '{type_name}'")))?;
        Element::from_value(self.schema(), schema, value)?.encode(self.config())
    }
}

fn wrap(inner: Element<'_>, n: u32) -> Element<'_> {
    let len = inner.encoded_size();
    Element {
        doc: inner.doc,
        schema: inner.schema,
        tag: Tag::context(n, true),
        data: Vec::new(),
        children: vec![Some(inner)],
        len,
        wrapper: true,
        in_choice: false,
    }
}

fn any_target<'s>(doc: &'s Schema, schema: &'s SchemaNode, name: &str) -> Result<&'s SchemaNode> {
    let target = if schema.fields.is_empty() {
        doc.get(name)
    } else {
        schema.field(name)
    };
    target.ok_or_else(|| {
        Error::Schema(format!(
            "'{}' does not resolve ANY target '{name}'",
            schema.name
        ))
    })
}

fn single_entry<'v>(schema: &SchemaNode, value: &'v Value) -> Result<(&'v str, &'v Value)> {
    let map = value.as_map().ok_or_else(|| kind_err(schema, "a single-key map"))?;
    let mut it = map.iter();
    match (it.next(), it.next()) {
        (Some((k, v)), None) => Ok((k.as_str(), v)),
        _ => Err(kind_err(schema, "a single-key map")),
    }
}

fn kind_err(schema: &SchemaNode, want: &str) -> Error {
    Error::Value(format!(
        "'{}' ({}) expects {want}",
        schema.name,
        schema.ty.name()
    ))
}

fn check_len(schema: &SchemaNode, len: usize) -> Result<()> {
    if schema.len_in_bounds(len) {
        Ok(())
    } else {
        Err(Error::Value(format!(
            "'{}' {} contains invalid length: {len}",
            schema.name,
            schema.ty.name()
        )))
    }
}

fn check_chars(schema: &SchemaNode, s: &str, pred: impl Fn(u8) -> bool) -> Result<()> {
    match s.bytes().find(|&b| !pred(b)) {
        None => Ok(()),
        Some(b) => Err(Error::Value(format!(
            "'{}' {} contains invalid character: {:?}",
            schema.name,
            schema.ty.name(),
            b as char
        ))),
    }
}

fn format_time(schema: &SchemaNode, t: &NaiveDateTime, format: &str) -> Result<Vec<u8>> {
    use std::fmt::Write;
    let mut out = String::new();
    // write! surfaces an invalid format string as an error instead of the
    // panic a plain to_string would produce.
    write!(out, "{}", t.format(format)).map_err(|_| {
        Error::Value(format!(
            "'{}' invalid time format {format:?}",
            schema.name
        ))
    })?;
    Ok(out.into_bytes())
}

fn encode_bit_string(schema: &SchemaNode, bits: &BitStr) -> Result<Vec<u8>> {
    if bits.bytes.len() != (bits.bit_length + 7) / 8 {
        return Err(Error::Value(format!(
            "'{}' BIT_STRING byte count does not match bit length",
            schema.name
        )));
    }
    let padding = ((8 - bits.bit_length % 8) % 8) as u8;
    if padding > 0 {
        if let Some(&last) = bits.bytes.last() {
            if last & ((1u8 << padding) - 1) != 0 {
                return Err(Error::Value(format!(
                    "'{}' BIT_STRING padding bits are not zero",
                    schema.name
                )));
            }
        }
    }
    let mut data = Vec::with_capacity(bits.bytes.len() + 1);
    data.push(padding);
    data.extend_from_slice(&bits.bytes);
    Ok(data)
}

fn encode_oid(schema: &SchemaNode, oid: &Oid) -> Result<Vec<u8>> {
    if oid.0.len() < 2 {
        return Err(Error::Value(format!(
            "'{}' ObjectIdentifier needs at least two arcs",
            schema.name
        )));
    }
    if oid.0[0] > 2 || (oid.0[0] < 2 && oid.0[1] > 39) {
        return Err(Error::Value(format!(
            "'{}' ObjectIdentifier has invalid leading arcs",
            schema.name
        )));
    }
    let mut data = Vec::new();
    primitive::append_base128(&mut data, oid.0[0] * 40 + oid.0[1]);
    for &arc in &oid.0[2..] {
        primitive::append_base128(&mut data, arc);
    }
    Ok(data)
}
