//! Schema-guided decoding: walks a parsed TLV tree against a schema,
//! casting context-specific tags, resolving CHOICE and ANY, and building
//! the labeled [`Value`] tree.

use crate::config::CodecConfig;
use crate::error::{Error, Result};
use crate::primitive;
use crate::schema::{AsnType, Schema, SchemaNode};
use crate::tlv::{Tag, TagClass, Tlv};
use crate::value::{BitStr, Oid, Value};
use chrono::{Datelike, NaiveDateTime};
use log::debug;
use std::collections::HashMap;

pub(crate) const UTC_FORMAT: &str = "%y%m%d%H%MZ";
pub(crate) const UTC_FORMAT_SECONDS: &str = "%y%m%d%H%M%SZ";
pub(crate) const GENERALIZED_FORMAT: &str = "%Y%m%d%H%M%SZ";

/// A schema document paired with a configuration: the entry point for
/// decoding and encoding.
#[derive(Debug)]
pub struct Codec {
    schema: Schema,
    config: CodecConfig,
}

/// Decoder context: the most recently seen ObjectDescriptor string in the
/// current constructed scope. Cloned for speculative CHOICE attempts and
/// committed only on success.
#[derive(Debug, Default, Clone)]
struct DecodeCtx {
    od: Option<String>,
}

impl Codec {
    pub fn new(schema: Schema, config: CodecConfig) -> Self {
        Codec { schema, config }
    }

    /// Loads, validates and wraps a JSON schema document.
    pub fn from_json(doc: &str, config: CodecConfig) -> Result<Self> {
        Ok(Codec {
            schema: Schema::from_str(doc, &config)?,
            config,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    fn named(&self, type_name: &str) -> Result<&SchemaNode> {
        self.schema
            .get(type_name)
            .ok_or_else(|| Error::Schema(format!("unknown type '{type_name}'")))
    }

    /// Parses one complete TLV from `bytes` and decodes it against the
    /// named top-level type. Trailing bytes are ignored.
    pub fn decode(&self, type_name: &str, bytes: &[u8]) -> Result<Value> {
        let (tlv, _rest) = Tlv::parse(bytes)?.ok_or(Error::Truncated)?;
        self.decode_tlv(type_name, &tlv)
    }

    /// Decodes an already parsed TLV against the named top-level type.
    pub fn decode_tlv(&self, type_name: &str, tlv: &Tlv) -> Result<Value> {
        let schema = self.named(type_name)?;
        let mut ctx = DecodeCtx::default();
        self.decode_node(schema, tlv, &mut ctx)
    }

    fn decode_node(&self, schema: &SchemaNode, tlv: &Tlv, ctx: &mut DecodeCtx) -> Result<Value> {
        debug!(
            "decode: '{}' ({}) tag {}",
            schema.name,
            schema.ty.name(),
            tlv.tag.type_name()
        );
        match schema.ty {
            AsnType::Null => self.parse_null(schema, tlv),
            AsnType::Boolean => self.parse_bool(schema, tlv),
            AsnType::Integer => self.parse_integer(schema, tlv),
            AsnType::Enumerated => self.parse_enumerated(schema, tlv),
            AsnType::Real => self.parse_real(schema, tlv),
            AsnType::BitString => self.parse_bit_string(schema, tlv),
            AsnType::OctetString => self.parse_octet_string(schema, tlv),
            AsnType::ObjectIdentifier => self.parse_oid(schema, tlv),
            AsnType::ObjectDescriptor => self.parse_object_descriptor(schema, tlv, ctx),
            AsnType::Utf8String
            | AsnType::NumericString
            | AsnType::PrintableString
            | AsnType::Ia5String => self.parse_string(schema, tlv),
            AsnType::UtcTime => self.parse_utc_time(schema, tlv),
            AsnType::GeneralizedTime => self.parse_generalized_time(schema, tlv),
            AsnType::Sequence => {
                if schema.of.is_some() {
                    self.parse_sequence_of(schema, tlv)
                } else if !schema.fields.is_empty() {
                    self.parse_sequence(schema, tlv)
                } else {
                    Err(Error::Schema(format!(
                        "SEQUENCE '{}' carries neither '$field' nor '$of'",
                        schema.name
                    )))
                }
            }
            AsnType::Choice => self.parse_choice(schema, tlv, ctx),
            AsnType::Any => self.parse_any(schema, tlv, ctx),
            other => Err(Error::Schema(format!(
                "'{}': no decoder for type '{}'",
                schema.name,
                other.name()
            ))),
        }
    }

    /// Checks the (possibly cast) tag against the schema's universal type.
    fn expect_universal<'a>(
        &self,
        schema: &SchemaNode,
        tlv: &'a Tlv,
        ty: AsnType,
    ) -> Result<&'a Tlv> {
        let (node, tag) = cast_tag(tlv, schema);
        if tag.class == TagClass::Universal && Some(tag.number) == ty.universal_tag() {
            Ok(node)
        } else {
            Err(Error::TypeMismatch {
                name: schema.name.clone(),
                expected: schema.ty.name(),
                found: tlv.tag.type_name(),
            })
        }
    }

    fn parse_null(&self, schema: &SchemaNode, tlv: &Tlv) -> Result<Value> {
        let node = self.expect_universal(schema, tlv, AsnType::Null)?;
        if !node.is_empty() {
            return Err(Error::Value(format!(
                "'{}' NULL with {} content bytes",
                schema.name,
                node.len()
            )));
        }
        Ok(Value::Null)
    }

    fn parse_bool(&self, schema: &SchemaNode, tlv: &Tlv) -> Result<Value> {
        let node = self.expect_universal(schema, tlv, AsnType::Boolean)?;
        if node.len() != 1 {
            return Err(Error::Value(format!(
                "'{}' BOOLEAN wrong length {}",
                schema.name,
                node.len()
            )));
        }
        match node.content()[0] {
            0x00 => Ok(Value::Bool(false)),
            0xff => Ok(Value::Bool(true)),
            other => Err(Error::Value(format!(
                "'{}' BOOLEAN wrong value {other:#04x}",
                schema.name
            ))),
        }
    }

    fn parse_integer(&self, schema: &SchemaNode, tlv: &Tlv) -> Result<Value> {
        let node = self.expect_universal(schema, tlv, AsnType::Integer)?;
        let v = primitive::decode_int(node.content())?;
        if !schema.int_in_bounds(v) {
            return Err(Error::Value(format!(
                "'{}' out of range value: {v}",
                schema.name
            )));
        }
        Ok(Value::Int(v))
    }

    fn parse_enumerated(&self, schema: &SchemaNode, tlv: &Tlv) -> Result<Value> {
        let node = self.expect_universal(schema, tlv, AsnType::Enumerated)?;
        let v = primitive::decode_int(node.content())?;
        if !schema.int_in_bounds(v) {
            return Err(Error::Value(format!(
                "'{}' out of range value: {v}",
                schema.name
            )));
        }
        match schema.enum_name(v) {
            Some(name) => Ok(Value::Str(name.to_string())),
            None => Err(Error::Value(format!(
                "'{}' ENUMERATED wrong value: {v}",
                schema.name
            ))),
        }
    }

    fn parse_real(&self, schema: &SchemaNode, tlv: &Tlv) -> Result<Value> {
        let node = self.expect_universal(schema, tlv, AsnType::Real)?;
        Ok(Value::Real(primitive::decode_real(node.content())?))
    }

    fn parse_bit_string(&self, schema: &SchemaNode, tlv: &Tlv) -> Result<Value> {
        let node = self.expect_universal(schema, tlv, AsnType::BitString)?;
        let data = node.content();
        if data.is_empty() {
            return Err(Error::Value(format!(
                "'{}' BIT_STRING zero length",
                schema.name
            )));
        }
        let padding = usize::from(data[0]);
        if padding > 7
            || (data.len() == 1 && padding > 0)
            || data[data.len() - 1] & ((1u8 << data[0]) - 1) != 0
        {
            return Err(Error::Value(format!(
                "'{}' BIT_STRING invalid padding bits",
                schema.name
            )));
        }
        Ok(Value::BitStr(BitStr::new(
            data[1..].to_vec(),
            (data.len() - 1) * 8 - padding,
        )))
    }

    fn parse_octet_string(&self, schema: &SchemaNode, tlv: &Tlv) -> Result<Value> {
        let node = self.expect_universal(schema, tlv, AsnType::OctetString)?;
        if !schema.len_in_bounds(node.len()) {
            return Err(Error::Value(format!(
                "'{}' invalid length: {}",
                schema.name,
                node.len()
            )));
        }
        Ok(Value::Bytes(node.content().to_vec()))
    }

    fn parse_oid(&self, schema: &SchemaNode, tlv: &Tlv) -> Result<Value> {
        let node = self.expect_universal(schema, tlv, AsnType::ObjectIdentifier)?;
        let data = node.content();
        if data.is_empty() {
            return Err(Error::Value(format!(
                "'{}' ObjectIdentifier zero length",
                schema.name
            )));
        }
        let mut arcs = Vec::with_capacity(data.len() + 1);
        // The first sub-identifier packs the first two arcs as 40*a + b;
        // a is restricted to 0..=2.
        let (v, mut offset) = primitive::parse_base128(data, 0)?;
        if v < 80 {
            arcs.push(v / 40);
            arcs.push(v % 40);
        } else {
            arcs.push(2);
            arcs.push(v - 80);
        }
        while offset < data.len() {
            let (v, next) = primitive::parse_base128(data, offset)?;
            arcs.push(v);
            offset = next;
        }
        Ok(Value::Oid(Oid(arcs)))
    }

    fn parse_object_descriptor(
        &self,
        schema: &SchemaNode,
        tlv: &Tlv,
        ctx: &mut DecodeCtx,
    ) -> Result<Value> {
        let node = self.expect_universal(schema, tlv, AsnType::ObjectDescriptor)?;
        let s = std::str::from_utf8(node.content())
            .map_err(|_| Error::Value(format!("'{}' ObjectDescriptor is not UTF-8", schema.name)))?
            .to_string();
        ctx.od = Some(s.clone());
        Ok(Value::Str(s))
    }

    fn parse_string(&self, schema: &SchemaNode, tlv: &Tlv) -> Result<Value> {
        let node = self.expect_universal(schema, tlv, schema.ty)?;
        let data = node.content();
        let ok = match schema.ty {
            AsnType::NumericString => data.iter().all(|&b| primitive::is_numeric(b)),
            AsnType::PrintableString => data.iter().all(|&b| primitive::is_printable(b, true, true)),
            AsnType::Ia5String => data.iter().all(|&b| primitive::is_ia5(b)),
            _ => true,
        };
        if !ok {
            return Err(Error::Value(format!(
                "'{}' {} contains an invalid character",
                schema.name,
                schema.ty.name()
            )));
        }
        let s = std::str::from_utf8(data)
            .map_err(|_| Error::Value(format!("'{}' invalid UTF-8 string", schema.name)))?;
        if !schema.len_in_bounds(s.len()) {
            return Err(Error::Value(format!(
                "'{}' invalid length: {}",
                schema.name,
                s.len()
            )));
        }
        Ok(Value::Str(s.to_string()))
    }

    fn parse_utc_time(&self, schema: &SchemaNode, tlv: &Tlv) -> Result<Value> {
        let node = self.expect_universal(schema, tlv, AsnType::UtcTime)?;
        let s = std::str::from_utf8(node.content())
            .map_err(|_| Error::Value(format!("'{}' UTCTime is not ASCII", schema.name)))?;
        let primary = schema.format.as_deref().unwrap_or(UTC_FORMAT);
        let (dt, used) = match NaiveDateTime::parse_from_str(s, primary) {
            Ok(dt) => (dt, primary),
            Err(_) => (
                NaiveDateTime::parse_from_str(s, UTC_FORMAT_SECONDS)
                    .map_err(|_| Error::Value(format!("'{}' unparseable UTCTime {s:?}", schema.name)))?,
                UTC_FORMAT_SECONDS,
            ),
        };
        check_time_roundtrip(s, &dt, used)?;
        // UTCTime only covers years before 2050.
        let dt = if dt.year() >= 2050 {
            dt.with_year(dt.year() - 100)
                .ok_or_else(|| Error::Value(format!("'{}' invalid UTCTime date", schema.name)))?
        } else {
            dt
        };
        Ok(Value::Time(dt))
    }

    fn parse_generalized_time(&self, schema: &SchemaNode, tlv: &Tlv) -> Result<Value> {
        let node = self.expect_universal(schema, tlv, AsnType::GeneralizedTime)?;
        let s = std::str::from_utf8(node.content())
            .map_err(|_| Error::Value(format!("'{}' GeneralizedTime is not ASCII", schema.name)))?;
        let dt = NaiveDateTime::parse_from_str(s, GENERALIZED_FORMAT).map_err(|_| {
            Error::Value(format!("'{}' unparseable GeneralizedTime {s:?}", schema.name))
        })?;
        check_time_roundtrip(s, &dt, GENERALIZED_FORMAT)?;
        Ok(Value::Time(dt))
    }

    fn parse_sequence(&self, schema: &SchemaNode, tlv: &Tlv) -> Result<Value> {
        let node = self.expect_universal(schema, tlv, AsnType::Sequence)?;
        if !node.tag.constructed {
            return Err(Error::Value(format!("'{}' not constructed", schema.name)));
        }
        let mut out = HashMap::new();
        // ObjectDescriptor visibility is scoped to this sequence.
        let mut inner = DecodeCtx::default();
        let mut idx = 0;
        for sh in &schema.fields {
            let attempt = match node.children().get(idx) {
                Some(child) => self.decode_node(sh, child, &mut inner),
                None => Err(Error::Value(format!(
                    "missing field '{}' ({})",
                    sh.name,
                    sh.ty.name()
                ))),
            };
            match attempt {
                Ok(v) => {
                    out.insert(sh.name.clone(), v);
                    idx += 1;
                }
                Err(_) if sh.optional => {
                    if let Some(def) = &sh.default {
                        out.insert(sh.name.clone(), def.clone());
                    }
                }
                Err(e) => return Err(e),
            }
        }
        if idx < node.children().len() {
            return Err(Error::Value(format!(
                "'{}' has {} trailing element(s) with no matching field",
                schema.name,
                node.children().len() - idx
            )));
        }
        Ok(Value::Map(out))
    }

    fn parse_sequence_of(&self, schema: &SchemaNode, tlv: &Tlv) -> Result<Value> {
        let node = self.expect_universal(schema, tlv, AsnType::Sequence)?;
        if !node.tag.constructed {
            return Err(Error::Value(format!("'{}' not constructed", schema.name)));
        }
        let of = schema
            .of()
            .ok_or_else(|| Error::Schema(format!("'{}' misses '$of'", schema.name)))?;
        let mut inner = DecodeCtx::default();
        let mut out = Vec::with_capacity(node.children().len());
        for child in node.children() {
            out.push(self.decode_node(of, child, &mut inner)?);
        }
        Ok(Value::Seq(out))
    }

    fn parse_choice(&self, schema: &SchemaNode, tlv: &Tlv, ctx: &mut DecodeCtx) -> Result<Value> {
        if schema.fields.is_empty() {
            return Err(Error::Schema(format!(
                "CHOICE '{}' has no alternatives",
                schema.name
            )));
        }
        // A tagged CHOICE arrives in an explicit wrapper; peel it first.
        let (node, _) = cast_tag(tlv, schema);

        // Fast path: the alternative whose effective tag matches.
        if let Some(sh) = schema.find_by_index(node.tag.number) {
            let mut trial = ctx.clone();
            if let Ok(v) = self.decode_node(sh, node, &mut trial) {
                *ctx = trial;
                return Ok(single(sh.name.clone(), v));
            }
        }
        // Bounded backtracking over the alternatives; each attempt is a
        // pure function of the byte span, so failures are suppressed.
        for sh in &schema.fields {
            let mut trial = ctx.clone();
            if let Ok(v) = self.decode_node(sh, node, &mut trial) {
                *ctx = trial;
                return Ok(single(sh.name.clone(), v));
            }
        }
        Err(Error::Value(format!(
            "no CHOICE alternative of '{}' matched {}",
            schema.name,
            tlv.tag.type_name()
        )))
    }

    fn parse_any(&self, schema: &SchemaNode, tlv: &Tlv, ctx: &mut DecodeCtx) -> Result<Value> {
        let od = match ctx.od.as_deref() {
            Some(od) if !od.is_empty() => od,
            _ => {
                return Err(Error::Value(format!(
                    "'{}' misses a preceding ObjectDescriptor",
                    schema.name
                )))
            }
        };
        let target = if schema.fields.is_empty() {
            self.schema.get(od)
        } else {
            schema.field(od)
        };
        let target = target.ok_or_else(|| {
            Error::Schema(format!("'{}' unknown ObjectDescriptor '{od}'", schema.name))
        })?;
        // A tagged ANY arrives in an explicit wrapper; peel it first.
        let (node, _) = cast_tag(tlv, schema);
        self.decode_node(target, node, ctx)
    }
}

/// Reconciles a context-specific wire tag with the schema type: a
/// primitive context tag is reinterpreted as the base type (IMPLICIT), a
/// constructed one with exactly one child is peeled (EXPLICIT). Virtual
/// base types keep the inner element's own tag.
fn cast_tag<'a>(tlv: &'a Tlv, schema: &SchemaNode) -> (&'a Tlv, Tag) {
    let mut node = tlv;
    let mut cast = false;
    if tlv.tag.class == TagClass::ContextSpecific && Some(tlv.tag.number) == schema.effective_tag()
    {
        if !tlv.tag.constructed {
            cast = true;
        } else if tlv.children().len() == 1 {
            cast = true;
            node = &tlv.children()[0];
        }
    }
    let mut tag = node.tag;
    if cast {
        if let Some(n) = schema.ty.universal_tag() {
            tag = Tag {
                class: TagClass::Universal,
                number: n,
                constructed: tag.constructed,
            };
        }
    }
    (node, tag)
}

fn check_time_roundtrip(given: &str, dt: &NaiveDateTime, format: &str) -> Result<()> {
    let serialized = dt.format(format).to_string();
    if serialized != given {
        return Err(Error::RoundTrip {
            given: given.to_string(),
            serialized,
        });
    }
    Ok(())
}

fn single(name: String, v: Value) -> Value {
    let mut m = HashMap::new();
    m.insert(name, v);
    Value::Map(m)
}
