//! Schema model: a tree of typed field descriptors loaded from a JSON
//! document, with a structural validator run at load time.
//!
//! A schema document is a dictionary of named top-level types. Each node
//! uses `$`-prefixed reserved keys: `$type` (required), `$id`, `$tag`,
//! `$implicit`/`$explicit`, `$optional`, `$default`, `$min`/`$max`,
//! `$format`, `$field` (children, or name→integer for ENUMERATED) and
//! `$of` (SEQUENCE OF element). Schemas are immutable after load and may
//! be shared freely between concurrent decodes.

use crate::config::{CodecConfig, TagMode};
use crate::error::{Error, Result};
use crate::value::Value;
use serde_json::Value as Json;
use std::io;

/// The closed set of types a schema node can declare: the BER universal
/// types plus the virtual types CHOICE and ANY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsnType {
    Eoc,
    Boolean,
    Integer,
    BitString,
    OctetString,
    Null,
    ObjectIdentifier,
    ObjectDescriptor,
    External,
    Real,
    Enumerated,
    EmbeddedPdv,
    Utf8String,
    Sequence,
    Set,
    NumericString,
    PrintableString,
    TeletexString,
    VideotexString,
    Ia5String,
    UtcTime,
    GeneralizedTime,
    GraphicString,
    VisibleString,
    GeneralString,
    UniversalString,
    BmpString,
    Choice,
    Any,
}

impl AsnType {
    pub fn from_name(s: &str) -> Option<Self> {
        Some(match s {
            "EOC" => AsnType::Eoc,
            "BOOLEAN" => AsnType::Boolean,
            "INTEGER" => AsnType::Integer,
            "BIT_STRING" => AsnType::BitString,
            "OCTET_STRING" => AsnType::OctetString,
            "NULL" => AsnType::Null,
            "ObjectIdentifier" => AsnType::ObjectIdentifier,
            "ObjectDescriptor" => AsnType::ObjectDescriptor,
            "EXTERNAL" => AsnType::External,
            "REAL" => AsnType::Real,
            "ENUMERATED" => AsnType::Enumerated,
            "EMBEDDED_PDV" => AsnType::EmbeddedPdv,
            "UTF8String" => AsnType::Utf8String,
            "SEQUENCE" => AsnType::Sequence,
            "SET" => AsnType::Set,
            "NumericString" => AsnType::NumericString,
            "PrintableString" => AsnType::PrintableString,
            "TeletexString" => AsnType::TeletexString,
            "VideotexString" => AsnType::VideotexString,
            "IA5String" => AsnType::Ia5String,
            "UTCTime" => AsnType::UtcTime,
            "GeneralizedTime" => AsnType::GeneralizedTime,
            "GraphicString" => AsnType::GraphicString,
            "VisibleString" => AsnType::VisibleString,
            "GeneralString" => AsnType::GeneralString,
            "UniversalString" => AsnType::UniversalString,
            "BMPString" => AsnType::BmpString,
            "CHOICE" => AsnType::Choice,
            "ANY" => AsnType::Any,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            AsnType::Eoc => "EOC",
            AsnType::Boolean => "BOOLEAN",
            AsnType::Integer => "INTEGER",
            AsnType::BitString => "BIT_STRING",
            AsnType::OctetString => "OCTET_STRING",
            AsnType::Null => "NULL",
            AsnType::ObjectIdentifier => "ObjectIdentifier",
            AsnType::ObjectDescriptor => "ObjectDescriptor",
            AsnType::External => "EXTERNAL",
            AsnType::Real => "REAL",
            AsnType::Enumerated => "ENUMERATED",
            AsnType::EmbeddedPdv => "EMBEDDED_PDV",
            AsnType::Utf8String => "UTF8String",
            AsnType::Sequence => "SEQUENCE",
            AsnType::Set => "SET",
            AsnType::NumericString => "NumericString",
            AsnType::PrintableString => "PrintableString",
            AsnType::TeletexString => "TeletexString",
            AsnType::VideotexString => "VideotexString",
            AsnType::Ia5String => "IA5String",
            AsnType::UtcTime => "UTCTime",
            AsnType::GeneralizedTime => "GeneralizedTime",
            AsnType::GraphicString => "GraphicString",
            AsnType::VisibleString => "VisibleString",
            AsnType::GeneralString => "GeneralString",
            AsnType::UniversalString => "UniversalString",
            AsnType::BmpString => "BMPString",
            AsnType::Choice => "CHOICE",
            AsnType::Any => "ANY",
        }
    }

    /// The universal tag number, or `None` for the virtual types.
    pub fn universal_tag(self) -> Option<u32> {
        Some(match self {
            AsnType::Eoc => 0x00,
            AsnType::Boolean => 0x01,
            AsnType::Integer => 0x02,
            AsnType::BitString => 0x03,
            AsnType::OctetString => 0x04,
            AsnType::Null => 0x05,
            AsnType::ObjectIdentifier => 0x06,
            AsnType::ObjectDescriptor => 0x07,
            AsnType::External => 0x08,
            AsnType::Real => 0x09,
            AsnType::Enumerated => 0x0a,
            AsnType::EmbeddedPdv => 0x0b,
            AsnType::Utf8String => 0x0c,
            AsnType::Sequence => 0x10,
            AsnType::Set => 0x11,
            AsnType::NumericString => 0x12,
            AsnType::PrintableString => 0x13,
            AsnType::TeletexString => 0x14,
            AsnType::VideotexString => 0x15,
            AsnType::Ia5String => 0x16,
            AsnType::UtcTime => 0x17,
            AsnType::GeneralizedTime => 0x18,
            AsnType::GraphicString => 0x19,
            AsnType::VisibleString => 0x1a,
            AsnType::GeneralString => 0x1b,
            AsnType::UniversalString => 0x1c,
            AsnType::BmpString => 0x1e,
            AsnType::Choice | AsnType::Any => return None,
        })
    }

    /// The type carried by a universal tag number, if any.
    pub fn from_tag(n: u32) -> Option<Self> {
        Some(match n {
            0x00 => AsnType::Eoc,
            0x01 => AsnType::Boolean,
            0x02 => AsnType::Integer,
            0x03 => AsnType::BitString,
            0x04 => AsnType::OctetString,
            0x05 => AsnType::Null,
            0x06 => AsnType::ObjectIdentifier,
            0x07 => AsnType::ObjectDescriptor,
            0x08 => AsnType::External,
            0x09 => AsnType::Real,
            0x0a => AsnType::Enumerated,
            0x0b => AsnType::EmbeddedPdv,
            0x0c => AsnType::Utf8String,
            0x10 => AsnType::Sequence,
            0x11 => AsnType::Set,
            0x12 => AsnType::NumericString,
            0x13 => AsnType::PrintableString,
            0x14 => AsnType::TeletexString,
            0x15 => AsnType::VideotexString,
            0x16 => AsnType::Ia5String,
            0x17 => AsnType::UtcTime,
            0x18 => AsnType::GeneralizedTime,
            0x19 => AsnType::GraphicString,
            0x1a => AsnType::VisibleString,
            0x1b => AsnType::GeneralString,
            0x1c => AsnType::UniversalString,
            0x1e => AsnType::BmpString,
            _ => return None,
        })
    }
}

/// One typed field descriptor. Children of constructed types live in
/// [`fields`](Self::fields), sorted by `id` ascending at load time.
#[derive(Debug, Clone)]
pub struct SchemaNode {
    pub name: String,
    pub ty: AsnType,
    pub id: Option<u32>,
    pub tag: Option<u32>,
    pub implicit: bool,
    pub explicit: bool,
    pub optional: bool,
    pub default: Option<Value>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub format: Option<String>,
    pub fields: Vec<SchemaNode>,
    pub enum_items: Vec<(String, i64)>,
    pub of: Option<Box<SchemaNode>>,
}

impl SchemaNode {
    /// The context tag to expect or emit: `$tag`, falling back to `$id`.
    pub fn effective_tag(&self) -> Option<u32> {
        self.tag.or(self.id)
    }

    /// Whether this field carries a context-specific tag on the wire.
    pub fn is_tagged(&self) -> bool {
        self.tag.is_some()
    }

    /// The tagging mode for this field, per its flags and the config.
    pub fn tag_mode(&self, config: &CodecConfig) -> TagMode {
        if self.explicit {
            TagMode::Explicit
        } else if self.implicit {
            TagMode::Implicit
        } else {
            config.default_mode
        }
    }

    pub fn field(&self, name: &str) -> Option<&SchemaNode> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Slot position of `name` in the id-sorted field list.
    pub fn field_rank(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    // Arity is small, so these scan the sorted list.
    pub fn find_by_id(&self, id: u32) -> Option<&SchemaNode> {
        self.fields.iter().find(|f| f.id == Some(id))
    }

    pub fn find_by_index(&self, idx: u32) -> Option<&SchemaNode> {
        self.fields.iter().find(|f| f.effective_tag() == Some(idx))
    }

    pub fn of(&self) -> Option<&SchemaNode> {
        self.of.as_deref()
    }

    pub fn enum_name(&self, value: i64) -> Option<&str> {
        self.enum_items
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }

    pub fn enum_value(&self, name: &str) -> Option<i64> {
        self.enum_items
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Bounds apply whenever `$min`/`$max` is present; absence means no
    /// bound.
    pub fn int_in_bounds(&self, v: i64) -> bool {
        self.min.map_or(true, |m| v >= m) && self.max.map_or(true, |m| v <= m)
    }

    pub fn len_in_bounds(&self, len: usize) -> bool {
        let len = len as i64;
        self.min.map_or(true, |m| len >= m) && self.max.map_or(true, |m| len <= m)
    }
}

/// A loaded and validated schema document: named top-level types.
#[derive(Debug, Clone)]
pub struct Schema {
    types: Vec<SchemaNode>,
}

impl Schema {
    /// Loads and validates a schema document from JSON text.
    pub fn from_str(doc: &str, config: &CodecConfig) -> Result<Self> {
        let json: Json =
            serde_json::from_str(doc).map_err(|e| Error::Schema(format!("invalid JSON: {e}")))?;
        Self::from_json(&json, config)
    }

    pub fn from_slice(doc: &[u8], config: &CodecConfig) -> Result<Self> {
        let json: Json =
            serde_json::from_slice(doc).map_err(|e| Error::Schema(format!("invalid JSON: {e}")))?;
        Self::from_json(&json, config)
    }

    pub fn from_reader(rd: impl io::Read, config: &CodecConfig) -> Result<Self> {
        let json: Json = serde_json::from_reader(rd)
            .map_err(|e| Error::Schema(format!("invalid JSON: {e}")))?;
        Self::from_json(&json, config)
    }

    pub fn from_json(json: &Json, config: &CodecConfig) -> Result<Self> {
        let obj = json
            .as_object()
            .ok_or_else(|| Error::Schema("document root must be an object".into()))?;
        let mut types = Vec::with_capacity(obj.len());
        for (name, v) in obj {
            types.push(build_node(name, v, config, false)?);
        }
        Ok(Schema { types })
    }

    /// Looks up a top-level named type.
    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn types(&self) -> &[SchemaNode] {
        &self.types
    }
}

fn get_u32(obj: &serde_json::Map<String, Json>, key: &str, name: &str) -> Result<Option<u32>> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) => {
            let n = v
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| {
                    Error::Schema(format!("'{name}': '{key}' must be a non-negative integer"))
                })?;
            Ok(Some(n))
        }
    }
}

fn get_i64(obj: &serde_json::Map<String, Json>, key: &str, name: &str) -> Result<Option<i64>> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| Error::Schema(format!("'{name}': '{key}' must be an integer"))),
    }
}

fn get_bool(obj: &serde_json::Map<String, Json>, key: &str) -> bool {
    obj.get(key).and_then(Json::as_bool).unwrap_or(false)
}

fn json_to_value(v: &Json) -> Result<Value> {
    Ok(match v {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(f) = n.as_f64() {
                Value::Real(f)
            } else {
                return Err(Error::Schema(format!("unrepresentable number {n}")));
            }
        }
        Json::String(s) => Value::Str(s.clone()),
        Json::Array(items) => {
            Value::Seq(items.iter().map(json_to_value).collect::<Result<_>>()?)
        }
        Json::Object(map) => Value::Map(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), json_to_value(v)?)))
                .collect::<Result<_>>()?,
        ),
    })
}

/// Builds one schema node, validating it and its subtree. `is_field` is
/// true for entries of a `$field` mapping, which must carry `$id` and take
/// part in the implicit-flag synthesis.
fn build_node(name: &str, v: &Json, config: &CodecConfig, is_field: bool) -> Result<SchemaNode> {
    let obj = v
        .as_object()
        .ok_or_else(|| Error::Schema(format!("'{name}' must be an object")))?;

    let ty_name = obj
        .get("$type")
        .and_then(Json::as_str)
        .ok_or_else(|| Error::Schema(format!("'{name}' misses '$type'")))?;
    let ty = AsnType::from_name(ty_name)
        .ok_or_else(|| Error::Schema(format!("'{name}' has unknown type '{ty_name}'")))?;

    let id = get_u32(obj, "$id", name)?;
    let tag = get_u32(obj, "$tag", name)?;
    let mut implicit = get_bool(obj, "$implicit");
    let explicit = get_bool(obj, "$explicit");
    if implicit && explicit {
        return Err(Error::Schema(format!(
            "'{name}' sets both '$implicit' and '$explicit'"
        )));
    }

    if is_field && id.is_none() {
        return Err(Error::Schema(format!("'{name}' misses '$id'")));
    }
    // Fields that leave the tagging mode open while the codec default is
    // the non-implicit one are pinned to IMPLICIT, so the wire format does
    // not shift if a `$tag` is added later.
    if is_field
        && tag.is_none()
        && !implicit
        && !explicit
        && config.default_mode == TagMode::Explicit
    {
        implicit = true;
    }

    let has_field = obj.contains_key("$field");
    let has_of = obj.contains_key("$of");
    if has_field && has_of {
        return Err(Error::Schema(format!(
            "'{name}' ({ty_name}) carries both '$field' and '$of'"
        )));
    }
    if matches!(ty, AsnType::Choice | AsnType::Sequence) && !has_field && !has_of {
        return Err(Error::Schema(format!(
            "'{name}' ({ty_name}) misses '$field' or '$of'"
        )));
    }

    let mut fields = Vec::new();
    let mut enum_items = Vec::new();
    if let Some(fld) = obj.get("$field") {
        let map = fld
            .as_object()
            .ok_or_else(|| Error::Schema(format!("'{name}': '$field' must be an object")))?;
        for (k, entry) in map {
            match (ty, entry) {
                (AsnType::Enumerated, Json::Number(_)) => {
                    let n = entry.as_i64().ok_or_else(|| {
                        Error::Schema(format!("'{name}': enum entry '{k}' must be an integer"))
                    })?;
                    enum_items.push((k.clone(), n));
                }
                (AsnType::Enumerated, _) => {
                    return Err(Error::Schema(format!(
                        "'{name}': enum entry '{k}' must be an integer"
                    )))
                }
                (_, Json::Object(_)) => fields.push(build_node(k, entry, config, true)?),
                _ => {
                    return Err(Error::Schema(format!(
                        "'{name}': field '{k}' is neither a sub-schema nor an enum integer"
                    )))
                }
            }
        }
    }
    fields.sort_by_key(|f| f.id);

    let mut seen_ids = Vec::new();
    for f in &fields {
        if let Some(fid) = f.id {
            if seen_ids.contains(&fid) {
                return Err(Error::Schema(format!(
                    "'$id' {fid} in '{name}' already exists"
                )));
            }
            seen_ids.push(fid);
        }
    }
    if ty == AsnType::Choice {
        let mut seen_tags = Vec::new();
        for f in &fields {
            if let Some(t) = f.effective_tag() {
                if seen_tags.contains(&t) {
                    return Err(Error::Schema(format!(
                        "duplicate CHOICE tag {t} in '{name}'"
                    )));
                }
                seen_tags.push(t);
            }
        }
    }

    let of = match obj.get("$of") {
        None => None,
        Some(sub) => Some(Box::new(build_node(name, sub, config, false)?)),
    };

    Ok(SchemaNode {
        name: name.to_string(),
        ty,
        id,
        tag,
        implicit,
        explicit,
        optional: get_bool(obj, "$optional"),
        default: obj.get("$default").map(json_to_value).transpose()?,
        min: get_i64(obj, "$min", name)?,
        max: get_i64(obj, "$max", name)?,
        format: obj.get("$format").and_then(Json::as_str).map(str::to_string),
        fields,
        enum_items,
        of,
    })
}
