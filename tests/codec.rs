//! End-to-end wire scenarios: literal byte vectors, round-trip laws,
//! tagging modes and boundary cases.

use asn1dyn::{Codec, CodecConfig, Value};
use std::collections::HashMap;

fn codec(doc: &str) -> Codec {
    Codec::from_json(doc, CodecConfig::default()).expect("schema")
}

fn map(pairs: &[(&str, Value)]) -> Value {
    Value::Map(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<HashMap<_, _>>(),
    )
}

#[test]
fn integer_literal_wire() {
    let c = codec(r#"{"X": {"$type": "INTEGER"}}"#);
    let bytes = c.encode("X", &Value::Int(127)).unwrap();
    assert_eq!(bytes, [0x02, 0x01, 0x7f]);
    assert_eq!(c.decode("X", &bytes).unwrap(), Value::Int(127));
}

#[test]
fn non_minimal_integer_rejected() {
    let c = codec(r#"{"X": {"$type": "INTEGER"}}"#);
    assert!(c.decode("X", &[0x02, 0x02, 0x00, 0x7f]).is_err());
}

#[test]
fn optional_default_materializes_on_decode() {
    let c = codec(
        r#"{"S": {"$type": "SEQUENCE", "$field": {
            "a": {"$type": "BOOLEAN", "$id": 0},
            "b": {"$type": "INTEGER", "$id": 1, "$optional": true, "$default": 5}
        }}}"#,
    );
    let bytes = c.encode("S", &map(&[("a", Value::Bool(true))])).unwrap();
    assert_eq!(bytes, [0x30, 0x03, 0x01, 0x01, 0xff]);
    let decoded = c.decode("S", &bytes).unwrap();
    assert_eq!(
        decoded,
        map(&[("a", Value::Bool(true)), ("b", Value::Int(5))])
    );
}

#[test]
fn implicit_and_explicit_tagging_wire() {
    let c = codec(r#"{"X": {"$type": "INTEGER", "$tag": 3, "$implicit": true}}"#);
    let bytes = c.encode("X", &Value::Int(1)).unwrap();
    assert_eq!(bytes, [0x83, 0x01, 0x01]);
    assert_eq!(c.decode("X", &bytes).unwrap(), Value::Int(1));

    let c = codec(r#"{"X": {"$type": "INTEGER", "$tag": 3, "$explicit": true}}"#);
    let bytes = c.encode("X", &Value::Int(1)).unwrap();
    assert_eq!(bytes, [0xa3, 0x03, 0x02, 0x01, 0x01]);
    assert_eq!(c.decode("X", &bytes).unwrap(), Value::Int(1));
}

#[test]
fn mode_flip_changes_wire_not_value() {
    let doc = r#"{"X": {"$type": "INTEGER", "$tag": 3}}"#;
    let implicit = Codec::from_json(doc, CodecConfig::implicit()).unwrap();
    let explicit = Codec::from_json(doc, CodecConfig::explicit()).unwrap();

    let short = implicit.encode("X", &Value::Int(1)).unwrap();
    let long = explicit.encode("X", &Value::Int(1)).unwrap();
    assert_eq!(short, [0x83, 0x01, 0x01]);
    assert_eq!(long, [0xa3, 0x03, 0x02, 0x01, 0x01]);
    assert_ne!(short, long);
    // Tag casting handles both forms regardless of the configured mode.
    for c in [&implicit, &explicit] {
        assert_eq!(c.decode("X", &short).unwrap(), Value::Int(1));
        assert_eq!(c.decode("X", &long).unwrap(), Value::Int(1));
    }
}

const CHOICE_DOC: &str = r#"{"C": {"$type": "CHOICE", "$field": {
    "i": {"$type": "INTEGER", "$id": 0},
    "s": {"$type": "UTF8String", "$id": 1}
}}}"#;

#[test]
fn choice_decodes_by_alternative() {
    let c = codec(CHOICE_DOC);
    assert_eq!(
        c.decode("C", &[0x02, 0x01, 0x2a]).unwrap(),
        map(&[("i", Value::Int(42))])
    );
    assert_eq!(
        c.decode("C", &[0x0c, 0x02, 0x68, 0x69]).unwrap(),
        map(&[("s", Value::Str("hi".into()))])
    );
}

#[test]
fn choice_output_has_exactly_one_key() {
    let c = codec(CHOICE_DOC);
    let decoded = c.decode("C", &[0x02, 0x01, 0x2a]).unwrap();
    assert_eq!(decoded.as_map().unwrap().len(), 1);
}

#[test]
fn choice_roundtrips_to_same_bytes() {
    let c = codec(CHOICE_DOC);
    for wire in [vec![0x02, 0x01, 0x2a], vec![0x0c, 0x02, 0x68, 0x69]] {
        let v = c.decode("C", &wire).unwrap();
        assert_eq!(c.encode("C", &v).unwrap(), wire);
    }
}

#[test]
fn choice_no_alternative_matched() {
    let c = codec(CHOICE_DOC);
    // BOOLEAN matches neither alternative.
    assert!(c.decode("C", &[0x01, 0x01, 0xff]).is_err());
}

#[test]
fn sequence_of_wire_and_order() {
    let c = codec(r#"{"L": {"$type": "SEQUENCE", "$of": {"$type": "BOOLEAN"}}}"#);
    let v = Value::Seq(vec![
        Value::Bool(true),
        Value::Bool(false),
        Value::Bool(true),
    ]);
    let bytes = c.encode("L", &v).unwrap();
    assert_eq!(
        bytes,
        [0x30, 0x09, 0x01, 0x01, 0xff, 0x01, 0x01, 0x00, 0x01, 0x01, 0xff]
    );
    let decoded = c.decode("L", &bytes).unwrap();
    assert_eq!(decoded, v);
    assert_eq!(decoded.as_seq().unwrap().len(), 3);
}

#[test]
fn choice_in_choice_is_explicit() {
    let c = codec(
        r#"{"C": {"$type": "CHOICE", "$field": {
            "inner": {"$type": "CHOICE", "$id": 0, "$field": {
                "x": {"$type": "INTEGER", "$id": 0}
            }},
            "other": {"$type": "BOOLEAN", "$id": 1}
        }}}"#,
    );
    let v = map(&[("inner", map(&[("x", Value::Int(5))]))]);
    let bytes = c.encode("C", &v).unwrap();
    // The nested CHOICE is wrapped [0] EXPLICIT so its alternative's tag
    // survives.
    assert_eq!(bytes, [0xa0, 0x03, 0x02, 0x01, 0x05]);
    assert_eq!(c.decode("C", &bytes).unwrap(), v);
}

#[test]
fn tagged_choice_wraps_explicitly_even_in_implicit_mode() {
    let doc = r#"{"S": {"$type": "SEQUENCE", "$field": {
        "c": {"$type": "CHOICE", "$id": 0, "$tag": 2, "$field": {
            "x": {"$type": "INTEGER", "$id": 0},
            "y": {"$type": "BOOLEAN", "$id": 1}
        }}
    }}}"#;
    let c = Codec::from_json(doc, CodecConfig::implicit()).unwrap();
    let v = map(&[("c", map(&[("y", Value::Bool(true))]))]);
    let bytes = c.encode("S", &v).unwrap();
    assert_eq!(bytes, [0x30, 0x05, 0xa2, 0x03, 0x01, 0x01, 0xff]);
    assert_eq!(c.decode("S", &bytes).unwrap(), v);
}

#[test]
fn tag_numbers_30_and_31() {
    let c = codec(r#"{"X": {"$type": "INTEGER", "$tag": 30, "$implicit": true}}"#);
    let bytes = c.encode("X", &Value::Int(1)).unwrap();
    assert_eq!(bytes, [0x9e, 0x01, 0x01]);
    assert_eq!(c.decode("X", &bytes).unwrap(), Value::Int(1));

    let c = codec(r#"{"X": {"$type": "INTEGER", "$tag": 31, "$implicit": true}}"#);
    let bytes = c.encode("X", &Value::Int(1)).unwrap();
    assert_eq!(bytes, [0x9f, 0x1f, 0x01, 0x01]);
    assert_eq!(c.decode("X", &bytes).unwrap(), Value::Int(1));
}

#[test]
fn boundary_lengths_roundtrip() {
    let c = codec(r#"{"B": {"$type": "OCTET_STRING"}}"#);
    for len in [127usize, 128, 255, 256, 65535, 65536] {
        let v = Value::Bytes(vec![0xab; len]);
        let bytes = c.encode("B", &v).unwrap();
        assert_eq!(c.decode("B", &bytes).unwrap(), v, "length {len}");
    }
    // Spot-check the long-form prefix.
    let bytes = c.encode("B", &Value::Bytes(vec![0xab; 128])).unwrap();
    assert_eq!(&bytes[..3], [0x04, 0x81, 0x80]);
}

#[test]
fn utc_time_pivot() {
    let c = codec(r#"{"T": {"$type": "UTCTime"}}"#);
    let mut wire = vec![0x17, 0x0b];
    wire.extend_from_slice(b"4912312359Z");
    let t = c.decode("T", &wire).unwrap().as_time().unwrap();
    assert_eq!(chrono::Datelike::year(&t.date()), 2049);

    let mut wire = vec![0x17, 0x0b];
    wire.extend_from_slice(b"5001010000Z");
    let t = c.decode("T", &wire).unwrap().as_time().unwrap();
    assert_eq!(chrono::Datelike::year(&t.date()), 1950);
}

#[test]
fn utc_time_unparseable_rejected() {
    let c = codec(r#"{"T": {"$type": "UTCTime"}}"#);
    let mut wire = vec![0x17, 0x05];
    wire.extend_from_slice(b"nope!");
    assert!(c.decode("T", &wire).is_err());
}

#[test]
fn generalized_time_roundtrip() {
    let c = codec(r#"{"T": {"$type": "GeneralizedTime"}}"#);
    let mut wire = vec![0x18, 0x0f];
    wire.extend_from_slice(b"20301231235959Z");
    let v = c.decode("T", &wire).unwrap();
    assert!(matches!(v, Value::Time(_)));
    assert_eq!(c.encode("T", &v).unwrap(), wire);
}

const ANY_DOC: &str = r#"{"M": {"$type": "SEQUENCE", "$field": {
    "kind": {"$type": "ObjectDescriptor", "$id": 0},
    "body": {"$type": "ANY", "$id": 1, "$field": {
        "num": {"$type": "INTEGER", "$id": 0},
        "text": {"$type": "UTF8String", "$id": 1}
    }}
}}}"#;

#[test]
fn any_resolves_through_object_descriptor() {
    let c = codec(ANY_DOC);
    let v = map(&[
        ("kind", Value::Str("num".into())),
        ("body", map(&[("num", Value::Int(5))])),
    ]);
    let bytes = c.encode("M", &v).unwrap();
    assert_eq!(
        bytes,
        [0x30, 0x08, 0x07, 0x03, 0x6e, 0x75, 0x6d, 0x02, 0x01, 0x05]
    );
    let decoded = c.decode("M", &bytes).unwrap();
    assert_eq!(decoded.get("kind"), Some(&Value::Str("num".into())));
    // ANY output is the resolved value itself.
    assert_eq!(decoded.get("body"), Some(&Value::Int(5)));
}

#[test]
fn any_with_unknown_descriptor_names_it() {
    let c = codec(ANY_DOC);
    let wire = [0x30, 0x08, 0x07, 0x03, 0x7a, 0x7a, 0x7a, 0x02, 0x01, 0x05];
    let err = c.decode("M", &wire).unwrap_err();
    assert!(err.to_string().contains("zzz"), "error was: {err}");
}

#[test]
fn any_without_field_falls_back_to_document_types() {
    let c = codec(
        r#"{
            "Payload": {"$type": "INTEGER"},
            "M": {"$type": "SEQUENCE", "$field": {
                "kind": {"$type": "ObjectDescriptor", "$id": 0},
                "body": {"$type": "ANY", "$id": 1}
            }}
        }"#,
    );
    let wire = [
        0x30, 0x0c, 0x07, 0x07, 0x50, 0x61, 0x79, 0x6c, 0x6f, 0x61, 0x64, 0x02, 0x01, 0x09,
    ];
    let decoded = c.decode("M", &wire).unwrap();
    assert_eq!(decoded.get("body"), Some(&Value::Int(9)));
}

#[test]
fn sequence_trailing_child_rejected() {
    let c = codec(
        r#"{"S": {"$type": "SEQUENCE", "$field": {
            "a": {"$type": "BOOLEAN", "$id": 0}
        }}}"#,
    );
    let wire = [0x30, 0x06, 0x01, 0x01, 0xff, 0x02, 0x01, 0x05];
    assert!(c.decode("S", &wire).is_err());
}

#[test]
fn sequence_missing_required_field_rejected() {
    let c = codec(
        r#"{"S": {"$type": "SEQUENCE", "$field": {
            "a": {"$type": "BOOLEAN", "$id": 0},
            "b": {"$type": "INTEGER", "$id": 1}
        }}}"#,
    );
    let wire = [0x30, 0x03, 0x01, 0x01, 0xff];
    assert!(c.decode("S", &wire).is_err());
}

#[test]
fn compound_roundtrip_laws() {
    let c = codec(
        r#"{"Msg": {"$type": "SEQUENCE", "$field": {
            "n": {"$type": "INTEGER", "$id": 0},
            "s": {"$type": "UTF8String", "$id": 1},
            "flag": {"$type": "BOOLEAN", "$id": 2},
            "items": {"$type": "SEQUENCE", "$id": 3, "$of": {"$type": "INTEGER"}}
        }}}"#,
    );
    let v = map(&[
        ("n", Value::Int(-300)),
        ("s", Value::Str("héllo".into())),
        ("flag", Value::Bool(false)),
        (
            "items",
            Value::Seq(vec![Value::Int(1), Value::Int(128), Value::Int(-1)]),
        ),
    ]);
    let bytes = c.encode("Msg", &v).unwrap();
    let decoded = c.decode("Msg", &bytes).unwrap();
    assert_eq!(decoded, v);
    assert_eq!(c.encode("Msg", &decoded).unwrap(), bytes);
}

#[test]
fn integer_bounds_apply_when_present() {
    let c = codec(r#"{"X": {"$type": "INTEGER", "$min": -10, "$max": 10}}"#);
    assert!(c.encode("X", &Value::Int(11)).is_err());
    assert!(c.encode("X", &Value::Int(-11)).is_err());
    let bytes = c.encode("X", &Value::Int(-10)).unwrap();
    assert_eq!(c.decode("X", &bytes).unwrap(), Value::Int(-10));
    // Out-of-range on the wire is rejected on decode too.
    assert!(c.decode("X", &[0x02, 0x01, 0x14]).is_err());
}

#[test]
fn string_length_bounds() {
    let c = codec(r#"{"S": {"$type": "UTF8String", "$min": 2, "$max": 4}}"#);
    assert!(c.encode("S", &Value::Str("a".into())).is_err());
    assert!(c.encode("S", &Value::Str("abcde".into())).is_err());
    let bytes = c.encode("S", &Value::Str("abc".into())).unwrap();
    assert_eq!(c.decode("S", &bytes).unwrap(), Value::Str("abc".into()));
}

#[test]
fn restricted_string_characters() {
    let c = codec(r#"{"N": {"$type": "NumericString"}}"#);
    assert!(c.encode("N", &Value::Str("12 34".into())).is_ok());
    assert!(c.encode("N", &Value::Str("12a".into())).is_err());
    // Invalid character on the wire.
    let wire = [0x12, 0x03, 0x31, 0x32, 0x61];
    assert!(c.decode("N", &wire).is_err());
}

#[test]
fn real_values_roundtrip() {
    let c = codec(r#"{"R": {"$type": "REAL"}}"#);
    for v in [0.0f64, 3.25, -10.5, 1.0e10] {
        let bytes = c.encode("R", &Value::Real(v)).unwrap();
        assert_eq!(c.decode("R", &bytes).unwrap(), Value::Real(v), "value {v}");
    }
    let bytes = c.encode("R", &Value::Real(f64::INFINITY)).unwrap();
    assert_eq!(bytes, [0x09, 0x01, 0x40]);
    assert_eq!(
        c.decode("R", &bytes).unwrap(),
        Value::Real(f64::INFINITY)
    );
}

#[test]
fn enumerated_by_name() {
    let c = codec(
        r#"{"E": {"$type": "ENUMERATED", "$field": {"red": 0, "green": 1, "blue": 2}}}"#,
    );
    let bytes = c.encode("E", &Value::Str("green".into())).unwrap();
    assert_eq!(bytes, [0x0a, 0x01, 0x01]);
    assert_eq!(c.decode("E", &bytes).unwrap(), Value::Str("green".into()));
    // Unknown wire value.
    assert!(c.decode("E", &[0x0a, 0x01, 0x07]).is_err());
    // Unknown name.
    assert!(c.encode("E", &Value::Str("mauve".into())).is_err());
}
