//! CTF 2 JSON-fragment metadata emitter (C4, `spec.md` §4.4).
//!
//! Fragments are built as `serde_json::Value` trees (the same general
//! approach as the original's `nlohmann::json` tree construction in
//! `translate-ctf-ir-to-json.cpp`) and framed with a leading `0x1E` byte.

use crate::ctf_ir::{CtfClockClass, CtfEventClass, CtfStreamClass, CtfTrace, DisplayBase, FieldClass, FieldLocationStrategy, Signedness};
use crate::ir::{EnvValue, Scope};
use serde_json::{json, Value};

const RECORD_SEPARATOR: u8 = 0x1E;

/// Emits the full framed sequence of JSON metadata fragments for one trace.
/// `spec.md` §8 I7: every fragment starts with `0x1E`; each JSON object is
/// standalone-valid.
pub fn emit_json_fragments(trace: &CtfTrace) -> Vec<u8> {
    let mut out = Vec::new();
    push_fragment(&mut out, preamble(trace));
    push_fragment(&mut out, trace_class(trace));
    for sc in &trace.stream_classes {
        if let Some(clk) = &sc.default_clock_class {
            push_fragment(&mut out, clock_class(clk));
        }
        push_fragment(&mut out, data_stream_class(trace, sc));
        for ec in &sc.event_classes {
            push_fragment(&mut out, event_record_class(sc, ec));
        }
    }
    out
}

fn push_fragment(out: &mut Vec<u8>, value: Value) {
    out.push(RECORD_SEPARATOR);
    out.extend_from_slice(value.to_string().as_bytes());
}

fn uuid_bytes(trace: &CtfTrace) -> Vec<u8> {
    trace.uuid.as_bytes().to_vec()
}

fn env_to_json(env: &std::collections::BTreeMap<String, EnvValue>) -> Value {
    let mut map = serde_json::Map::new();
    for (key, value) in env {
        let v = match value {
            EnvValue::String(s) => Value::String(s.clone()),
            EnvValue::Integer(i) => Value::Number((*i).into()),
        };
        map.insert(key.clone(), v);
    }
    Value::Object(map)
}

fn preamble(trace: &CtfTrace) -> Value {
    json!({
        "type": "preamble",
        "version": 2,
        "uuid": uuid_bytes(trace),
        "attrs": {},
    })
}

fn packet_header_fc(trace: &CtfTrace) -> Value {
    json!({
        "type": "structure",
        "member-classes": [
            { "name": "magic", "field-class": uint_fc(32, DisplayBase::Hexadecimal), "roles": ["packet-magic-number"] },
            { "name": "uuid", "field-class": { "type": "static-blob", "length": 16 }, "roles": ["metadata-stream-uuid"] },
            { "name": "stream_id", "field-class": uint_fc(64, DisplayBase::Decimal), "roles": ["data-stream-class-id"] },
            { "name": "stream_instance_id", "field-class": uint_fc(64, DisplayBase::Decimal), "roles": ["data-stream-id"] },
        ],
        "_trace_uuid": trace.uuid.to_string(),
    })
}

fn trace_class(trace: &CtfTrace) -> Value {
    let mut v = json!({
        "type": "trace-class",
        "packet-header-fc": packet_header_fc(trace),
    });
    if !trace.env.is_empty() {
        v["environment"] = env_to_json(&trace.env);
    }
    if let Some(name) = &trace.name {
        v["name"] = Value::String(name.clone());
    }
    v
}

fn clock_class(clk: &CtfClockClass) -> Value {
    let mut v = json!({
        "type": "clock-class",
        "frequency": clk.frequency,
    });
    if let Some(name) = &clk.name {
        v["name"] = Value::String(name.clone());
    }
    if let Some(uid) = &clk.uid {
        v["uid"] = Value::String(uid.clone());
    }
    if let Some(desc) = &clk.description {
        v["description"] = Value::String(desc.clone());
    }
    if let Some(precision) = clk.precision {
        v["precision"] = Value::Number(precision.into());
    }
    if let Some(accuracy) = clk.accuracy {
        v["accuracy"] = Value::Number(accuracy.into());
    }
    if clk.offset_seconds != 0 || clk.offset_cycles != 0 {
        v["offset-from-origin"] = json!({
            "seconds": clk.offset_seconds,
            "cycles": clk.offset_cycles,
        });
    }
    if clk.origin_is_unix_epoch {
        v["origin"] = Value::String("unix-epoch".to_string());
    } else if let Some(uid) = &clk.uid {
        v["origin"] = json!({ "name": clk.name, "uid": uid });
    }
    v
}

fn uint_fc(width: u64, base: DisplayBase) -> Value {
    json!({
        "type": "fixed-length-unsigned-integer",
        "length": width,
        "preferred-display-base": display_base_str(base),
    })
}

fn display_base_str(base: DisplayBase) -> &'static str {
    match base {
        DisplayBase::Binary => "binary",
        DisplayBase::Octal => "octal",
        DisplayBase::Decimal => "decimal",
        DisplayBase::Hexadecimal => "hexadecimal",
    }
}

/// Synthesized packet-context member list, in the fixed order prescribed by
/// `spec.md` §4.4, with names prefixed by the trace uuid to avoid collision
/// with user members.
fn packet_context_members(trace: &CtfTrace, sc: &CtfStreamClass) -> Vec<Value> {
    let prefix = trace.uuid;
    let mut members = vec![
        json!({ "name": format!("{prefix}-packet_size"), "field-class": uint_fc(64, DisplayBase::Decimal), "roles": ["packet-total-length"] }),
        json!({ "name": format!("{prefix}-content_size"), "field-class": uint_fc(64, DisplayBase::Decimal), "roles": ["packet-content-length"] }),
    ];
    if sc.packets_have_ts_begin {
        members.push(json!({
            "name": format!("{prefix}-timestamp_begin"),
            "field-class": uint_fc(64, DisplayBase::Decimal),
            "roles": ["default-clock-timestamp"],
        }));
    }
    if sc.packets_have_ts_end {
        members.push(json!({
            "name": format!("{prefix}-timestamp_end"),
            "field-class": uint_fc(64, DisplayBase::Decimal),
            "roles": ["packet-end-default-clock-timestamp"],
        }));
    }
    if sc.has_discarded_events {
        members.push(json!({
            "name": format!("{prefix}-events_discarded"),
            "field-class": uint_fc(64, DisplayBase::Decimal),
            "roles": ["discarded-event-record-counter-snapshot"],
        }));
    }
    members.push(json!({
        "name": format!("{prefix}-packet_seq_num"),
        "field-class": uint_fc(64, DisplayBase::Decimal),
        "roles": ["packet-sequence-number"],
    }));
    if let Some(fc) = &sc.packet_context {
        if let FieldClass::Struct { members: user_members, hidden_members, .. } = fc {
            for (name, member_fc) in user_members {
                let mut m = json!({ "name": name, "field-class": field_class_to_json(member_fc) });
                if hidden_members.contains(name) {
                    m["attrs"] = json!({ "is-key-only": true });
                }
                members.push(m);
            }
        }
    }
    members
}

fn event_record_header_fc(sc: &CtfStreamClass) -> Value {
    let mut members = vec![json!({
        "name": "id",
        "field-class": uint_fc(64, DisplayBase::Decimal),
        "roles": ["event-record-class-id"],
    })];
    if sc.default_clock_class.is_some() {
        members.push(json!({
            "name": "timestamp",
            "field-class": uint_fc(64, DisplayBase::Decimal),
            "roles": ["default-clock-timestamp"],
        }));
    }
    json!({ "type": "structure", "member-classes": members })
}

fn data_stream_class(trace: &CtfTrace, sc: &CtfStreamClass) -> Value {
    let mut v = json!({
        "type": "data-stream-class",
        "id": sc.id,
        "packet-context-fc": { "type": "structure", "member-classes": packet_context_members(trace, sc) },
        "event-record-header-fc": event_record_header_fc(sc),
    });
    if let Some(name) = &sc.name {
        v["name"] = Value::String(name.clone());
    }
    if let Some(fc) = &sc.common_context {
        v["event-record-common-context-fc"] = field_class_to_json(fc);
    }
    v
}

fn event_record_class(sc: &CtfStreamClass, ec: &CtfEventClass) -> Value {
    let mut v = json!({
        "type": "event-record-class",
        "id": ec.id,
        "data-stream-class-id": sc.id,
    });
    if let Some(name) = &ec.name {
        v["name"] = Value::String(name.clone());
    }
    if let Some(tag) = ec.log_level_tag {
        v["attrs"] = json!({ "bt-ns": { "log-level": tag } });
    }
    if let Some(fc) = &ec.specific_context {
        v["specific-context-fc"] = field_class_to_json(fc);
    }
    if let Some(fc) = &ec.payload {
        v["payload-fc"] = field_class_to_json(fc);
    }
    v
}

fn scope_str(scope: Scope) -> &'static str {
    match scope {
        Scope::PacketContext => "packet-context",
        Scope::EventRecordCommonContext => "event-record-common-context",
        Scope::EventRecordSpecificContext => "event-record-specific-context",
        Scope::EventRecordPayload => "event-record-payload",
    }
}

fn location_json(location: &Option<FieldLocationStrategy>) -> Option<Value> {
    match location {
        Some(FieldLocationStrategy::AbsolutePath { root_scope, path }) => Some(json!({
            "origin": scope_str(*root_scope),
            "path": path,
        })),
        _ => None,
    }
}

fn field_class_to_json(fc: &FieldClass) -> Value {
    match fc {
        FieldClass::Bool { .. } => json!({ "type": "fixed-length-boolean", "length": 8 }),
        FieldClass::BitArray { length, .. } => json!({ "type": "fixed-length-bit-array", "length": length }),
        FieldClass::Int { signedness, width, base, mappings, .. } => {
            let kind = match (signedness, mappings.is_empty()) {
                (Signedness::Unsigned, true) => "fixed-length-unsigned-integer",
                (Signedness::Signed, true) => "fixed-length-signed-integer",
                (Signedness::Unsigned, false) => "fixed-length-unsigned-enumeration",
                (Signedness::Signed, false) => "fixed-length-signed-enumeration",
            };
            let mut v = json!({
                "type": kind,
                "length": width,
                "preferred-display-base": display_base_str(*base),
            });
            if !mappings.is_empty() {
                let mut mv = serde_json::Map::new();
                for (label, ranges) in mappings {
                    let ranges_json: Vec<Value> = ranges
                        .iter()
                        .map(|(s, e)| json!([s.to_string(), e.to_string()]))
                        .collect();
                    mv.insert(label.clone(), Value::Array(ranges_json));
                }
                v["mappings"] = Value::Object(mv);
            }
            v
        }
        FieldClass::Float { width, .. } => json!({
            "type": "fixed-length-floating-point-number",
            "length": match width { crate::ctf_ir::FloatWidth::Bits32 => 32, crate::ctf_ir::FloatWidth::Bits64 => 64 },
        }),
        FieldClass::String { .. } => json!({ "type": "null-terminated-string" }),
        FieldClass::Struct { members, hidden_members, .. } => {
            let member_classes: Vec<Value> = members
                .iter()
                .map(|(name, member_fc)| {
                    let mut m = json!({ "name": name, "field-class": field_class_to_json(member_fc) });
                    if hidden_members.contains(name) {
                        m["attrs"] = json!({ "is-key-only": true });
                    }
                    m
                })
                .collect();
            json!({ "type": "structure", "member-classes": member_classes })
        }
        FieldClass::Array { length, element, .. } => json!({
            "type": "static-length-array",
            "length": length,
            "element-field-class": field_class_to_json(element),
        }),
        FieldClass::StaticBlob { length, .. } => json!({ "type": "static-blob", "length": length }),
        FieldClass::Sequence { element, location, .. } => {
            let mut v = json!({
                "type": "dynamic-length-array",
                "element-field-class": field_class_to_json(element),
            });
            if let Some(loc) = location_json(location) {
                v["length-field-location"] = loc;
            }
            v
        }
        FieldClass::DynBlob { location, .. } => {
            let mut v = json!({ "type": "dynamic-blob" });
            if let Some(loc) = location_json(location) {
                v["length-field-location"] = loc;
            }
            v
        }
        FieldClass::Option { inner, location, selector_ranges, .. } => {
            let mut v = json!({
                "type": "optional",
                "field-class": field_class_to_json(inner),
            });
            if let Some(loc) = location_json(location) {
                v["selector-field-location"] = loc;
            }
            if let Some(ranges) = selector_ranges {
                v["selector-field-ranges"] = Value::Array(
                    ranges.iter().map(|(s, e)| json!([s.to_string(), e.to_string()])).collect(),
                );
            }
            v
        }
        FieldClass::Variant { options, location, .. } => {
            let option_values: Vec<Value> = options
                .iter()
                .map(|(name, option_fc)| json!({ "name": name, "field-class": field_class_to_json(option_fc) }))
                .collect();
            let mut v = json!({ "type": "variant", "options": option_values });
            if let Some(loc) = location_json(location) {
                v["selector-field-location"] = loc;
            }
            v
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ctf_ir::CtfStreamClass;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn minimal_trace() -> CtfTrace {
        CtfTrace {
            name: Some("t".to_string()),
            uuid: Uuid::nil(),
            env: BTreeMap::new(),
            stream_classes: vec![CtfStreamClass {
                id: 0,
                name: None,
                default_clock_class: None,
                common_context: None,
                packet_context: None,
                event_classes: vec![],
                packets_have_ts_begin: false,
                packets_have_ts_end: false,
                has_discarded_events: false,
                has_discarded_packets: false,
            }],
        }
    }

    #[test]
    fn every_fragment_is_record_separator_framed() {
        let bytes = emit_json_fragments(&minimal_trace());
        let mut chunks = Vec::new();
        let mut current = Vec::new();
        for &b in &bytes {
            if b == RECORD_SEPARATOR && !current.is_empty() {
                chunks.push(current.clone());
                current.clear();
            }
            if b != RECORD_SEPARATOR {
                current.push(b);
            }
        }
        if !current.is_empty() {
            chunks.push(current);
        }
        assert!(bytes.first() == Some(&RECORD_SEPARATOR));
        for chunk in chunks {
            let text = String::from_utf8(chunk).unwrap();
            let parsed: Result<Value, _> = serde_json::from_str(&text);
            assert!(parsed.is_ok(), "fragment is not standalone-valid JSON: {text}");
        }
    }

    #[test]
    fn preamble_is_first_fragment() {
        let bytes = emit_json_fragments(&minimal_trace());
        let text = String::from_utf8(bytes[1..].to_vec()).unwrap();
        let first_obj_end = text.find('\u{1e}').unwrap_or(text.len());
        let first: Value = serde_json::from_str(&text[..first_obj_end]).unwrap();
        assert_eq!(first["type"], "preamble");
    }
}
