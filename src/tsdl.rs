//! TSDL (CTF 1.8) metadata emitter (C3, `spec.md` §4.3).

use crate::ctf_ir::{CtfClockClass, CtfEventClass, CtfStreamClass, CtfTrace, DisplayBase, FieldClass, Signedness};
use std::fmt::Write as _;

/// Emits a single TSDL text blob. Order: the `/* CTF 1.8 */` marker, the
/// standard integer typealiases (declared before any bare `uintN_t`/`intN_t`
/// use, including the trace preamble's own `packet.header`), the trace
/// preamble, trace environment, clock classes, then each stream class
/// followed by its event classes. Always ends with a trailing newline.
pub fn emit_tsdl(trace: &CtfTrace) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "/* CTF 1.8 */");
    emit_typealiases(&mut out);
    emit_preamble(&mut out, trace);
    emit_env(&mut out, trace);
    for sc in &trace.stream_classes {
        if let Some(clk) = &sc.default_clock_class {
            emit_clock_class(&mut out, clk);
        }
    }
    for sc in &trace.stream_classes {
        emit_stream_class(&mut out, sc);
        for ec in &sc.event_classes {
            emit_event_class(&mut out, sc, ec);
        }
    }
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn emit_preamble(out: &mut String, trace: &CtfTrace) {
    let _ = writeln!(out, "trace {{");
    let _ = writeln!(out, "    major = 1;");
    let _ = writeln!(out, "    minor = 8;");
    let _ = writeln!(out, "    uuid = \"{}\";", trace.uuid);
    let _ = writeln!(out, "    byte_order = be;");
    let _ = writeln!(out, "    packet.header := struct {{");
    let _ = writeln!(out, "        uint32_t magic;");
    let _ = writeln!(out, "        uint8_t  uuid[16];");
    let _ = writeln!(out, "        uint64_t stream_id;");
    let _ = writeln!(out, "        uint64_t stream_instance_id;");
    let _ = writeln!(out, "    }};");
    let _ = writeln!(out, "}};");
    let _ = writeln!(out);
}

/// The standard byte/halfword/word/doubleword typealiases TSDL readers
/// (LTTng/babeltrace) expect declared before any bare `uintN_t`/`intN_t`
/// reference — `packet.header`, `event.header`, and `int_type_name`'s
/// typealias-name fast path all rely on these being in scope.
fn emit_typealiases(out: &mut String) {
    for width in [8u64, 16, 32, 64] {
        let _ = writeln!(
            out,
            "typealias integer {{ size = {width}; align = 8; signed = false; base = d; byte_order = be; }} := uint{width}_t;"
        );
        let _ = writeln!(
            out,
            "typealias integer {{ size = {width}; align = 8; signed = true; base = d; byte_order = be; }} := int{width}_t;"
        );
    }
    let _ = writeln!(out);
}

fn emit_env(out: &mut String, trace: &CtfTrace) {
    if trace.env.is_empty() {
        return;
    }
    let _ = writeln!(out, "env {{");
    for (key, value) in &trace.env {
        match value {
            crate::ir::EnvValue::String(s) => {
                let _ = writeln!(out, "    {key} = \"{}\";", escape_tsdl_string(s));
            }
            crate::ir::EnvValue::Integer(i) => {
                let _ = writeln!(out, "    {key} = {i};");
            }
        }
    }
    let _ = writeln!(out, "}};");
    let _ = writeln!(out);
}

fn emit_clock_class(out: &mut String, clk: &CtfClockClass) {
    let _ = writeln!(out, "clock {{");
    if let Some(name) = &clk.name {
        let _ = writeln!(out, "    name = {name};");
    }
    if let Some(uid) = &clk.uid {
        let _ = writeln!(out, "    uuid = \"{uid}\";");
    }
    if let Some(desc) = &clk.description {
        let _ = writeln!(out, "    description = \"{}\";", escape_tsdl_string(desc));
    }
    let _ = writeln!(out, "    freq = {};", clk.frequency);
    if let Some(precision) = clk.precision {
        let _ = writeln!(out, "    precision = {precision};");
    }
    if clk.offset_seconds != 0 {
        let _ = writeln!(out, "    offset_s = {};", clk.offset_seconds);
    }
    if clk.offset_cycles != 0 {
        let _ = writeln!(out, "    offset = {};", clk.offset_cycles);
    }
    let _ = writeln!(out, "    absolute = {};", clk.origin_is_unix_epoch);
    let _ = writeln!(out, "}};");
    let _ = writeln!(out);
}

fn emit_stream_class(out: &mut String, sc: &CtfStreamClass) {
    let _ = writeln!(out, "stream {{");
    let _ = writeln!(out, "    id = {};", sc.id);
    if let Some(name) = &sc.name {
        let _ = writeln!(out, "    /* name: {name} */");
    }
    let _ = writeln!(out, "    event.header := struct {{");
    let _ = writeln!(out, "        uint64_t id;");
    if sc.default_clock_class.is_some() {
        let _ = writeln!(out, "        uint64_t timestamp;");
    }
    let _ = writeln!(out, "    }};");
    if let Some(fc) = &sc.packet_context {
        let _ = writeln!(out, "    packet.context := {};", render_field_class(fc, 4));
    }
    if let Some(fc) = &sc.common_context {
        let _ = writeln!(out, "    event.context := {};", render_field_class(fc, 4));
    }
    let _ = writeln!(out, "}};");
    let _ = writeln!(out);
}

fn emit_event_class(out: &mut String, sc: &CtfStreamClass, ec: &CtfEventClass) {
    let _ = writeln!(out, "event {{");
    let _ = writeln!(out, "    id = {};", ec.id);
    if let Some(name) = &ec.name {
        let _ = writeln!(out, "    name = \"{}\";", escape_tsdl_string(name));
    }
    let _ = writeln!(out, "    stream_id = {};", sc.id);
    if let Some(tag) = ec.log_level_tag {
        let _ = writeln!(out, "    loglevel = \"{tag}\";");
    }
    if let Some(fc) = &ec.specific_context {
        let _ = writeln!(out, "    context := {};", render_field_class(fc, 4));
    }
    if let Some(fc) = &ec.payload {
        let _ = writeln!(out, "    fields := {};", render_field_class(fc, 4));
    }
    let _ = writeln!(out, "}};");
    let _ = writeln!(out);
}

/// Names a TSDL integer type. Uses the bare `uint{width}_t`/`int{width}_t`
/// typealias (declared by `emit_typealiases`) when the field matches its
/// fixed shape (align 8, decimal base, a standard width); otherwise emits a
/// fully self-contained inline `integer {{ ... }}` carrying every attribute
/// `spec.md` §4.3 requires.
fn int_type_name(signedness: Signedness, width: u64, alignment: u64, base: DisplayBase) -> String {
    let sign = match signedness {
        Signedness::Unsigned => "uint",
        Signedness::Signed => "int",
    };
    if alignment == 8 && base == DisplayBase::Decimal && matches!(width, 8 | 16 | 32 | 64) {
        return format!("{sign}{width}_t");
    }
    let base_str = match base {
        DisplayBase::Binary => "b",
        DisplayBase::Octal => "o",
        DisplayBase::Decimal => "d",
        DisplayBase::Hexadecimal => "x",
    };
    format!(
        "integer {{ size = {width}; align = {alignment}; signed = {signed}; base = {base_str}; byte_order = be; }}",
        signed = matches!(signedness, Signedness::Signed)
    )
}

fn render_field_class(fc: &FieldClass, indent: usize) -> String {
    let pad = " ".repeat(indent);
    match fc {
        FieldClass::Bool { .. } => "struct { uint8_t v; }".to_string(),
        FieldClass::BitArray { length, .. } => format!("integer {{ size = {length}; }}"),
        FieldClass::Int {
            signedness,
            width,
            alignment,
            base,
            mappings,
            ..
        } => {
            if mappings.is_empty() {
                int_type_name(*signedness, *width, *alignment, *base)
            } else {
                let mut s = format!(
                    "enum : {} {{ ",
                    int_type_name(*signedness, *width, *alignment, DisplayBase::Decimal)
                );
                for (label, ranges) in mappings {
                    for (start, end) in ranges {
                        if start == end {
                            let _ = write!(s, "{label} = {start}, ");
                        } else {
                            let _ = write!(s, "{label} = {start} ... {end}, ");
                        }
                    }
                }
                s.push('}');
                s
            }
        }
        FieldClass::Float { width, .. } => match width {
            crate::ctf_ir::FloatWidth::Bits32 => "float".to_string(),
            crate::ctf_ir::FloatWidth::Bits64 => "double".to_string(),
        },
        FieldClass::String { .. } => "string".to_string(),
        FieldClass::Struct { members, .. } => {
            let mut s = String::from("struct {\n");
            for (name, member_fc) in members {
                let _ = writeln!(
                    s,
                    "{pad}    {} {name};",
                    render_field_class(member_fc, indent + 4)
                );
            }
            let _ = write!(s, "{pad}}}");
            s
        }
        FieldClass::Array { length, element, .. } => {
            format!("{}[{length}]", render_field_class(element, indent))
        }
        FieldClass::StaticBlob { length, .. } => format!("uint8_t[{length}]"),
        FieldClass::Sequence { element, .. } => {
            format!("{} *", render_field_class(element, indent))
        }
        FieldClass::DynBlob { .. } => "uint8_t *".to_string(),
        FieldClass::Option { inner, .. } => render_field_class(inner, indent),
        FieldClass::Variant { options, .. } => {
            let mut s = String::from("variant {\n");
            for (name, option_fc) in options {
                let _ = writeln!(
                    s,
                    "{pad}    {} {name};",
                    render_field_class(option_fc, indent + 4)
                );
            }
            let _ = write!(s, "{pad}}}");
            s
        }
    }
}

fn escape_tsdl_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::FieldClassId;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn minimal_trace() -> CtfTrace {
        CtfTrace {
            name: Some("t".to_string()),
            uuid: Uuid::nil(),
            env: BTreeMap::new(),
            stream_classes: vec![CtfStreamClass {
                id: 0,
                name: Some("sc0".to_string()),
                default_clock_class: None,
                common_context: None,
                packet_context: None,
                event_classes: vec![CtfEventClass {
                    id: 0,
                    name: Some("ev0".to_string()),
                    log_level_tag: None,
                    specific_context: None,
                    payload: Some(FieldClass::Int {
                        alignment: 8,
                        signedness: Signedness::Unsigned,
                        width: 32,
                        base: DisplayBase::Decimal,
                        mappings: BTreeMap::new(),
                        source: FieldClassId(0),
                    }),
                }],
            }],
        }
    }

    #[test]
    fn emits_trailing_newline() {
        let tsdl = emit_tsdl(&minimal_trace());
        assert!(tsdl.ends_with('\n'));
    }

    #[test]
    fn emits_preamble_and_event() {
        let tsdl = emit_tsdl(&minimal_trace());
        assert!(tsdl.contains("trace {"));
        assert!(tsdl.contains("name = \"ev0\";"));
        assert!(tsdl.contains("stream_id = 0;"));
    }

    #[test]
    fn byte_order_is_concrete_not_native() {
        let tsdl = emit_tsdl(&minimal_trace());
        assert!(tsdl.contains("byte_order = be;"));
        assert!(!tsdl.contains("byte_order = native;"));
    }

    #[test]
    fn declares_typealiases_before_use() {
        let tsdl = emit_tsdl(&minimal_trace());
        let typealias_pos = tsdl.find("typealias integer").expect("typealias block");
        let first_use_pos = tsdl.find("uint32_t magic;").expect("packet.header use");
        assert!(typealias_pos < first_use_pos);
        assert!(tsdl.contains("} := uint64_t;"));
        assert!(tsdl.contains("} := int64_t;"));
    }

    #[test]
    fn non_standard_int_renders_inline_with_align_and_byte_order() {
        let fc = FieldClass::Int {
            alignment: 1,
            signedness: Signedness::Unsigned,
            width: 3,
            base: DisplayBase::Decimal,
            mappings: BTreeMap::new(),
            source: FieldClassId(0),
        };
        let rendered = render_field_class(&fc, 0);
        assert!(rendered.contains("align = 1;"));
        assert!(rendered.contains("byte_order = be;"));
        assert!(rendered.contains("size = 3;"));
    }
}
