//! Trace-IR -> CTF-IR translation (C2, `spec.md` §4.2).

use crate::config::CtfVersion;
use crate::ctf_ir::{
    self, ClkClsCfg, CtfClockClass, CtfEventClass, CtfStreamClass, CtfTrace, FieldClass,
    FieldLocationStrategy,
};
use crate::error::SinkError;
use crate::ir::{self, FieldClassId, FieldClassIr, Scope, StreamClassIr, TraceIr};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// Translates one upstream trace-IR tree into its CTF-IR counterpart,
/// memoizing event-class translation so repeat events are O(1)
/// (`spec.md` §4.2 "Caching").
pub struct Translator {
    ctf_version: CtfVersion,
    clk_cls_cfg: ClkClsCfg,
    trace_uuid: Uuid,
    event_cache: HashMap<ir::EventClassHandle, CtfEventClass>,
    next_field_class_id: u64,
    synth_counter: u64,
}

impl Translator {
    pub fn new(ctf_version: CtfVersion, clk_cls_cfg: ClkClsCfg, trace_uuid: Uuid) -> Self {
        Translator {
            ctf_version,
            clk_cls_cfg,
            trace_uuid,
            event_cache: HashMap::new(),
            next_field_class_id: 0,
            synth_counter: 0,
        }
    }

    fn alloc_field_class_id(&mut self) -> FieldClassId {
        let id = FieldClassId(self.next_field_class_id);
        self.next_field_class_id += 1;
        id
    }

    fn synth_name(&mut self, member: &str, kind: &str) -> String {
        self.synth_counter += 1;
        format!("{}-{}-{}-{}", self.trace_uuid, member, kind, self.synth_counter)
    }

    pub fn translate_trace(&mut self, trace: &TraceIr) -> Result<CtfTrace, SinkError> {
        let stream_classes = trace
            .stream_classes
            .iter()
            .map(|sc| self.translate_stream_class(sc))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CtfTrace {
            name: trace.name.clone(),
            uuid: self.trace_uuid,
            env: trace.env.clone(),
            stream_classes,
        })
    }

    fn translate_clock_class(&self, clk: &ir::ClockClassIr) -> CtfClockClass {
        let origin_is_unix_epoch = self.clk_cls_cfg.force_origin_is_unix_epoch || clk.origin_is_unix_epoch;
        let offset_seconds = clk.offset_seconds + self.clk_cls_cfg.offset_sec;
        let offset_cycles_adjustment = self.clk_cls_cfg.offset_nanosec as i128 * clk.frequency as i128
            / 1_000_000_000_i128;
        let offset_cycles = (clk.offset_cycles as i128 + offset_cycles_adjustment).max(0) as u64;
        CtfClockClass {
            name: clk.name.clone(),
            uid: clk.uid.clone(),
            description: clk.description.clone().or_else(|| self.clk_cls_cfg.description.clone()),
            frequency: clk.frequency,
            offset_seconds,
            offset_cycles,
            precision: clk.precision.or(self.clk_cls_cfg.precision),
            accuracy: clk.accuracy.or(self.clk_cls_cfg.accuracy),
            origin_is_unix_epoch,
        }
    }

    fn translate_stream_class(&mut self, sc: &StreamClassIr) -> Result<CtfStreamClass, SinkError> {
        let default_clock_class = sc.default_clock_class.as_ref().map(|c| self.translate_clock_class(c));
        let common_context = sc
            .common_context
            .as_ref()
            .map(|fc| self.translate_field_class(fc, Scope::EventRecordCommonContext))
            .transpose()?;
        let packet_context = sc
            .packet_context
            .as_ref()
            .map(|fc| self.translate_field_class(fc, Scope::PacketContext))
            .transpose()?;
        let event_classes = sc
            .event_classes
            .iter()
            .map(|ec| self.translate_event_class(ec))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CtfStreamClass {
            id: sc.id,
            name: sc.name.clone(),
            default_clock_class,
            common_context,
            packet_context,
            event_classes,
            packets_have_ts_begin: sc.packets_have_ts_begin,
            packets_have_ts_end: sc.packets_have_ts_end,
            has_discarded_events: sc.supports_discarded_events,
            has_discarded_packets: sc.supports_discarded_packets,
        })
    }

    fn translate_event_class(&mut self, ec: &ir::EventClassIr) -> Result<CtfEventClass, SinkError> {
        if let Some(cached) = self.event_cache.get(&ec.handle) {
            return Ok(cached.clone());
        }
        let specific_context = ec
            .specific_context
            .as_ref()
            .map(|fc| self.translate_field_class(fc, Scope::EventRecordSpecificContext))
            .transpose()?;
        let payload = ec
            .payload
            .as_ref()
            .map(|fc| self.translate_field_class(fc, Scope::EventRecordPayload))
            .transpose()?;
        let translated = CtfEventClass {
            id: ec.id,
            name: ec.name.clone(),
            log_level_tag: ec.log_level.map(|l| l.canonical_tag()),
            specific_context,
            payload,
        };
        self.event_cache.insert(ec.handle, translated.clone());
        Ok(translated)
    }

    fn translate_location(
        &mut self,
        location: &Option<ir::FieldLocation>,
        scope: Scope,
        member_name: &str,
        kind: &str,
    ) -> Option<FieldLocationStrategy> {
        match self.ctf_version {
            CtfVersion::V1 => Some(FieldLocationStrategy::PrecedesInOrder),
            CtfVersion::V2 => {
                if let Some(loc) = location {
                    Some(FieldLocationStrategy::AbsolutePath {
                        root_scope: loc.root_scope,
                        path: loc.path.clone(),
                    })
                } else {
                    let name = self.synth_name(member_name, kind);
                    Some(FieldLocationStrategy::AbsolutePath {
                        root_scope: scope,
                        path: vec![name],
                    })
                }
            }
        }
    }

    fn translate_field_class(
        &mut self,
        fc: &FieldClassIr,
        scope: Scope,
    ) -> Result<FieldClass, SinkError> {
        let source = self.alloc_field_class_id();
        Ok(match fc {
            FieldClassIr::Bool { alignment } => FieldClass::Bool {
                alignment: *alignment,
                source,
            },
            FieldClassIr::BitArray { alignment, length } => FieldClass::BitArray {
                alignment: *alignment,
                length: *length,
                source,
            },
            FieldClassIr::Int {
                alignment,
                signedness,
                width,
                base,
                mappings,
            } => FieldClass::Int {
                alignment: *alignment,
                signedness: translate_signedness(*signedness),
                width: *width,
                base: translate_base(*base),
                mappings: mappings.clone(),
                source,
            },
            FieldClassIr::Float { alignment, width } => FieldClass::Float {
                alignment: *alignment,
                width: translate_float_width(*width),
                source,
            },
            FieldClassIr::String { alignment } => FieldClass::String {
                alignment: *alignment,
                source,
            },
            FieldClassIr::Struct { alignment, members } => {
                let mut out_members = Vec::with_capacity(members.len());
                let mut hidden_members = BTreeSet::new();
                for (name, member_fc) in members {
                    self.translate_struct_member(
                        name,
                        member_fc,
                        scope,
                        &mut out_members,
                        &mut hidden_members,
                    )?;
                }
                FieldClass::Struct {
                    alignment: *alignment,
                    members: out_members,
                    hidden_members,
                    source,
                }
            }
            FieldClassIr::Array {
                alignment,
                length,
                element,
            } => FieldClass::Array {
                alignment: *alignment,
                length: *length,
                element: Box::new(self.translate_field_class(element, scope)?),
                source,
            },
            FieldClassIr::StaticBlob { alignment, length } => FieldClass::StaticBlob {
                alignment: *alignment,
                length: *length,
                source,
            },
            FieldClassIr::Sequence {
                alignment,
                element,
                length_location,
            } => {
                let location = self.translate_location(length_location, scope, "seq", "len");
                FieldClass::Sequence {
                    alignment: *alignment,
                    element: Box::new(self.translate_field_class(element, scope)?),
                    location,
                    source,
                }
            }
            FieldClassIr::DynBlob {
                alignment,
                length_location,
            } => {
                let location = self.translate_location(length_location, scope, "blob", "len");
                FieldClass::DynBlob {
                    alignment: *alignment,
                    location,
                    source,
                }
            }
            FieldClassIr::Option {
                alignment,
                inner,
                selector_location,
                selector_ranges,
            } => {
                let location = self.translate_location(selector_location, scope, "opt", "sel");
                FieldClass::Option {
                    alignment: *alignment,
                    inner: Box::new(self.translate_field_class(inner, scope)?),
                    location,
                    selector_ranges: selector_ranges.clone(),
                    source,
                }
            }
            FieldClassIr::Variant {
                alignment,
                options,
                selector_location,
            } => {
                let location = self.translate_location(selector_location, scope, "var", "sel");
                let mut out_options = Vec::with_capacity(options.len());
                for (name, option_fc) in options {
                    out_options.push((name.clone(), self.translate_field_class(option_fc, scope)?));
                }
                FieldClass::Variant {
                    alignment: *alignment,
                    options: out_options,
                    location,
                    source,
                }
            }
        })
    }

    /// Translates one struct member, inserting a synthesized hidden
    /// length/selector sibling ahead of it when CTF 2 translation needed one
    /// and the upstream IR didn't already locate it elsewhere
    /// (`spec.md` §4.2's "the translator synthesizes a uniquely named hidden
    /// member").
    fn translate_struct_member(
        &mut self,
        name: &str,
        fc: &FieldClassIr,
        scope: Scope,
        out_members: &mut Vec<(String, FieldClass)>,
        hidden_members: &mut BTreeSet<String>,
    ) -> Result<(), SinkError> {
        let needs_synth_sibling = matches!(self.ctf_version, CtfVersion::V2)
            && match fc {
                FieldClassIr::Sequence { length_location, .. } => length_location.is_none(),
                FieldClassIr::DynBlob { length_location, .. } => length_location.is_none(),
                FieldClassIr::Option { selector_location, .. } => selector_location.is_none(),
                FieldClassIr::Variant { selector_location, .. } => selector_location.is_none(),
                _ => false,
            };

        if needs_synth_sibling {
            let kind = match fc {
                FieldClassIr::Sequence { .. } | FieldClassIr::DynBlob { .. } => "len",
                _ => "sel",
            };
            let synth_name = self.synth_name(name, kind);
            let hidden_source = self.alloc_field_class_id();
            out_members.push((
                synth_name.clone(),
                FieldClass::Int {
                    alignment: 8,
                    signedness: ctf_ir::Signedness::Unsigned,
                    width: 64,
                    base: ctf_ir::DisplayBase::Decimal,
                    mappings: Default::default(),
                    source: hidden_source,
                },
            ));
            hidden_members.insert(synth_name.clone());
            let location = Some(FieldLocationStrategy::AbsolutePath {
                root_scope: scope,
                path: vec![synth_name],
            });
            let translated = self.translate_field_class_with_location(fc, scope, location)?;
            out_members.push((name.to_string(), translated));
        } else {
            let translated = self.translate_field_class(fc, scope)?;
            out_members.push((name.to_string(), translated));
        }
        Ok(())
    }

    /// As `translate_field_class`, but overrides the resulting location
    /// rather than deriving/synthesizing one, for the case where the caller
    /// has just synthesized a sibling hidden member.
    fn translate_field_class_with_location(
        &mut self,
        fc: &FieldClassIr,
        scope: Scope,
        location: Option<FieldLocationStrategy>,
    ) -> Result<FieldClass, SinkError> {
        let mut translated = self.translate_field_class(fc, scope)?;
        match &mut translated {
            FieldClass::Sequence { location: loc, .. }
            | FieldClass::DynBlob { location: loc, .. }
            | FieldClass::Option { location: loc, .. }
            | FieldClass::Variant { location: loc, .. } => *loc = location,
            _ => {}
        }
        Ok(translated)
    }
}

fn translate_signedness(s: ir::Signedness) -> ctf_ir::Signedness {
    match s {
        ir::Signedness::Unsigned => ctf_ir::Signedness::Unsigned,
        ir::Signedness::Signed => ctf_ir::Signedness::Signed,
    }
}

fn translate_base(b: ir::DisplayBase) -> ctf_ir::DisplayBase {
    match b {
        ir::DisplayBase::Binary => ctf_ir::DisplayBase::Binary,
        ir::DisplayBase::Octal => ctf_ir::DisplayBase::Octal,
        ir::DisplayBase::Decimal => ctf_ir::DisplayBase::Decimal,
        ir::DisplayBase::Hexadecimal => ctf_ir::DisplayBase::Hexadecimal,
    }
}

fn translate_float_width(w: ir::FloatWidth) -> ctf_ir::FloatWidth {
    match w {
        ir::FloatWidth::Bits32 => ctf_ir::FloatWidth::Bits32,
        ir::FloatWidth::Bits64 => ctf_ir::FloatWidth::Bits64,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::{EventClassHandle, EventClassIr};

    fn translator() -> Translator {
        Translator::new(CtfVersion::V2, ClkClsCfg::default(), Uuid::nil())
    }

    #[test]
    fn event_class_translation_is_cached() {
        let mut t = translator();
        let ec = EventClassIr {
            handle: EventClassHandle(7),
            id: 7,
            name: Some("ev".to_string()),
            log_level: None,
            specific_context: None,
            payload: None,
        };
        let first = t.translate_event_class(&ec).unwrap();
        let second = t.translate_event_class(&ec).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(t.event_cache.len(), 1);
    }

    #[test]
    fn sequence_without_location_gets_synthesized_sibling() {
        let mut t = translator();
        let seq_member = (
            "data".to_string(),
            FieldClassIr::Sequence {
                alignment: 8,
                element: Box::new(FieldClassIr::Int {
                    alignment: 8,
                    signedness: ir::Signedness::Unsigned,
                    width: 8,
                    base: ir::DisplayBase::Decimal,
                    mappings: Default::default(),
                }),
                length_location: None,
            },
        );
        let struct_fc = FieldClassIr::Struct {
            alignment: 8,
            members: vec![seq_member],
        };
        let translated = t
            .translate_field_class(&struct_fc, Scope::EventRecordPayload)
            .unwrap();
        match translated {
            FieldClass::Struct { members, hidden_members, .. } => {
                assert_eq!(members.len(), 2);
                assert!(members[0].0.contains("-len-"));
                assert_eq!(members[1].0, "data");
                assert!(hidden_members.contains(&members[0].0));
                assert!(!hidden_members.contains(&members[1].0));
            }
            _ => panic!("expected struct"),
        }
    }

    #[test]
    fn ctf1_uses_precedes_in_order_locations() {
        let mut t = Translator::new(CtfVersion::V1, ClkClsCfg::default(), Uuid::nil());
        let seq = FieldClassIr::Sequence {
            alignment: 8,
            element: Box::new(FieldClassIr::Int {
                alignment: 8,
                signedness: ir::Signedness::Unsigned,
                width: 8,
                base: ir::DisplayBase::Decimal,
                mappings: Default::default(),
            }),
            length_location: None,
        };
        let translated = t.translate_field_class(&seq, Scope::EventRecordPayload).unwrap();
        match translated {
            FieldClass::Sequence { location, .. } => {
                assert!(matches!(location, Some(FieldLocationStrategy::PrecedesInOrder)));
            }
            _ => panic!("expected sequence"),
        }
    }
}
