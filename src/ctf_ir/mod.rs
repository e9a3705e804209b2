//! The CTF-IR tree (`spec.md` §3), the translator's (C2) output consumed by
//! the TSDL (C3) and JSON-fragment (C4) emitters.
//!
//! Ownership is strictly tree-shaped: a `CtfTrace` owns its `CtfStreamClass`es,
//! which own their `CtfEventClass`es and `FieldClass` trees. The one
//! back-reference in the model — a `Stream`'s reference to its
//! `CtfStreamClass` — is therefore non-owning and expressed as an index
//! (`StreamClassId`) into `CtfTrace::stream_classes` rather than a shared
//! pointer, per the §9 "cyclic ownership risk" redesign flag.

use crate::ir::FieldClassId;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Index into `CtfTrace::stream_classes`. Non-owning; valid only as long as
/// the owning `CtfTrace` is alive, matching the documented lifetime bound
/// from §9.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct StreamClassId(pub usize);

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Signedness {
    Unsigned,
    Signed,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum DisplayBase {
    Binary,
    Octal,
    Decimal,
    Hexadecimal,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum FloatWidth {
    Bits32,
    Bits64,
}

/// Where a dependent member (a sequence length, a variant/option selector)
/// is addressed from, per target CTF version.
#[derive(Clone, Debug)]
pub enum FieldLocationStrategy {
    /// CTF 1: no in-band locations; the dependent member is guaranteed to
    /// precede its dependee in emission order (`spec.md` §4.2).
    PrecedesInOrder,
    /// CTF 2: an absolute path rooted at a named scope.
    AbsolutePath {
        root_scope: crate::ir::Scope,
        path: Vec<String>,
    },
}

/// A single CTF-IR field class node. One variant per kind named in
/// `spec.md` §3, each carrying only its own fields, plus a non-owning
/// back-pointer to the upstream IR node it was translated from.
#[derive(Clone, Debug)]
pub enum FieldClass {
    Bool {
        alignment: u64,
        source: FieldClassId,
    },
    BitArray {
        alignment: u64,
        length: u64,
        source: FieldClassId,
    },
    Int {
        alignment: u64,
        signedness: Signedness,
        width: u64,
        base: DisplayBase,
        mappings: BTreeMap<String, Vec<(i128, i128)>>,
        source: FieldClassId,
    },
    Float {
        alignment: u64,
        width: FloatWidth,
        source: FieldClassId,
    },
    String {
        alignment: u64,
        source: FieldClassId,
    },
    Struct {
        alignment: u64,
        members: Vec<(String, FieldClass)>,
        /// Names of `members` synthesized by the translator (a hidden
        /// length/selector sibling with no upstream counterpart), rendered
        /// with `is-key-only=true` in CTF 2 JSON metadata (`spec.md` §4.2).
        hidden_members: BTreeSet<String>,
        source: FieldClassId,
    },
    Array {
        alignment: u64,
        length: u64,
        element: Box<FieldClass>,
        source: FieldClassId,
    },
    StaticBlob {
        alignment: u64,
        length: u64,
        source: FieldClassId,
    },
    Sequence {
        alignment: u64,
        element: Box<FieldClass>,
        location: Option<FieldLocationStrategy>,
        source: FieldClassId,
    },
    DynBlob {
        alignment: u64,
        location: Option<FieldLocationStrategy>,
        source: FieldClassId,
    },
    Option {
        alignment: u64,
        inner: Box<FieldClass>,
        location: Option<FieldLocationStrategy>,
        selector_ranges: Option<Vec<(i128, i128)>>,
        source: FieldClassId,
    },
    Variant {
        alignment: u64,
        options: Vec<(String, FieldClass)>,
        location: Option<FieldLocationStrategy>,
        source: FieldClassId,
    },
}

impl FieldClass {
    pub fn alignment(&self) -> u64 {
        match self {
            FieldClass::Bool { alignment, .. }
            | FieldClass::BitArray { alignment, .. }
            | FieldClass::Int { alignment, .. }
            | FieldClass::Float { alignment, .. }
            | FieldClass::String { alignment, .. }
            | FieldClass::Struct { alignment, .. }
            | FieldClass::Array { alignment, .. }
            | FieldClass::StaticBlob { alignment, .. }
            | FieldClass::Sequence { alignment, .. }
            | FieldClass::DynBlob { alignment, .. }
            | FieldClass::Option { alignment, .. }
            | FieldClass::Variant { alignment, .. } => *alignment,
        }
    }

    pub fn source(&self) -> FieldClassId {
        match self {
            FieldClass::Bool { source, .. }
            | FieldClass::BitArray { source, .. }
            | FieldClass::Int { source, .. }
            | FieldClass::Float { source, .. }
            | FieldClass::String { source, .. }
            | FieldClass::Struct { source, .. }
            | FieldClass::Array { source, .. }
            | FieldClass::StaticBlob { source, .. }
            | FieldClass::Sequence { source, .. }
            | FieldClass::DynBlob { source, .. }
            | FieldClass::Option { source, .. }
            | FieldClass::Variant { source, .. } => *source,
        }
    }
}

/// Clock-class offset/origin override knobs (`spec.md` §3's `ClkClsCfg`),
/// mirroring the teacher's `ImportConfig` clock-class parameters.
/// [SUPPLEMENT] `precision`/`accuracy`/`description` per SPEC_FULL.md §3.
#[derive(Clone, Debug, Default)]
pub struct ClkClsCfg {
    pub offset_sec: i64,
    pub offset_nanosec: i64,
    pub force_origin_is_unix_epoch: bool,
    pub precision: Option<u64>,
    pub accuracy: Option<u64>,
    pub description: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CtfClockClass {
    pub name: Option<String>,
    pub uid: Option<String>,
    pub description: Option<String>,
    pub frequency: u64,
    /// Offset from origin as (seconds, cycles); emitted only if non-zero
    /// (`spec.md` §4.2 "Numeric semantics").
    pub offset_seconds: i64,
    pub offset_cycles: u64,
    pub precision: Option<u64>,
    pub accuracy: Option<u64>,
    /// `true` if origin is "unix-epoch"; `false` with a named/uid origin if
    /// known, or fully unspecified otherwise.
    pub origin_is_unix_epoch: bool,
}

#[derive(Clone, Debug)]
pub struct CtfEventClass {
    pub id: u64,
    pub name: Option<String>,
    pub log_level_tag: Option<&'static str>,
    pub specific_context: Option<FieldClass>,
    pub payload: Option<FieldClass>,
}

#[derive(Clone, Debug)]
pub struct CtfStreamClass {
    pub id: u64,
    pub name: Option<String>,
    pub default_clock_class: Option<CtfClockClass>,
    pub common_context: Option<FieldClass>,
    pub packet_context: Option<FieldClass>,
    pub event_classes: Vec<CtfEventClass>,

    pub packets_have_ts_begin: bool,
    pub packets_have_ts_end: bool,
    pub has_discarded_events: bool,
    pub has_discarded_packets: bool,
}

impl CtfStreamClass {
    pub fn event_class(&self, id: u64) -> Option<&CtfEventClass> {
        self.event_classes.iter().find(|ec| ec.id == id)
    }
}

#[derive(Clone, Debug)]
pub struct CtfTrace {
    pub name: Option<String>,
    pub uuid: Uuid,
    pub env: BTreeMap<String, crate::ir::EnvValue>,
    pub stream_classes: Vec<CtfStreamClass>,
}

impl CtfTrace {
    pub fn stream_class(&self, id: StreamClassId) -> &CtfStreamClass {
        &self.stream_classes[id.0]
    }

    pub fn stream_class_mut(&mut self, id: StreamClassId) -> &mut CtfStreamClass {
        &mut self.stream_classes[id.0]
    }
}
