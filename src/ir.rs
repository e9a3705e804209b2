//! The upstream trace-IR schema tree.
//!
//! Per spec.md §1 the message-iterator abstraction and the upstream producer
//! are external collaborators; this module models just enough of their
//! shape — a read-only trace/stream-class/event-class/field-class tree plus
//! opaque handle identities — for [`crate::dispatch::Sink`] and
//! [`crate::translate`] to consume. A real plugin host would hand in
//! references into its own C-ABI-backed objects instead of these owned
//! trees; the handles are kept as separate `Copy` identities (rather than
//! e.g. indices into these very trees) because in the real system the
//! upstream objects outlive and are independent of anything the sink keeps.

use derive_more::Display;
use std::collections::BTreeMap;
use uuid::Uuid;

macro_rules! opaque_handle {
    ($name:ident) => {
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Display)]
        pub struct $name(pub u64);
    };
}

opaque_handle!(TraceHandle);
opaque_handle!(StreamHandle);
opaque_handle!(StreamClassHandle);
opaque_handle!(EventClassHandle);
opaque_handle!(ClockClassHandle);

/// An arena index identifying a node in an upstream `FieldClassIr` tree, used
/// as the non-owning back-pointer a translated `ctf_ir::FieldClass` carries
/// to its source (`spec.md` §3's "opaque back-pointer to its source IR
/// node"). Assigned by the translator as it walks the tree (§9's resolution
/// of the back-pointer-as-arena-index redesign flag).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct FieldClassId(pub u64);

/// A value in a trace's environment map (LTTng convention: string or
/// integer entries only).
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum EnvValue {
    Integer(i64),
    String(String),
}

impl EnvValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            EnvValue::String(s) => Some(s),
            EnvValue::Integer(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            EnvValue::Integer(i) => Some(*i),
            EnvValue::String(_) => None,
        }
    }
}

/// A read-only clock class as exposed by the upstream trace-IR.
#[derive(Clone, Debug)]
pub struct ClockClassIr {
    pub handle: ClockClassHandle,
    pub name: Option<String>,
    pub uid: Option<String>,
    pub description: Option<String>,
    pub frequency: u64,
    pub offset_seconds: i64,
    pub offset_cycles: u64,
    pub precision: Option<u64>,
    pub accuracy: Option<u64>,
    pub origin_is_unix_epoch: bool,
}

/// Upstream integer display base, preserved into TSDL/JSON emission.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum DisplayBase {
    Binary,
    Octal,
    Decimal,
    Hexadecimal,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Signedness {
    Unsigned,
    Signed,
}

/// Where a dependent field (a sequence length, a variant/option selector)
/// is located relative to the field that depends on it.
#[derive(Clone, Debug)]
pub struct FieldLocation {
    /// Scope the path is rooted at, for CTF 2 translation.
    pub root_scope: Scope,
    /// Path segments from the scope's root structure down to the member.
    pub path: Vec<String>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Scope {
    PacketContext,
    EventRecordCommonContext,
    EventRecordSpecificContext,
    EventRecordPayload,
}

/// The upstream field-class tree. Mirrors the variants named in spec.md §3.
#[derive(Clone, Debug)]
pub enum FieldClassIr {
    Bool {
        alignment: u64,
    },
    BitArray {
        alignment: u64,
        length: u64,
    },
    Int {
        alignment: u64,
        signedness: Signedness,
        width: u64,
        base: DisplayBase,
        mappings: BTreeMap<String, Vec<(i128, i128)>>,
    },
    Float {
        alignment: u64,
        width: FloatWidth,
    },
    String {
        alignment: u64,
    },
    Struct {
        alignment: u64,
        members: Vec<(String, FieldClassIr)>,
    },
    Array {
        alignment: u64,
        length: u64,
        element: Box<FieldClassIr>,
    },
    StaticBlob {
        alignment: u64,
        length: u64,
    },
    Sequence {
        alignment: u64,
        element: Box<FieldClassIr>,
        length_location: Option<FieldLocation>,
    },
    DynBlob {
        alignment: u64,
        length_location: Option<FieldLocation>,
    },
    Option {
        alignment: u64,
        inner: Box<FieldClassIr>,
        selector_location: Option<FieldLocation>,
        /// Integer ranges of the selector for which the option holds a value.
        selector_ranges: Option<Vec<(i128, i128)>>,
    },
    Variant {
        alignment: u64,
        options: Vec<(String, FieldClassIr)>,
        selector_location: Option<FieldLocation>,
    },
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum FloatWidth {
    Bits32,
    Bits64,
}

impl FieldClassIr {
    pub fn alignment(&self) -> u64 {
        match self {
            FieldClassIr::Bool { alignment }
            | FieldClassIr::BitArray { alignment, .. }
            | FieldClassIr::Int { alignment, .. }
            | FieldClassIr::Float { alignment, .. }
            | FieldClassIr::String { alignment }
            | FieldClassIr::Struct { alignment, .. }
            | FieldClassIr::Array { alignment, .. }
            | FieldClassIr::StaticBlob { alignment, .. }
            | FieldClassIr::Sequence { alignment, .. }
            | FieldClassIr::DynBlob { alignment, .. }
            | FieldClassIr::Option { alignment, .. }
            | FieldClassIr::Variant { alignment, .. } => *alignment,
        }
    }
}

/// Recognized log-level values (§4.4), in canonical-tag order.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum LogLevel {
    EmergencySystem,
    AlertSystem,
    CriticalSystem,
    ErrorSystem,
    WarningSystem,
    NoticeSystem,
    InfoSystem,
    DebugSystem,
    DebugProgram,
    DebugProcess,
    DebugModule,
    DebugUnit,
    DebugFunction,
    DebugLine,
    Debug,
}

impl LogLevel {
    pub fn canonical_tag(self) -> &'static str {
        use LogLevel::*;
        match self {
            EmergencySystem => "EMERGENCY",
            AlertSystem => "ALERT",
            CriticalSystem => "CRITICAL",
            ErrorSystem => "ERROR",
            WarningSystem => "WARNING",
            NoticeSystem => "NOTICE",
            InfoSystem => "INFO",
            DebugSystem => "DEBUG_SYSTEM",
            DebugProgram => "DEBUG_PROGRAM",
            DebugProcess => "DEBUG_PROCESS",
            DebugModule => "DEBUG_MODULE",
            DebugUnit => "DEBUG_UNIT",
            DebugFunction => "DEBUG_FUNCTION",
            DebugLine => "DEBUG_LINE",
            Debug => "DEBUG",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct EventClassIr {
    pub handle: EventClassHandle,
    pub id: u64,
    pub name: Option<String>,
    pub log_level: Option<LogLevel>,
    pub specific_context: Option<FieldClassIr>,
    pub payload: Option<FieldClassIr>,
}

#[derive(Clone, Debug)]
pub struct StreamClassIr {
    pub handle: StreamClassHandle,
    pub id: u64,
    pub name: Option<String>,
    pub default_clock_class: Option<ClockClassIr>,
    pub common_context: Option<FieldClassIr>,
    pub packet_context: Option<FieldClassIr>,
    pub event_classes: Vec<EventClassIr>,

    pub supports_packets: bool,
    pub packets_have_ts_begin: bool,
    pub packets_have_ts_end: bool,
    pub supports_discarded_events: bool,
    pub discarded_events_has_ts: bool,
    pub supports_discarded_packets: bool,
    pub discarded_packets_has_ts: bool,
}

impl StreamClassIr {
    pub fn event_class(&self, handle: EventClassHandle) -> Option<&EventClassIr> {
        self.event_classes.iter().find(|ec| ec.handle == handle)
    }
}

#[derive(Clone, Debug, Default)]
pub struct TraceIr {
    pub handle: TraceHandle,
    pub name: Option<String>,
    pub uuid: Option<Uuid>,
    pub env: BTreeMap<String, EnvValue>,
    pub stream_classes: Vec<StreamClassIr>,
}

impl TraceIr {
    pub fn env_str(&self, key: &str) -> Option<&str> {
        self.env.get(key).and_then(EnvValue::as_str)
    }

    pub fn env_int(&self, key: &str) -> Option<i64> {
        self.env.get(key).and_then(EnvValue::as_integer)
    }

    pub fn stream_class(&self, handle: StreamClassHandle) -> Option<&StreamClassIr> {
        self.stream_classes.iter().find(|sc| sc.handle == handle)
    }
}
