//! The upstream message contract (`spec.md` §4.1, §6).
//!
//! One variant per message kind the dispatcher routes on. This is the
//! "host's message-iterator abstraction" called out as an external
//! collaborator in `spec.md` §1 — only the contract is specified, concretized
//! here as an owned enum so the dispatcher and its tests can be driven
//! without a real plugin host.

use crate::ir::{EventClassHandle, StreamClassHandle, StreamHandle, TraceIr};
use std::collections::BTreeMap;

/// A field value attached to an event's payload or context.
///
/// Upstream schema conformance is trusted (`spec.md` §1 Non-goals: "The sink
/// does not validate event payload values"); this tree only needs to be rich
/// enough for the translator's field classes to address into it.
#[derive(Clone, Debug)]
pub enum FieldValue {
    Bool(bool),
    UInt(u64),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<FieldValue>),
    Struct(BTreeMap<String, FieldValue>),
    /// A `Variant`/`Option` field's selected value, with its option name for
    /// variants (selector-ranges-only options carry `None`).
    Selected(Option<String>, Box<FieldValue>),
    Absent,
}

/// A clock snapshot: a monotonically non-decreasing cycle count (§GLOSSARY).
pub type ClockSnapshot = u64;

#[derive(Clone, Debug)]
pub enum Message {
    /// Carries the upstream trace's complete schema tree as of this
    /// message, standing in for the real plugin ABI's trace-IR accessors
    /// (`spec.md` §1's "message-iterator abstraction" collaborator). Only
    /// consulted by the dispatcher the first time it sees `trace.handle`;
    /// a trace's schema is immutable for the rest of its lifetime once its
    /// first stream begins, matching upstream CTF semantics.
    StreamBeginning {
        trace: TraceIr,
        stream: StreamHandle,
        stream_class: StreamClassHandle,
    },
    StreamEnd {
        stream: StreamHandle,
    },
    PacketBeginning {
        stream: StreamHandle,
        cs: Option<ClockSnapshot>,
    },
    PacketEnd {
        stream: StreamHandle,
        cs: Option<ClockSnapshot>,
    },
    Event {
        stream: StreamHandle,
        event_class: EventClassHandle,
        cs: Option<ClockSnapshot>,
        common_context: Option<FieldValue>,
        specific_context: Option<FieldValue>,
        payload: Option<FieldValue>,
    },
    DiscardedEvents {
        stream: StreamHandle,
        count: Option<u64>,
        beginning_cs: Option<ClockSnapshot>,
        end_cs: Option<ClockSnapshot>,
    },
    DiscardedPackets {
        stream: StreamHandle,
        count: Option<u64>,
        beginning_cs: Option<ClockSnapshot>,
        end_cs: Option<ClockSnapshot>,
    },
    IteratorInactivity,
}

impl Message {
    pub fn stream(&self) -> Option<StreamHandle> {
        match self {
            Message::StreamBeginning { stream, .. }
            | Message::StreamEnd { stream }
            | Message::PacketBeginning { stream, .. }
            | Message::PacketEnd { stream, .. }
            | Message::Event { stream, .. }
            | Message::DiscardedEvents { stream, .. }
            | Message::DiscardedPackets { stream, .. } => Some(*stream),
            Message::IteratorInactivity => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::StreamBeginning { .. } => "stream-beginning",
            Message::StreamEnd { .. } => "stream-end",
            Message::PacketBeginning { .. } => "packet-beginning",
            Message::PacketEnd { .. } => "packet-end",
            Message::Event { .. } => "event",
            Message::DiscardedEvents { .. } => "discarded-events",
            Message::DiscardedPackets { .. } => "discarded-packets",
            Message::IteratorInactivity => "iterator-inactivity",
        }
    }
}
