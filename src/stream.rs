//! The `Stream` entity (`spec.md` §3) and its sub-state records.

use crate::ctf_ir::StreamClassId;
use crate::ir::StreamHandle;
use crate::message::ClockSnapshot;
use crate::packet_writer::BitVecPacketWriter;
use std::path::PathBuf;

pub const ARTIFICIAL_PACKET_SIZE_THRESHOLD_BITS: u64 = 4 * 1024 * 1024 * 8;

/// Per-stream open/write/close state for the currently in-progress packet.
#[derive(Clone, Debug, Default)]
pub struct PacketState {
    pub is_open: bool,
    pub beginning_cs: Option<ClockSnapshot>,
    pub end_cs: Option<ClockSnapshot>,
    pub content_bits: u64,
    pub total_bits: u64,
    pub discarded_events_counter: u64,
    pub seq_num: u64,
    /// Byte offset in the open packet's buffer where a placeholder
    /// `timestamp_end` was written, patched with the real value once the
    /// packet-end clock snapshot is known.
    pub ts_end_patch_offset: Option<usize>,
    /// Byte offsets of the `packet_size`/`content_size` placeholders,
    /// patched once the packet's final bit length is known at close.
    pub packet_size_patch_offset: Option<usize>,
    pub content_size_patch_offset: Option<usize>,
}

/// The previous packet's closing state, sentinel "absent" before the first
/// packet closes.
#[derive(Clone, Debug, Default)]
pub struct PrevPacketState {
    pub end_cs: Option<ClockSnapshot>,
    pub seen: bool,
}

#[derive(Clone, Debug, Default)]
pub struct DiscardedEventsState {
    pub in_range: bool,
    pub beginning_cs: Option<ClockSnapshot>,
    pub end_cs: Option<ClockSnapshot>,
}

#[derive(Clone, Debug, Default)]
pub struct DiscardedPacketsState {
    pub in_range: bool,
    pub beginning_cs: Option<ClockSnapshot>,
    pub end_cs: Option<ClockSnapshot>,
    /// Count pending application to the next packet's `seq_num` once the
    /// range is validated at that packet's beginning.
    pub count: u64,
}

pub struct Stream {
    pub handle: StreamHandle,
    pub stream_class_id: StreamClassId,
    pub file_path: PathBuf,
    pub writer: BitVecPacketWriter,

    pub packet: PacketState,
    pub prev_packet: PrevPacketState,
    pub discarded_events: DiscardedEventsState,
    pub discarded_packets: DiscardedPacketsState,

    /// True once this stream's packets are known not to be upstream-native
    /// (`spec.md` §4.1 "Artificial packetization").
    pub is_artificially_packetized: bool,

    /// This stream's numeric identity within its trace, assigned at
    /// creation order; doubles as the packet header's `stream_instance_id`
    /// and the stream's data-file suffix.
    pub instance_id: u64,

    /// Cumulative count of events reported lost so far, mirrored into each
    /// packet's `discarded_events_counter` (`spec.md` §8 I3).
    pub discarded_events_total: u64,

    /// The most recently closed packet's `seq_num`, `None` before the first
    /// packet closes.
    pub last_seq_num: Option<u64>,
}

impl Stream {
    pub fn new(
        handle: StreamHandle,
        stream_class_id: StreamClassId,
        file_path: PathBuf,
        writer: BitVecPacketWriter,
        is_artificially_packetized: bool,
        instance_id: u64,
    ) -> Self {
        Stream {
            handle,
            stream_class_id,
            file_path,
            writer,
            packet: PacketState::default(),
            prev_packet: PrevPacketState::default(),
            discarded_events: DiscardedEventsState::default(),
            discarded_packets: DiscardedPacketsState::default(),
            is_artificially_packetized,
            instance_id,
            discarded_events_total: 0,
            last_seq_num: None,
        }
    }
}
