//! The message dispatcher and per-stream state machine (C1, `spec.md` §4.1).
//!
//! [`Sink`] is the component's single externally-driven entry point: a host
//! calls [`Sink::consume`] repeatedly with batches of upstream messages, and
//! [`Sink::destroy_trace`] once the upstream signals a trace handle's
//! destruction (`spec.md` §9's "explicit finalize step" resolution of the
//! destruction-callback redesign flag — simpler to reason about than an
//! owned finalizer released on `Drop`, since metadata flushing here can
//! fail and that failure must be observable to the caller's `tracing`
//! sink before the terminal abort).

use crate::config::SinkConfig;
use crate::ctf_ir::CtfStreamClass;
use crate::error::{ConsumeStatus, SinkError};
use crate::ir::{EventClassHandle, StreamClassHandle, StreamClassIr, StreamHandle, TraceHandle, TraceIr};
use crate::message::{ClockSnapshot, FieldValue, Message};
use crate::packet_writer::PacketWriter;
use crate::stream::{
    DiscardedEventsState, DiscardedPacketsState, PacketState, PrevPacketState, Stream,
    ARTIFICIAL_PACKET_SIZE_THRESHOLD_BITS,
};
use crate::trace::Trace;
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

/// The canonical CTF packet-header magic number (`spec.md` §8 I1).
const CTF_MAGIC: u32 = 0xC1FC_1FC1;

/// Owns every currently-open `Trace`, keyed by the upstream's (weak) trace
/// handle identity (`spec.md` §3).
pub struct Sink {
    config: SinkConfig,
    traces: HashMap<TraceHandle, Trace>,
    stream_trace: HashMap<StreamHandle, TraceHandle>,
}

impl Sink {
    pub fn new(config: SinkConfig) -> Self {
        Sink {
            config,
            traces: HashMap::new(),
            stream_trace: HashMap::new(),
        }
    }

    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    /// The directory a still-open trace is being materialized in, for a
    /// driver to report on a partially-written trace after an `Error`
    /// status (`spec.md` §4.1 "Failure semantics").
    pub fn trace_dir(&self, trace: TraceHandle) -> Option<&Path> {
        self.traces.get(&trace).map(|t| t.dir.as_path())
    }

    /// Consumes one batch of upstream messages, dispatching each by kind
    /// (`spec.md` §4.1's table). Processing halts at the first message
    /// that fails; `spec.md` §6's exit statuses distinguish a resource
    /// failure (`MemoryError`) from everything else (`Error`).
    pub fn consume(&mut self, messages: &[Message]) -> ConsumeStatus {
        for message in messages {
            if let Err(e) = self.dispatch(message) {
                tracing::error!(kind = message.kind(), error = %e, "message processing failed");
                return match e {
                    SinkError::Resource(_) => ConsumeStatus::MemoryError,
                    other => ConsumeStatus::Error(other),
                };
            }
        }
        ConsumeStatus::Ok
    }

    fn dispatch(&mut self, message: &Message) -> Result<(), SinkError> {
        match message {
            Message::StreamBeginning {
                trace,
                stream,
                stream_class,
            } => self.handle_stream_beginning(trace, *stream, *stream_class),
            Message::StreamEnd { stream } => self.handle_stream_end(*stream),
            Message::PacketBeginning { stream, cs } => self.handle_packet_beginning(*stream, *cs),
            Message::PacketEnd { stream, cs } => self.handle_packet_end(*stream, *cs),
            Message::Event {
                stream,
                event_class,
                cs,
                common_context,
                specific_context,
                payload,
            } => self.handle_event(
                *stream,
                *event_class,
                *cs,
                common_context.clone(),
                specific_context.clone(),
                payload.clone(),
            ),
            Message::DiscardedEvents {
                stream,
                count,
                beginning_cs,
                end_cs,
            } => self.handle_discarded_events(*stream, *count, *beginning_cs, *end_cs),
            Message::DiscardedPackets {
                stream,
                count,
                beginning_cs,
                end_cs,
            } => self.handle_discarded_packets(*stream, *count, *beginning_cs, *end_cs),
            Message::IteratorInactivity => {
                tracing::trace!("iterator inactivity, nothing to do");
                Ok(())
            }
        }
    }

    fn trace_for_stream(&self, stream: StreamHandle) -> Result<TraceHandle, SinkError> {
        self.stream_trace.get(&stream).copied().ok_or_else(|| {
            SinkError::upstream(format!("message for stream {stream:?} with no matching stream-beginning"))
        })
    }

    fn handle_stream_beginning(
        &mut self,
        trace_ir: &TraceIr,
        stream_handle: StreamHandle,
        stream_class_handle: StreamClassHandle,
    ) -> Result<(), SinkError> {
        let trace_handle = trace_ir.handle;
        if !self.traces.contains_key(&trace_handle) {
            let trace = Trace::create(&self.config, trace_ir)?;
            self.traces.insert(trace_handle, trace);
        }
        let trace = self
            .traces
            .get_mut(&trace_handle)
            .expect("just inserted or already present");

        let stream_class_ir = trace
            .stream_class_ir(stream_class_handle)
            .cloned()
            .ok_or_else(|| {
                SinkError::upstream("stream-beginning references a stream class absent from its trace")
            })?;

        validate_stream_class(
            &stream_class_ir,
            self.config.ignore_discarded_events,
            self.config.ignore_discarded_packets,
        )?;

        let stream_class_id = trace
            .stream_class_id(stream_class_handle)
            .expect("looked up alongside stream_class_ir");
        let (file_name, instance_id) = trace.next_stream_file_name();
        let file = trace.open_stream_file(&file_name)?;
        let writer = crate::packet_writer::BitVecPacketWriter::new(file);
        let is_artificial = !stream_class_ir.supports_packets;
        let file_path = trace.dir.join(&file_name);

        let stream = Stream::new(
            stream_handle,
            stream_class_id,
            file_path,
            writer,
            is_artificial,
            instance_id,
        );
        trace.streams.insert(stream_handle, stream);
        self.stream_trace.insert(stream_handle, trace_handle);

        tracing::debug!(stream = %stream_handle, artificial = is_artificial, "stream beginning");
        Ok(())
    }

    fn handle_stream_end(&mut self, stream_handle: StreamHandle) -> Result<(), SinkError> {
        let trace_handle = self.trace_for_stream(stream_handle)?;
        let trace = self.traces.get_mut(&trace_handle).expect("tracked above");

        let stream = trace
            .streams
            .get_mut(&stream_handle)
            .ok_or_else(|| SinkError::bug("stream missing from its own trace"))?;
        if stream.is_artificially_packetized && stream.packet.is_open {
            close_packet(stream, None)?;
        }

        trace.streams.remove(&stream_handle);
        self.stream_trace.remove(&stream_handle);
        tracing::debug!(stream = %stream_handle, "stream end");
        Ok(())
    }

    fn handle_packet_beginning(
        &mut self,
        stream_handle: StreamHandle,
        cs: Option<ClockSnapshot>,
    ) -> Result<(), SinkError> {
        let trace_handle = self.trace_for_stream(stream_handle)?;
        let trace = self.traces.get_mut(&trace_handle).expect("tracked above");

        let stream_class_id = trace
            .streams
            .get(&stream_handle)
            .ok_or_else(|| SinkError::bug("stream missing from its own trace"))?
            .stream_class_id;
        let ctf_sc = trace.ctf_trace.stream_class(stream_class_id).clone();
        let trace_uuid = trace.uuid;
        let stream = trace.streams.get_mut(&stream_handle).expect("looked up moments ago");

        if stream.packet.is_open {
            return Err(SinkError::upstream(
                "packet-beginning received while a packet is already open",
            ));
        }

        if stream.discarded_packets.in_range {
            if !stream.prev_packet.seen {
                return Err(SinkError::upstream(
                    "discarded-packets range observed before any packet of this stream has closed",
                ));
            }
            if stream.discarded_packets.beginning_cs != stream.prev_packet.end_cs {
                return Err(SinkError::upstream(
                    "discarded-packets beginning clock snapshot does not match the previous packet's end",
                ));
            }
            if stream.discarded_packets.end_cs != cs {
                return Err(SinkError::upstream(
                    "discarded-packets end clock snapshot does not match the next packet's beginning",
                ));
            }
        }

        if stream.discarded_events.in_range {
            let expected_begin = if stream.prev_packet.seen {
                stream.prev_packet.end_cs
            } else {
                cs
            };
            if stream.discarded_events.beginning_cs != expected_begin {
                return Err(SinkError::upstream(
                    "discarded-events beginning clock snapshot does not match the previous packet's end",
                ));
            }
        }

        let pending_discarded_packets = if stream.discarded_packets.in_range {
            stream.discarded_packets.count
        } else {
            0
        };
        let seq_num = match stream.last_seq_num {
            None => 0,
            Some(prev) => prev + 1 + pending_discarded_packets,
        };

        open_packet(stream, &ctf_sc, trace_uuid, seq_num, cs)?;
        stream.discarded_packets = DiscardedPacketsState::default();

        tracing::debug!(stream = %stream_handle, seq_num, "packet beginning");
        Ok(())
    }

    fn handle_packet_end(
        &mut self,
        stream_handle: StreamHandle,
        cs: Option<ClockSnapshot>,
    ) -> Result<(), SinkError> {
        let trace_handle = self.trace_for_stream(stream_handle)?;
        let trace = self.traces.get_mut(&trace_handle).expect("tracked above");
        let stream = trace
            .streams
            .get_mut(&stream_handle)
            .ok_or_else(|| SinkError::bug("stream missing from its own trace"))?;

        if !stream.packet.is_open {
            return Err(SinkError::upstream("packet-end received while no packet is open"));
        }

        if stream.discarded_events.in_range {
            if stream.discarded_events.end_cs != cs {
                return Err(SinkError::upstream(
                    "discarded-events end clock snapshot does not match this packet's end",
                ));
            }
            stream.discarded_events = DiscardedEventsState::default();
        }

        close_packet(stream, cs)?;
        tracing::debug!(stream = %stream_handle, "packet end");
        Ok(())
    }

    fn handle_event(
        &mut self,
        stream_handle: StreamHandle,
        event_class_handle: EventClassHandle,
        cs: Option<ClockSnapshot>,
        common_context: Option<FieldValue>,
        specific_context: Option<FieldValue>,
        payload: Option<FieldValue>,
    ) -> Result<(), SinkError> {
        let trace_handle = self.trace_for_stream(stream_handle)?;
        let trace = self.traces.get_mut(&trace_handle).expect("tracked above");

        let stream_class_id = trace
            .streams
            .get(&stream_handle)
            .ok_or_else(|| SinkError::bug("stream missing from its own trace"))?
            .stream_class_id;
        let (event_stream_class_id, event_id) = trace
            .event_class_lookup(event_class_handle)
            .ok_or_else(|| SinkError::translation("event references an unknown event class"))?;
        if event_stream_class_id != stream_class_id {
            return Err(SinkError::upstream(
                "event's class belongs to a different stream class than the stream it was delivered on",
            ));
        }

        let ctf_sc = trace.ctf_trace.stream_class(stream_class_id).clone();
        let ctf_ec = ctf_sc
            .event_class(event_id)
            .ok_or_else(|| SinkError::bug("event class id missing from its translated stream class"))?
            .clone();
        let trace_uuid = trace.uuid;
        let stream = trace.streams.get_mut(&stream_handle).expect("looked up moments ago");

        if !stream.packet.is_open {
            if stream.is_artificially_packetized {
                let seq_num = stream.last_seq_num.map(|p| p + 1).unwrap_or(0);
                open_packet(stream, &ctf_sc, trace_uuid, seq_num, None)?;
            } else {
                return Err(SinkError::upstream(
                    "event received while no packet is open on a stream with native packets",
                ));
            }
        } else if stream.is_artificially_packetized
            && stream.writer.bits_written_in_open_packet() >= ARTIFICIAL_PACKET_SIZE_THRESHOLD_BITS
        {
            close_packet(stream, None)?;
            let seq_num = stream.last_seq_num.map(|p| p + 1).unwrap_or(0);
            open_packet(stream, &ctf_sc, trace_uuid, seq_num, None)?;
        }

        write_event(
            stream,
            &ctf_sc,
            &ctf_ec,
            cs,
            &common_context,
            &specific_context,
            &payload,
        )
    }

    fn handle_discarded_events(
        &mut self,
        stream_handle: StreamHandle,
        count: Option<u64>,
        beginning_cs: Option<ClockSnapshot>,
        end_cs: Option<ClockSnapshot>,
    ) -> Result<(), SinkError> {
        if self.config.ignore_discarded_events {
            return Ok(());
        }
        let trace_handle = self.trace_for_stream(stream_handle)?;
        let trace = self.traces.get_mut(&trace_handle).expect("tracked above");
        let stream = trace
            .streams
            .get_mut(&stream_handle)
            .ok_or_else(|| SinkError::bug("stream missing from its own trace"))?;

        if stream.packet.is_open {
            return Err(SinkError::upstream(
                "discarded-events message received while a packet is open",
            ));
        }
        if stream.discarded_events.in_range {
            return Err(SinkError::upstream(
                "contiguous discarded-events messages with no intervening packet boundary",
            ));
        }

        stream.discarded_events = DiscardedEventsState {
            in_range: true,
            beginning_cs,
            end_cs,
        };
        stream.discarded_events_total += count.unwrap_or(1);
        Ok(())
    }

    fn handle_discarded_packets(
        &mut self,
        stream_handle: StreamHandle,
        count: Option<u64>,
        beginning_cs: Option<ClockSnapshot>,
        end_cs: Option<ClockSnapshot>,
    ) -> Result<(), SinkError> {
        if self.config.ignore_discarded_packets {
            return Ok(());
        }
        let trace_handle = self.trace_for_stream(stream_handle)?;
        let trace = self.traces.get_mut(&trace_handle).expect("tracked above");
        let stream = trace
            .streams
            .get_mut(&stream_handle)
            .ok_or_else(|| SinkError::bug("stream missing from its own trace"))?;

        if stream.packet.is_open {
            return Err(SinkError::upstream(
                "discarded-packets message received while a packet is open",
            ));
        }
        if stream.discarded_packets.in_range {
            return Err(SinkError::upstream(
                "contiguous discarded-packets messages with no intervening packet boundary",
            ));
        }

        stream.discarded_packets = DiscardedPacketsState {
            in_range: true,
            beginning_cs,
            end_cs,
            count: count.unwrap_or(1),
        };
        Ok(())
    }

    fn try_destroy_trace(&mut self, trace: TraceHandle) -> Result<(), SinkError> {
        let trace_obj = self
            .traces
            .remove(&trace)
            .ok_or_else(|| SinkError::bug("destroying a trace the sink never created"))?;
        for stream_handle in trace_obj.streams.keys() {
            self.stream_trace.remove(stream_handle);
        }
        trace_obj.finalize()
    }

    /// Finalizes and drops a trace on the upstream's destruction signal.
    /// `spec.md` §4.1/§7: a metadata-write failure here is terminal, since
    /// the destruction listener has no upstream channel left to report
    /// through once the trace handle is gone.
    pub fn destroy_trace(&mut self, trace: TraceHandle) {
        if let Err(e) = self.try_destroy_trace(trace) {
            tracing::error!(error = %e, "metadata write failed during trace destruction, aborting");
            std::process::abort();
        }
    }
}

/// `spec.md` §4.1 "Stream-beginning validation": reject feature
/// combinations the sink cannot represent on disk.
fn validate_stream_class(
    sc: &StreamClassIr,
    ignore_discarded_events: bool,
    ignore_discarded_packets: bool,
) -> Result<(), SinkError> {
    if sc.supports_discarded_events && !sc.supports_packets && !ignore_discarded_events {
        return Err(SinkError::upstream(
            "stream class supports discarded events but has no packet concept",
        ));
    }
    if sc.supports_discarded_events
        && sc.discarded_events_has_ts
        && !ignore_discarded_events
        && !(sc.packets_have_ts_begin && sc.packets_have_ts_end)
    {
        return Err(SinkError::upstream(
            "stream class has discarded events with clock snapshots but packets without begin/end clock snapshots",
        ));
    }
    if sc.supports_discarded_packets
        && sc.discarded_packets_has_ts
        && !ignore_discarded_packets
        && !(sc.packets_have_ts_begin && sc.packets_have_ts_end)
    {
        return Err(SinkError::upstream(
            "stream class has discarded packets with clock snapshots but packets without begin/end clock snapshots",
        ));
    }
    Ok(())
}

/// Writes a packet header and context (`spec.md` §4.4) and opens the
/// underlying façade for event appends, recording the patch offsets that
/// `close_packet` fills in once the packet's final shape is known.
fn open_packet(
    stream: &mut Stream,
    ctf_sc: &CtfStreamClass,
    trace_uuid: Uuid,
    seq_num: u64,
    beginning_cs: Option<ClockSnapshot>,
) -> Result<(), SinkError> {
    stream.writer.open_packet()?;
    stream.writer.append_raw_uint(CTF_MAGIC as u128, 32, 8)?;
    stream.writer.append_raw_bytes(trace_uuid.as_bytes(), 8)?;
    stream.writer.append_raw_uint(ctf_sc.id as u128, 64, 8)?;
    stream.writer.append_raw_uint(stream.instance_id as u128, 64, 8)?;

    let packet_size_patch_offset = stream.writer.append_raw_uint(0, 64, 8)?;
    let content_size_patch_offset = stream.writer.append_raw_uint(0, 64, 8)?;
    if ctf_sc.packets_have_ts_begin {
        stream
            .writer
            .append_raw_uint(beginning_cs.unwrap_or(0) as u128, 64, 8)?;
    }
    let ts_end_patch_offset = if ctf_sc.packets_have_ts_end {
        Some(stream.writer.append_raw_uint(0, 64, 8)?)
    } else {
        None
    };
    if ctf_sc.has_discarded_events {
        stream
            .writer
            .append_raw_uint(stream.discarded_events_total as u128, 64, 8)?;
    }
    stream.writer.append_raw_uint(seq_num as u128, 64, 8)?;

    stream.packet = PacketState {
        is_open: true,
        beginning_cs,
        end_cs: None,
        content_bits: 0,
        total_bits: 0,
        discarded_events_counter: stream.discarded_events_total,
        seq_num,
        ts_end_patch_offset,
        packet_size_patch_offset: Some(packet_size_patch_offset),
        content_size_patch_offset: Some(content_size_patch_offset),
    };
    Ok(())
}

/// Patches `packet_size`/`content_size`/`timestamp_end` and flushes the
/// packet to disk, then updates the stream's `prev_packet`/`last_seq_num`
/// bookkeeping for the next packet boundary's validation.
fn close_packet(stream: &mut Stream, end_cs: Option<ClockSnapshot>) -> Result<(), SinkError> {
    let content_bits = stream.writer.bits_written_in_open_packet();
    let total_bits = (content_bits + 7) / 8 * 8;

    if let Some(offset) = stream.packet.packet_size_patch_offset {
        stream.writer.patch_u64(offset, total_bits);
    }
    if let Some(offset) = stream.packet.content_size_patch_offset {
        stream.writer.patch_u64(offset, content_bits);
    }
    if let Some(offset) = stream.packet.ts_end_patch_offset {
        stream.writer.patch_u64(offset, end_cs.unwrap_or(0));
    }

    stream.writer.close_packet(total_bits)?;

    stream.packet.is_open = false;
    stream.packet.end_cs = end_cs;
    stream.packet.content_bits = content_bits;
    stream.packet.total_bits = total_bits;
    stream.last_seq_num = Some(stream.packet.seq_num);
    stream.prev_packet = PrevPacketState { end_cs, seen: true };
    Ok(())
}

fn write_event(
    stream: &mut Stream,
    ctf_sc: &CtfStreamClass,
    ctf_ec: &crate::ctf_ir::CtfEventClass,
    cs: Option<ClockSnapshot>,
    common_context: &Option<FieldValue>,
    specific_context: &Option<FieldValue>,
    payload: &Option<FieldValue>,
) -> Result<(), SinkError> {
    stream.writer.append_raw_uint(ctf_ec.id as u128, 64, 8)?;
    if ctf_sc.default_clock_class.is_some() {
        stream.writer.append_raw_uint(cs.unwrap_or(0) as u128, 64, 8)?;
    }
    if let Some(fc) = &ctf_sc.common_context {
        stream
            .writer
            .append_field(fc, common_context.as_ref().unwrap_or(&FieldValue::Absent))?;
    }
    if let Some(fc) = &ctf_ec.specific_context {
        stream
            .writer
            .append_field(fc, specific_context.as_ref().unwrap_or(&FieldValue::Absent))?;
    }
    if let Some(fc) = &ctf_ec.payload {
        stream
            .writer
            .append_field(fc, payload.as_ref().unwrap_or(&FieldValue::Absent))?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::CtfVersion;
    use crate::ir::{DisplayBase, EventClassIr, FieldClassIr, Signedness, StreamClassHandle};
    use pretty_assertions::assert_eq;

    fn no_packet_stream_class(discarded_events: bool, discarded_events_has_ts: bool) -> StreamClassIr {
        StreamClassIr {
            handle: StreamClassHandle(0),
            id: 0,
            name: Some("sc".to_string()),
            default_clock_class: None,
            common_context: None,
            packet_context: None,
            event_classes: vec![EventClassIr {
                handle: EventClassHandle(0),
                id: 0,
                name: Some("ev".to_string()),
                log_level: None,
                specific_context: None,
                payload: Some(FieldClassIr::Int {
                    alignment: 8,
                    signedness: Signedness::Unsigned,
                    width: 32,
                    base: DisplayBase::Decimal,
                    mappings: Default::default(),
                }),
            }],
            supports_packets: false,
            packets_have_ts_begin: false,
            packets_have_ts_end: false,
            supports_discarded_events: discarded_events,
            discarded_events_has_ts,
            supports_discarded_packets: false,
            discarded_packets_has_ts: false,
        }
    }

    fn packeted_stream_class() -> StreamClassIr {
        StreamClassIr {
            handle: StreamClassHandle(0),
            id: 0,
            name: Some("sc".to_string()),
            default_clock_class: None,
            common_context: None,
            packet_context: None,
            event_classes: vec![],
            supports_packets: true,
            packets_have_ts_begin: true,
            packets_have_ts_end: true,
            supports_discarded_events: true,
            discarded_events_has_ts: true,
            supports_discarded_packets: true,
            discarded_packets_has_ts: false,
        }
    }

    fn trace_ir_with(sc: StreamClassIr) -> TraceIr {
        TraceIr {
            handle: TraceHandle(0),
            name: Some("t".to_string()),
            uuid: Some(Uuid::nil()),
            env: Default::default(),
            stream_classes: vec![sc],
        }
    }

    fn single_trace_config(dir: &Path) -> SinkConfig {
        SinkConfig {
            path: dir.to_path_buf(),
            assume_single_trace: true,
            ignore_discarded_events: false,
            ignore_discarded_packets: false,
            quiet: true,
            ctf_version: CtfVersion::V2,
        }
    }

    #[test]
    fn empty_stream_produces_zero_length_file_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = Sink::new(single_trace_config(dir.path()));
        let trace_ir = trace_ir_with(no_packet_stream_class(false, false));
        let stream = StreamHandle(1);

        let status = sink.consume(&[
            Message::StreamBeginning {
                trace: trace_ir.clone(),
                stream,
                stream_class: StreamClassHandle(0),
            },
            Message::StreamEnd { stream },
        ]);
        assert!(matches!(status, ConsumeStatus::Ok));

        sink.destroy_trace(trace_ir.handle);

        let stream_file = dir.path().join("stream");
        assert_eq!(std::fs::metadata(&stream_file).unwrap().len(), 0);
        assert!(dir.path().join("metadata").exists());
    }

    #[test]
    fn single_event_auto_packetizes_with_seq_num_zero() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = Sink::new(single_trace_config(dir.path()));
        let trace_ir = trace_ir_with(no_packet_stream_class(false, false));
        let stream = StreamHandle(1);

        let status = sink.consume(&[
            Message::StreamBeginning {
                trace: trace_ir.clone(),
                stream,
                stream_class: StreamClassHandle(0),
            },
            Message::Event {
                stream,
                event_class: EventClassHandle(0),
                cs: Some(100),
                common_context: None,
                specific_context: None,
                payload: Some(FieldValue::UInt(42)),
            },
            Message::StreamEnd { stream },
        ]);
        assert!(matches!(status, ConsumeStatus::Ok));

        let stream_file = dir.path().join("stream");
        let bytes = std::fs::read(&stream_file).unwrap();
        assert!(!bytes.is_empty());
        // magic + uuid + stream_id + stream_instance_id is 36 bytes of header;
        // only one packet was ever opened for this stream.
        assert_eq!(&bytes[0..4], &CTF_MAGIC.to_be_bytes());
    }

    #[test]
    fn discarded_events_range_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = Sink::new(single_trace_config(dir.path()));
        let trace_ir = trace_ir_with(packeted_stream_class());
        let stream = StreamHandle(1);

        let status = sink.consume(&[
            Message::StreamBeginning {
                trace: trace_ir.clone(),
                stream,
                stream_class: StreamClassHandle(0),
            },
            Message::PacketBeginning { stream, cs: Some(0) },
            Message::PacketEnd { stream, cs: Some(100) },
            Message::DiscardedEvents {
                stream,
                count: None,
                beginning_cs: Some(200),
                end_cs: Some(300),
            },
            Message::PacketBeginning { stream, cs: Some(100) },
        ]);
        assert!(matches!(status, ConsumeStatus::Error(SinkError::Upstream(_))));
    }

    #[test]
    fn discarded_packets_bump_the_sequence_number() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = Sink::new(single_trace_config(dir.path()));
        let trace_ir = trace_ir_with(packeted_stream_class());
        let stream = StreamHandle(1);

        let status = sink.consume(&[
            Message::StreamBeginning {
                trace: trace_ir.clone(),
                stream,
                stream_class: StreamClassHandle(0),
            },
            Message::PacketBeginning { stream, cs: Some(0) },
            Message::PacketEnd { stream, cs: Some(100) },
            Message::DiscardedPackets {
                stream,
                count: Some(3),
                beginning_cs: Some(100),
                end_cs: Some(200),
            },
            Message::PacketBeginning { stream, cs: Some(200) },
            Message::PacketEnd { stream, cs: Some(300) },
        ]);
        assert!(matches!(status, ConsumeStatus::Ok));

        let trace = sink.traces.get(&trace_ir.handle).unwrap();
        let stream_obj = trace.streams.get(&stream).unwrap();
        assert_eq!(stream_obj.last_seq_num, Some(4));
    }

    #[test]
    fn contiguous_discarded_events_messages_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = Sink::new(single_trace_config(dir.path()));
        let trace_ir = trace_ir_with(packeted_stream_class());
        let stream = StreamHandle(1);

        let status = sink.consume(&[
            Message::StreamBeginning {
                trace: trace_ir.clone(),
                stream,
                stream_class: StreamClassHandle(0),
            },
            Message::PacketBeginning { stream, cs: Some(0) },
            Message::PacketEnd { stream, cs: Some(100) },
            Message::DiscardedEvents {
                stream,
                count: None,
                beginning_cs: Some(100),
                end_cs: Some(150),
            },
            Message::DiscardedEvents {
                stream,
                count: None,
                beginning_cs: Some(150),
                end_cs: Some(200),
            },
        ]);
        assert!(matches!(status, ConsumeStatus::Error(SinkError::Upstream(_))));
    }

    #[test]
    fn stream_class_with_discarded_events_but_no_packets_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = Sink::new(single_trace_config(dir.path()));
        let trace_ir = trace_ir_with(no_packet_stream_class(true, false));
        let stream = StreamHandle(1);

        let status = sink.consume(&[Message::StreamBeginning {
            trace: trace_ir.clone(),
            stream,
            stream_class: StreamClassHandle(0),
        }]);
        assert!(matches!(status, ConsumeStatus::Error(SinkError::Upstream(_))));
    }

    #[test]
    fn ignoring_discarded_events_waives_the_no_packets_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = single_trace_config(dir.path());
        config.ignore_discarded_events = true;
        let mut sink = Sink::new(config);
        let trace_ir = trace_ir_with(no_packet_stream_class(true, false));
        let stream = StreamHandle(1);

        let status = sink.consume(&[Message::StreamBeginning {
            trace: trace_ir.clone(),
            stream,
            stream_class: StreamClassHandle(0),
        }]);
        assert!(matches!(status, ConsumeStatus::Ok));
    }
}
