//! Demonstration binary wiring a synthetic upstream message source to
//! [`ctf_fs_sink::Sink`] — stands in for the plugin-host ABI that `spec.md`
//! §1 places out of scope, the same role `auxoncorp-modality-ctf-plugins`'s
//! `bin/importer.rs` plays for its library.
#![deny(warnings, clippy::all)]

use clap::Parser;
use ctf_fs_sink::ir::{
    EventClassHandle, EventClassIr, FieldClassIr, Signedness, StreamClassHandle, StreamClassIr,
    StreamHandle, TraceHandle, TraceIr,
};
use ctf_fs_sink::message::{FieldValue, Message};
use ctf_fs_sink::prelude::*;
use ctf_fs_sink::tracing::try_init_tracing_subscriber;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use uuid::Uuid;

fn main() {
    match do_main() {
        Ok(()) => (),
        Err(e) => {
            eprintln!("{e}");
            let mut cause = e.source();
            while let Some(err) = cause {
                eprintln!("Caused by: {err}");
                cause = err.source();
            }
            std::process::exit(exitcode::SOFTWARE);
        }
    }
}

fn do_main() -> Result<(), Box<dyn StdError>> {
    let opts = Opts::parse();
    try_init_tracing_subscriber()?;

    let config = SinkConfig::from(opts);
    let mut sink = Sink::new(config);

    let trace_handle = TraceHandle(1);
    let stream_handle = StreamHandle(1);
    let stream_class_handle = StreamClassHandle(1);
    let event_class_handle = EventClassHandle(1);

    let trace_ir = synthetic_trace(trace_handle, stream_class_handle, event_class_handle);

    let messages = vec![
        Message::StreamBeginning {
            trace: trace_ir.clone(),
            stream: stream_handle,
            stream_class: stream_class_handle,
        },
        Message::Event {
            stream: stream_handle,
            event_class: event_class_handle,
            cs: Some(0),
            common_context: None,
            specific_context: None,
            payload: Some(FieldValue::UInt(1)),
        },
        Message::Event {
            stream: stream_handle,
            event_class: event_class_handle,
            cs: Some(1_000_000),
            common_context: None,
            specific_context: None,
            payload: Some(FieldValue::UInt(2)),
        },
        Message::StreamEnd {
            stream: stream_handle,
        },
    ];

    match sink.consume(&messages) {
        ConsumeStatus::Ok => (),
        ConsumeStatus::Again | ConsumeStatus::End => (),
        ConsumeStatus::MemoryError => return Err("allocation failure while consuming messages".into()),
        ConsumeStatus::Error(e) => return Err(Box::new(e)),
    }

    let trace_dir = sink.trace_dir(trace_handle).map(|p| p.to_path_buf());
    sink.destroy_trace(trace_handle);
    if let Some(dir) = trace_dir {
        tracing::info!(dir = %dir.display(), "demo trace materialized");
    }

    Ok(())
}

/// A single-stream, single-event-class synthetic trace, just rich enough to
/// exercise the full dispatch -> translate -> emit pipeline end to end.
fn synthetic_trace(
    trace_handle: TraceHandle,
    stream_class_handle: StreamClassHandle,
    event_class_handle: EventClassHandle,
) -> TraceIr {
    let event_class = EventClassIr {
        handle: event_class_handle,
        id: 0,
        name: Some("demo_event".to_string()),
        log_level: None,
        specific_context: None,
        payload: Some(FieldClassIr::Int {
            alignment: 8,
            signedness: Signedness::Unsigned,
            width: 32,
            base: ctf_fs_sink::ir::DisplayBase::Decimal,
            mappings: Default::default(),
        }),
    };

    let stream_class = StreamClassIr {
        handle: stream_class_handle,
        id: 0,
        name: Some("demo_stream".to_string()),
        default_clock_class: Some(ctf_fs_sink::ir::ClockClassIr {
            handle: ctf_fs_sink::ir::ClockClassHandle(1),
            name: Some("monotonic".to_string()),
            uid: None,
            description: None,
            frequency: 1_000_000_000,
            offset_seconds: 0,
            offset_cycles: 0,
            precision: None,
            accuracy: None,
            origin_is_unix_epoch: false,
        }),
        common_context: None,
        packet_context: None,
        event_classes: vec![event_class],
        supports_packets: false,
        packets_have_ts_begin: false,
        packets_have_ts_end: false,
        supports_discarded_events: false,
        discarded_events_has_ts: false,
        supports_discarded_packets: false,
        discarded_packets_has_ts: false,
    };

    TraceIr {
        handle: trace_handle,
        name: Some("demo".to_string()),
        uuid: Some(Uuid::new_v4()),
        env: BTreeMap::new(),
        stream_classes: vec![stream_class],
    }
}
