//! A CTF file-system sink.
//!
//! Materializes a stream of upstream trace messages — stream/packet
//! boundaries, events, and discarded-events/discarded-packets accounting —
//! as on-disk CTF traces, one directory per trace with LTTng-compatible
//! layout (`trace.rs`, `path.rs`). Metadata is emitted as either CTF 1.8
//! TSDL (`tsdl.rs`) or CTF 2 JSON fragments (`json_meta.rs`), selected by
//! the `ctf-version` configuration parameter (`config.rs`).
//!
//! [`dispatch::Sink`] is the crate's entry point: construct one from a
//! [`config::SinkConfig`] and drive it with [`dispatch::Sink::consume`].
#![deny(warnings, clippy::all)]

pub mod config;
pub mod ctf_ir;
pub mod dispatch;
pub mod error;
pub mod ir;
pub mod json_meta;
pub mod message;
pub mod opts;
pub mod packet_writer;
pub mod path;
pub mod prelude;
pub mod stream;
pub mod trace;
pub mod translate;
pub mod tracing;
pub mod tsdl;
