//! The `Trace` entity (`spec.md` §3): owns a trace's output directory,
//! metadata path, streams, and translated CTF-IR, and is responsible for
//! the atomic metadata flush on destruction.

use crate::config::{CtfVersion, SinkConfig};
use crate::ctf_ir::{CtfTrace, StreamClassId};
use crate::error::SinkError;
use crate::ir::{EventClassHandle, StreamClassHandle, StreamClassIr, StreamHandle, TraceIr};
use crate::json_meta;
use crate::path;
use crate::stream::Stream;
use crate::translate::Translator;
use crate::tsdl;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::PathBuf;
use uuid::Uuid;

pub struct Trace {
    pub dir: PathBuf,
    pub metadata_path: PathBuf,
    pub uuid: Uuid,
    pub ctf_trace: CtfTrace,
    pub streams: BTreeMap<StreamHandle, Stream>,
    /// Upstream stream-class definitions, kept alongside their translated
    /// `ctf_ir::CtfStreamClass` counterpart so the dispatcher can validate
    /// stream-beginning feature combinations (`spec.md` §4.1) against the
    /// original IR while emission uses the translated tree.
    stream_class_irs: HashMap<StreamClassHandle, (StreamClassIr, StreamClassId)>,
    /// Maps an upstream event-class handle to its owning stream class and
    /// translated numeric id, so the dispatcher can resolve an `Event`
    /// message's `event_class` handle into the right `CtfEventClass`.
    event_class_index: HashMap<EventClassHandle, (StreamClassId, u64)>,
    ctf_version: CtfVersion,
    quiet: bool,
    next_stream_seq: u64,
}

impl Trace {
    /// Creates the trace's output directory (C5) and translates its CTF-IR
    /// (C2) up front, per `spec.md` §4.2's input contract (a whole trace's
    /// stream-class/event-class tree is translated once the trace is known).
    pub fn create(config: &SinkConfig, trace_ir: &TraceIr) -> Result<Self, SinkError> {
        let dir = path::make_trace_path(&config.path, trace_ir, config.assume_single_trace)?;
        let metadata_path = dir.join("metadata");

        let trace_uuid = trace_ir.uuid.unwrap_or_else(Uuid::new_v4);
        let mut translator =
            Translator::new(config.ctf_version, Default::default(), trace_uuid);
        let ctf_trace = translator.translate_trace(trace_ir)?;

        let mut stream_class_irs = HashMap::new();
        let mut event_class_index = HashMap::new();
        for (i, sc) in trace_ir.stream_classes.iter().enumerate() {
            let sc_id = StreamClassId(i);
            stream_class_irs.insert(sc.handle, (sc.clone(), sc_id));
            for ec in &sc.event_classes {
                event_class_index.insert(ec.handle, (sc_id, ec.id));
            }
        }

        tracing::debug!(dir = %dir.display(), "created trace directory");

        Ok(Trace {
            dir,
            metadata_path,
            uuid: trace_uuid,
            ctf_trace,
            streams: BTreeMap::new(),
            stream_class_irs,
            event_class_index,
            ctf_version: config.ctf_version,
            quiet: config.quiet,
            next_stream_seq: 0,
        })
    }

    pub fn stream_class_ir(&self, handle: StreamClassHandle) -> Option<&StreamClassIr> {
        self.stream_class_irs.get(&handle).map(|(ir, _)| ir)
    }

    pub fn stream_class_id(&self, handle: StreamClassHandle) -> Option<StreamClassId> {
        self.stream_class_irs.get(&handle).map(|(_, id)| *id)
    }

    pub fn event_class_lookup(&self, handle: EventClassHandle) -> Option<(StreamClassId, u64)> {
        self.event_class_index.get(&handle).copied()
    }

    /// Allocates the next stream's data-file name and numeric instance id
    /// (the same sequence number serves both, per `trace.rs`'s file-naming
    /// convention).
    pub fn next_stream_file_name(&mut self) -> (String, u64) {
        let seq = self.next_stream_seq;
        self.next_stream_seq += 1;
        let name = if seq == 0 {
            "stream".to_string()
        } else {
            format!("stream_{seq}")
        };
        (name, seq)
    }

    pub fn open_stream_file(&self, file_name: &str) -> Result<File, SinkError> {
        let path = self.dir.join(file_name);
        File::create(path).map_err(SinkError::from)
    }

    /// Writes the metadata file atomically (write to a sibling temp file,
    /// then rename) and, unless `quiet`, prints the acknowledgement line.
    /// Per `spec.md` §4.1/§7, a failure here during trace destruction is
    /// terminal: the caller is expected to abort the process.
    pub fn finalize(&self) -> Result<(), SinkError> {
        let bytes = match self.ctf_version {
            CtfVersion::V1 => tsdl::emit_tsdl(&self.ctf_trace).into_bytes(),
            CtfVersion::V2 => json_meta::emit_json_fragments(&self.ctf_trace),
        };

        let tmp_path = self.metadata_path.with_extension("tmp");
        std::fs::write(&tmp_path, &bytes)?;
        std::fs::rename(&tmp_path, &self.metadata_path)?;

        if !self.quiet {
            println!("Created CTF trace '{}'.", self.dir.display());
        }
        Ok(())
    }
}
