use clap::Parser;
use std::path::PathBuf;

/// CLI front-end for the demonstration binary.
///
/// Stands in for the plugin host's own parameter surface (out of scope per
/// `spec.md` §1); `SinkConfig::from_params` is the library-level entry point
/// a real host would call instead of parsing argv.
#[derive(Parser, Debug, Clone)]
pub struct Opts {
    /// Base output directory for materialized CTF traces
    #[clap(long, name = "path", env = "CTF_FS_SINK_PATH")]
    pub path: PathBuf,

    /// Treat the upstream as a single trace, writing files directly in `path`
    #[clap(long)]
    pub assume_single_trace: bool,

    /// Skip discarded-events bookkeeping and validation
    #[clap(long)]
    pub ignore_discarded_events: bool,

    /// Skip discarded-packets bookkeeping and validation
    #[clap(long)]
    pub ignore_discarded_packets: bool,

    /// Suppress the "Created CTF trace" notice
    #[clap(long)]
    pub quiet: bool,

    /// Target CTF metadata version: "1"/"1.8" or "2"/"2.0"
    #[clap(long, name = "ctf-version")]
    pub ctf_version: Option<String>,
}
