use thiserror::Error;

/// Error taxonomy for the sink (see the spec's error-handling design).
///
/// `Bug` is reserved for internal invariant violations such a value should
/// never escape a correctly wired sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("upstream message ordering error: {0}")]
    Upstream(String),

    #[error("trace-IR to CTF-IR translation error: {0}")]
    Translation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("resource allocation error: {0}")]
    Resource(String),

    #[error("internal invariant violated: {0}")]
    Bug(String),
}

impl SinkError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        SinkError::Config(msg.into())
    }

    pub fn upstream<S: Into<String>>(msg: S) -> Self {
        SinkError::Upstream(msg.into())
    }

    pub fn translation<S: Into<String>>(msg: S) -> Self {
        SinkError::Translation(msg.into())
    }

    pub fn bug<S: Into<String>>(msg: S) -> Self {
        SinkError::Bug(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SinkError>;

/// `consume()`'s exit status (`spec.md` §6 "Exit statuses").
///
/// `MemoryError` is kept distinct from `Error` per `spec.md` §4.1 ("`MemoryError`
/// and `Error` are mapped distinctly on the interface"); in this crate it is
/// only raised for `SinkError::Resource`, since Rust's global allocator
/// otherwise aborts the process on OOM rather than returning an error.
#[derive(Debug)]
pub enum ConsumeStatus {
    Ok,
    Again,
    End,
    Error(SinkError),
    MemoryError,
}
