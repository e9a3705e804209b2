pub use crate::config::{Param, SinkConfig};
pub use crate::dispatch::Sink;
pub use crate::error::{ConsumeStatus, Result, SinkError};
pub use crate::ir;
pub use crate::message::Message;
pub use crate::opts::Opts;
