//! The archive worker: pops frames from the shared queue, rotates output
//! files on policy boundaries, and writes them through a WAV or Opus sink,
//! synthesizing silence through sustained input stalls.

mod error;
mod sink;
mod worker;

pub use error::WorkerError;
pub use sink::{open_sink, ArchiveWriter, SinkConfig};
pub use worker::{Worker, WorkerState, WorkerStats};
