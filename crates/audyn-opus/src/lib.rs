//! Streaming interleaved-float to Ogg Opus archive writer: fixed 20ms
//! reframing, RFC 7845 header pages, and exact 48kHz-timebase granule
//! positions regardless of the encoding sample rate.

mod error;
mod head;
mod writer;

pub use error::OpusError;
pub use head::PRESKIP_48K;
pub use writer::{OpusWriter, OpusWriterConfig};
