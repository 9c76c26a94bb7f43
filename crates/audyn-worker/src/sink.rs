use std::path::Path;

use audyn_opus::{OpusWriter, OpusWriterConfig};
use audyn_wav::WavWriter;

use crate::error::WorkerError;

/// Output format selection plus the parameters each writer needs to open.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub suffix: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub fsync_enabled: bool,
    pub opus_bitrate: i32,
    pub opus_vbr: bool,
    pub opus_complexity: i32,
}

/// The capability the worker needs from whichever concrete writer is
/// currently open: write interleaved samples, flush, and close.
pub trait ArchiveWriter {
    fn write_frame(&mut self, interleaved: &[f32], frames: usize) -> Result<(), WorkerError>;
    fn sync(&mut self) -> Result<(), WorkerError>;
    fn close(self: Box<Self>) -> Result<(), WorkerError>;
}

pub struct WavSink(WavWriter);

impl ArchiveWriter for WavSink {
    fn write_frame(&mut self, interleaved: &[f32], _frames: usize) -> Result<(), WorkerError> {
        Ok(self.0.write(interleaved)?)
    }

    fn sync(&mut self) -> Result<(), WorkerError> {
        Ok(self.0.sync()?)
    }

    fn close(self: Box<Self>) -> Result<(), WorkerError> {
        Ok(self.0.close()?)
    }
}

pub struct OpusSink(OpusWriter);

impl ArchiveWriter for OpusSink {
    fn write_frame(&mut self, interleaved: &[f32], frames: usize) -> Result<(), WorkerError> {
        Ok(self.0.write(interleaved, frames)?)
    }

    fn sync(&mut self) -> Result<(), WorkerError> {
        Ok(self.0.sync()?)
    }

    fn close(self: Box<Self>) -> Result<(), WorkerError> {
        Ok(self.0.close()?)
    }
}

/// Opens the writer named by `config.suffix` at `path`.
pub fn open_sink(path: &Path, config: &SinkConfig) -> Result<Box<dyn ArchiveWriter>, WorkerError> {
    match config.suffix.as_str() {
        "wav" => {
            let writer = WavWriter::create(path, config.sample_rate, config.channels, config.fsync_enabled)?;
            Ok(Box::new(WavSink(writer)))
        }
        "opus" => {
            let writer = OpusWriter::create(
                path,
                OpusWriterConfig {
                    sample_rate: config.sample_rate,
                    channels: config.channels,
                    bitrate: config.opus_bitrate,
                    vbr: config.opus_vbr,
                    complexity: config.opus_complexity,
                    fsync_enabled: config.fsync_enabled,
                },
            )?;
            Ok(Box::new(OpusSink(writer)))
        }
        other => Err(WorkerError::UnknownSuffix(other.to_string())),
    }
}
