use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::WavError;

const HEADER_LEN: u64 = 44;
const CHUNK_SAMPLES: usize = 4096;
/// `u32::MAX - 36`: the largest `data` chunk size whose RIFF size
/// (`36 + data_size`) still fits in a `u32`.
const MAX_DATA_SIZE: u64 = u32::MAX as u64 - 36;

/// Streaming PCM16 RIFF/WAVE writer. Writes a placeholder header on open,
/// streams samples through a bounded stack buffer, and patches the RIFF and
/// `data` chunk sizes on close.
pub struct WavWriter {
    file: BufWriter<File>,
    sample_rate: u32,
    channels: u16,
    bytes_written: u64,
    fsync_enabled: bool,
    closed: bool,
}

impl WavWriter {
    pub fn create(
        path: impl AsRef<Path>,
        sample_rate: u32,
        channels: u16,
        fsync_enabled: bool,
    ) -> Result<Self, WavError> {
        if !(1..=384_000).contains(&sample_rate) {
            return Err(WavError::ConfigInvalid(format!(
                "sample rate {sample_rate} out of range 1..=384000"
            )));
        }
        if !(1..=32).contains(&channels) {
            return Err(WavError::ConfigInvalid(format!(
                "channel count {channels} out of range 1..=32"
            )));
        }

        let file = File::create(path)?;
        let mut file = BufWriter::new(file);
        write_header(&mut file, sample_rate, channels, 0)?;

        Ok(Self {
            file,
            sample_rate,
            channels,
            bytes_written: 0,
            fsync_enabled,
            closed: false,
        })
    }

    /// Writes interleaved float samples, clamped and quantized to PCM16.
    /// `samples.len()` need not be a multiple of `channels`.
    pub fn write(&mut self, samples: &[f32]) -> Result<(), WavError> {
        let incoming_bytes = (samples.len() as u64) * 2;
        if self.bytes_written + incoming_bytes > MAX_DATA_SIZE {
            return Err(WavError::SizeLimitHit);
        }

        let mut buf = [0u8; CHUNK_SAMPLES * 2];
        for chunk in samples.chunks(CHUNK_SAMPLES) {
            let mut n = 0;
            for &sample in chunk {
                let scaled = sample.clamp(-1.0, 1.0) * 32767.0;
                let quantized = scaled.trunc().clamp(-32768.0, 32767.0) as i16;
                buf[n..n + 2].copy_from_slice(&quantized.to_le_bytes());
                n += 2;
            }
            self.file.write_all(&buf[..n])?;
        }

        self.bytes_written += incoming_bytes;
        Ok(())
    }

    /// Flushes buffered output, and `fsync`s the file if enabled.
    pub fn sync(&mut self) -> Result<(), WavError> {
        self.file.flush()?;
        if self.fsync_enabled {
            self.file.get_ref().sync_all()?;
        }
        Ok(())
    }

    /// Patches the RIFF and `data` chunk sizes and closes the file.
    pub fn close(mut self) -> Result<(), WavError> {
        self.close_inner()
    }

    fn close_inner(&mut self) -> Result<(), WavError> {
        if self.closed {
            return Ok(());
        }
        self.file.flush()?;
        if self.bytes_written > MAX_DATA_SIZE {
            return Err(WavError::SizeLimitHit);
        }
        let data_size = self.bytes_written as u32;
        let riff_size = 36 + data_size;

        self.file.seek(SeekFrom::Start(4))?;
        self.file.write_u32::<LittleEndian>(riff_size)?;
        self.file.seek(SeekFrom::Start(40))?;
        self.file.write_u32::<LittleEndian>(data_size)?;
        self.file.flush()?;
        if self.fsync_enabled {
            self.file.get_ref().sync_all()?;
        }
        self.closed = true;
        Ok(())
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn file_size(&self) -> u64 {
        HEADER_LEN + self.bytes_written
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

impl Drop for WavWriter {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(err) = self.close_inner() {
                log::error!("failed to finalize WAV file on drop: {err}");
            }
        }
    }
}

fn write_header(
    w: &mut impl Write,
    sample_rate: u32,
    channels: u16,
    data_size: u32,
) -> Result<(), WavError> {
    let block_align = channels * 2;
    let byte_rate = sample_rate * block_align as u32;

    w.write_all(b"RIFF")?;
    w.write_u32::<LittleEndian>(36 + data_size)?;
    w.write_all(b"WAVE")?;
    w.write_all(b"fmt ")?;
    w.write_u32::<LittleEndian>(16)?;
    w.write_u16::<LittleEndian>(1)?; // PCM
    w.write_u16::<LittleEndian>(channels)?;
    w.write_u32::<LittleEndian>(sample_rate)?;
    w.write_u32::<LittleEndian>(byte_rate)?;
    w.write_u16::<LittleEndian>(block_align)?;
    w.write_u16::<LittleEndian>(16)?; // bits per sample
    w.write_all(b"data")?;
    w.write_u32::<LittleEndian>(data_size)?;
    Ok(())
}
