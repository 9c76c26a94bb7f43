use std::collections::VecDeque;
use std::fs::File;
use std::path::Path;

use audiopus::coder::{Encoder as OpusEncoder, GenericCtl};
use audiopus::{Application, Bitrate, Channels, SampleRate};
use ogg::{PacketWriteEndInfo, PacketWriter};
use rand::Rng;

use crate::error::OpusError;
use crate::head::{opus_head, opus_tags, PRESKIP_48K};

/// Large enough for any Opus packet at the bitrates/complexities this writer
/// allows (libopus packets top out well under this for 20ms frames).
const MAX_PACKET_BYTES: usize = 4000;

/// Hard FIFO cap: ten seconds of interleaved samples at the configured rate.
const FIFO_CAP_SECONDS: u64 = 10;

pub struct OpusWriterConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub bitrate: i32,
    pub vbr: bool,
    pub complexity: i32,
    pub fsync_enabled: bool,
}

/// Streaming interleaved-float to Ogg Opus writer. Reframes arbitrary-length
/// input into fixed 20ms packets through a FIFO and keeps the Ogg granule
/// position exact at the 48kHz timebase regardless of the encoding rate.
pub struct OpusWriter {
    packet_writer: PacketWriter<File>,
    sync_handle: File,
    encoder: OpusEncoder,
    sample_rate: u32,
    channels: u16,
    frame_size_samples: usize,
    fifo: VecDeque<f32>,
    fifo_cap_samples: usize,
    granulepos_48k: i64,
    packetno: u64,
    serial: u32,
    eos_written: bool,
    fsync_enabled: bool,
    fifo_overflows: u64,
}

impl OpusWriter {
    pub fn create(path: impl AsRef<Path>, config: OpusWriterConfig) -> Result<Self, OpusError> {
        let sample_rate_enum = opus_sample_rate(config.sample_rate)?;
        let channels_enum = opus_channels(config.channels)?;
        let complexity = config.complexity.clamp(0, 10);
        let bitrate = config.bitrate.clamp(6_000, 510_000);

        let mut encoder = OpusEncoder::new(sample_rate_enum, channels_enum, Application::Audio)?;
        encoder.set_bitrate(Bitrate::BitsPerSecond(bitrate))?;
        encoder.set_vbr(config.vbr)?;
        encoder.set_complexity(complexity)?;

        let file = File::create(path)?;
        let sync_handle = file.try_clone()?;

        let serial = rand::thread_rng().gen::<u32>() ^ std::process::id();
        let mut packet_writer = PacketWriter::new(file);
        packet_writer.write_packet(
            opus_head(config.channels as u8, config.sample_rate),
            serial,
            PacketWriteEndInfo::EndPage,
            0,
        )?;
        packet_writer.write_packet(opus_tags(), serial, PacketWriteEndInfo::EndPage, 0)?;

        let frame_size_samples = (config.sample_rate / 50) as usize;
        let fifo_cap_samples =
            (FIFO_CAP_SECONDS * config.sample_rate as u64) as usize * config.channels as usize;

        Ok(Self {
            packet_writer,
            sync_handle,
            encoder,
            sample_rate: config.sample_rate,
            channels: config.channels,
            frame_size_samples,
            fifo: VecDeque::with_capacity(fifo_cap_samples.min(1 << 20)),
            fifo_cap_samples,
            granulepos_48k: -(PRESKIP_48K as i64),
            packetno: 0,
            serial,
            eos_written: false,
            fsync_enabled: config.fsync_enabled,
            fifo_overflows: 0,
        })
    }

    /// Appends `frames` sample-frames (i.e. `frames * channels` interleaved
    /// floats) from `interleaved` to the reframing FIFO and drains any
    /// complete 20ms packets it can now encode.
    pub fn write(&mut self, interleaved: &[f32], frames: usize) -> Result<(), OpusError> {
        if self.eos_written {
            return Err(OpusError::Closed);
        }
        let channels = self.channels as usize;
        let total = frames.checked_mul(channels).ok_or(OpusError::Overflow)?;
        let samples = &interleaved[..total.min(interleaved.len())];

        if self.fifo.len() + samples.len() > self.fifo_cap_samples {
            self.fifo_overflows += 1;
            return Err(OpusError::FifoOverflow(self.fifo_cap_samples));
        }
        self.fifo.extend(samples.iter().copied());
        self.drain_full_frames()
    }

    fn drain_full_frames(&mut self) -> Result<(), OpusError> {
        let frame_len = self.frame_size_samples * self.channels as usize;
        while self.fifo.len() >= frame_len {
            let frame: Vec<f32> = self.fifo.drain(..frame_len).collect();
            self.encode_and_submit(&frame, false)?;
        }
        Ok(())
    }

    fn encode_and_submit(&mut self, frame: &[f32], eos: bool) -> Result<(), OpusError> {
        let mut packet = [0u8; MAX_PACKET_BYTES];
        let len = self.encoder.encode_float(frame, &mut packet)?;

        self.granulepos_48k +=
            (self.frame_size_samples as i64 * 48_000) / self.sample_rate as i64;
        self.packetno += 1;

        let end_info = if eos {
            PacketWriteEndInfo::EndStream
        } else {
            PacketWriteEndInfo::NormalPacket
        };
        self.packet_writer.write_packet(
            packet[..len].to_vec(),
            self.serial,
            end_info,
            self.granulepos_48k.max(0) as u64,
        )?;
        Ok(())
    }

    /// Flushes any buffered Ogg pages; the encoder keeps accepting writes
    /// afterward (unlike `close`).
    pub fn sync(&mut self) -> Result<(), OpusError> {
        if self.fsync_enabled {
            self.sync_handle.sync_all()?;
        }
        Ok(())
    }

    pub fn close(mut self) -> Result<(), OpusError> {
        self.close_inner()
    }

    fn close_inner(&mut self) -> Result<(), OpusError> {
        if self.eos_written {
            return Ok(());
        }
        let frame_len = self.frame_size_samples * self.channels as usize;
        if !self.fifo.is_empty() {
            let mut frame: Vec<f32> = self.fifo.drain(..).collect();
            frame.resize(frame_len, 0.0);
            self.encode_and_submit(&frame, true)?;
        } else {
            self.packet_writer.write_packet(
                Vec::new(),
                self.serial,
                PacketWriteEndInfo::EndStream,
                self.granulepos_48k.max(0) as u64,
            )?;
        }
        self.eos_written = true;
        if self.fsync_enabled {
            self.sync_handle.sync_all()?;
        }
        Ok(())
    }

    pub fn fifo_overflows(&self) -> u64 {
        self.fifo_overflows
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frame_size_samples(&self) -> usize {
        self.frame_size_samples
    }
}

impl Drop for OpusWriter {
    fn drop(&mut self) {
        if !self.eos_written {
            if let Err(err) = self.close_inner() {
                log::error!("failed to finalize Opus file on drop: {err}");
            }
        }
    }
}

fn opus_sample_rate(sample_rate: u32) -> Result<SampleRate, OpusError> {
    match sample_rate {
        8_000 => Ok(SampleRate::Hz8000),
        12_000 => Ok(SampleRate::Hz12000),
        16_000 => Ok(SampleRate::Hz16000),
        24_000 => Ok(SampleRate::Hz24000),
        48_000 => Ok(SampleRate::Hz48000),
        other => Err(OpusError::ConfigInvalid(format!(
            "unsupported Opus sample rate {other}, must be one of 8000/12000/16000/24000/48000"
        ))),
    }
}

fn opus_channels(channels: u16) -> Result<Channels, OpusError> {
    match channels {
        1 => Ok(Channels::Mono),
        2 => Ok(Channels::Stereo),
        other => Err(OpusError::ConfigInvalid(format!(
            "unsupported Opus channel count {other}, must be 1 or 2"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(sample_rate: u32, channels: u16) -> OpusWriterConfig {
        OpusWriterConfig {
            sample_rate,
            channels,
            bitrate: 64_000,
            vbr: true,
            complexity: 8,
            fsync_enabled: false,
        }
    }

    #[test]
    fn granule_advances_by_fixed_step_regardless_of_rate() {
        for &sr in &[8_000u32, 16_000, 24_000, 48_000] {
            let dir = tempfile::tempdir().unwrap();
            let mut writer = OpusWriter::create(dir.path().join("a.opus"), config(sr, 1)).unwrap();
            let frame_len = writer.frame_size_samples();
            let silence = vec![0.0f32; frame_len * 3];
            writer.write(&silence, frame_len * 3).unwrap();
            // 960 = 20ms at 48kHz, the fixed granule step regardless of sr.
            assert_eq!(
                writer.granulepos_48k + (PRESKIP_48K as i64),
                960 * 3,
                "granule step must be 960 per 20ms packet at the 48kHz timebase"
            );
            writer.close().unwrap();
        }
    }

    #[test]
    fn rejects_unsupported_sample_rate() {
        let dir = tempfile::tempdir().unwrap();
        let err = OpusWriter::create(dir.path().join("a.opus"), config(44_100, 2)).unwrap_err();
        assert!(matches!(err, OpusError::ConfigInvalid(_)));
    }

    #[test]
    fn fifo_overflow_is_reported_and_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = OpusWriter::create(dir.path().join("a.opus"), config(48_000, 1)).unwrap();
        let huge = vec![0.0f32; 48_000 * 11]; // > 10s cap at 48kHz mono
        let err = writer.write(&huge, huge.len()).unwrap_err();
        assert!(matches!(err, OpusError::FifoOverflow(_)));
        assert_eq!(writer.fifo_overflows(), 1);
    }

    #[test]
    fn write_after_close_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = OpusWriter::create(dir.path().join("a.opus"), config(48_000, 1)).unwrap();
        let frame_len = writer.frame_size_samples();
        writer.write(&vec![0.0; frame_len], frame_len).unwrap();
        writer.close_inner().unwrap();
        let err = writer.write(&vec![0.0; frame_len], frame_len).unwrap_err();
        assert!(matches!(err, OpusError::Closed));
    }

    #[test]
    fn file_begins_with_head_and_tags_pages() {
        use std::io::Read;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.opus");
        let writer = OpusWriter::create(&path, config(48_000, 2)).unwrap();
        writer.close().unwrap();

        let mut bytes = Vec::new();
        File::open(&path).unwrap().read_to_end(&mut bytes).unwrap();
        assert_eq!(&bytes[0..4], b"OggS");
        let head_needle = b"OpusHead";
        assert!(bytes.windows(head_needle.len()).any(|w| w == head_needle));
        let tags_needle = b"OpusTags";
        assert!(bytes.windows(tags_needle.len()).any(|w| w == tags_needle));
    }
}
