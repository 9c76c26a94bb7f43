use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use audyn_buffer::{FramePoolProducer, FrameQueueProducer};
use audyn_ptp::PtpClock;

use crate::config::ReceiverConfig;
use crate::error::ReceiverError;
use crate::header::RtpPacket;
use crate::socket::bind_socket;

/// Lock-free counters a receiver exposes for monitoring; safe to read from
/// any thread at any time.
#[derive(Default)]
pub struct ReceiverStats {
    packets_rx: AtomicU64,
    packets_dropped: AtomicU64,
    discontinuities: AtomicU64,
    frames_pushed: AtomicU64,
    frames_dropped_pool_empty: AtomicU64,
    frames_dropped_queue_full: AtomicU64,
}

impl ReceiverStats {
    pub fn packets_rx(&self) -> u64 {
        self.packets_rx.load(Ordering::Relaxed)
    }
    pub fn packets_dropped(&self) -> u64 {
        self.packets_dropped.load(Ordering::Relaxed)
    }
    pub fn discontinuities(&self) -> u64 {
        self.discontinuities.load(Ordering::Relaxed)
    }
    pub fn frames_pushed(&self) -> u64 {
        self.frames_pushed.load(Ordering::Relaxed)
    }
    pub fn frames_dropped_pool_empty(&self) -> u64 {
        self.frames_dropped_pool_empty.load(Ordering::Relaxed)
    }
    pub fn frames_dropped_queue_full(&self) -> u64 {
        self.frames_dropped_queue_full.load(Ordering::Relaxed)
    }
}

/// Tracks RTP sequence continuity across packets (single-threaded: the
/// receive loop owns this exclusively).
struct SeqState {
    have_seq: bool,
    expected_seq: u16,
}

impl SeqState {
    fn new() -> Self {
        Self {
            have_seq: false,
            expected_seq: 0,
        }
    }

    /// Returns `true` if this sequence number is a discontinuity.
    fn observe(&mut self, seq: u16, discontinuities: &AtomicU64) {
        if self.have_seq && seq != self.expected_seq {
            discontinuities.fetch_add(1, Ordering::Relaxed);
        }
        self.have_seq = true;
        self.expected_seq = seq.wrapping_add(1);
    }
}

/// Spawns the dedicated receive thread for `config`. Returns its join
/// handle and a stats handle safe to read concurrently.
pub fn spawn(
    config: ReceiverConfig,
    producer: FramePoolProducer,
    queue: FrameQueueProducer,
    clock: Option<Arc<PtpClock>>,
    stop: Arc<AtomicBool>,
) -> Result<(JoinHandle<()>, Arc<ReceiverStats>), ReceiverError> {
    config.validate()?;
    let socket = bind_socket(&config)?;
    let stats = Arc::new(ReceiverStats::default());
    let thread_stats = stats.clone();

    let handle = thread::Builder::new()
        .name("audyn-rtp-recv".into())
        .spawn(move || receive_loop(socket, config, producer, queue, clock, stop, thread_stats))
        .map_err(ReceiverError::Io)?;

    Ok((handle, stats))
}

fn receive_loop(
    socket: UdpSocket,
    config: ReceiverConfig,
    producer: FramePoolProducer,
    queue: FrameQueueProducer,
    clock: Option<Arc<PtpClock>>,
    stop: Arc<AtomicBool>,
    stats: Arc<ReceiverStats>,
) {
    let mut buf = [0u8; 2048];
    let mut seq_state = SeqState::new();
    let stream_channels = config.effective_stream_channels() as usize;
    let e16 = stream_channels * config.samples_per_packet * 2;
    let e24 = stream_channels * config.samples_per_packet * 3;

    while !stop.load(Ordering::Relaxed) {
        match socket.recv(&mut buf) {
            Ok(len) => {
                stats.packets_rx.fetch_add(1, Ordering::Relaxed);
                process_packet(
                    &buf[..len],
                    &config,
                    e16,
                    e24,
                    &producer,
                    &queue,
                    clock.as_deref(),
                    &mut seq_state,
                    &stats,
                );
            }
            Err(err)
                if err.kind() == std::io::ErrorKind::WouldBlock
                    || err.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(err) => {
                log::error!("RTP receive socket error, stopping receiver: {err}");
                break;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn process_packet(
    data: &[u8],
    config: &ReceiverConfig,
    e16: usize,
    e24: usize,
    producer: &FramePoolProducer,
    queue: &FrameQueueProducer,
    clock: Option<&PtpClock>,
    seq_state: &mut SeqState,
    stats: &ReceiverStats,
) {
    let packet = match RtpPacket::parse(data) {
        Some(p) => p,
        None => {
            stats.packets_dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };
    if packet.payload_type != config.payload_type {
        stats.packets_dropped.fetch_add(1, Ordering::Relaxed);
        return;
    }

    if let Some(clock) = clock {
        let arrival_ns = clock.now_ns();
        if arrival_ns != 0 {
            clock.set_rtp_epoch(packet.timestamp, arrival_ns, config.sample_rate);
        }
    }

    seq_state.observe(packet.sequence, &stats.discontinuities);

    let is_l16 = packet.payload.len() == e16;
    let is_l24 = packet.payload.len() == e24;
    if !is_l16 && !is_l24 {
        stats.packets_dropped.fetch_add(1, Ordering::Relaxed);
        return;
    }

    let Some(handle) = producer.acquire() else {
        stats.frames_dropped_pool_empty.fetch_add(1, Ordering::Relaxed);
        return;
    };

    let channels = config.channels as usize;
    let channel_offset = config.channel_offset as usize;
    let stream_channels = config.effective_stream_channels() as usize;
    let samples_per_packet = config.samples_per_packet;

    producer.with_frame_mut(handle, |frame| {
        debug_assert_eq!(
            frame.channels(),
            channels,
            "frame pool shape must match receiver channel count"
        );
        debug_assert!(
            frame.capacity_frames() >= samples_per_packet,
            "frame pool capacity must cover samples_per_packet"
        );
        let storage = frame.storage_mut();
        for i in 0..samples_per_packet {
            for c in 0..channels {
                let wire_idx = i * stream_channels + channel_offset + c;
                let sample = if is_l16 {
                    let off = wire_idx * 2;
                    crate::header::decode_l16(packet.payload[off], packet.payload[off + 1])
                } else {
                    let off = wire_idx * 3;
                    crate::header::decode_l24(
                        packet.payload[off],
                        packet.payload[off + 1],
                        packet.payload[off + 2],
                    )
                };
                storage[i * channels + c] = sample;
            }
        }
        frame.set_valid_frames(samples_per_packet);
    });

    if queue.push(handle) {
        stats.frames_pushed.fetch_add(1, Ordering::Relaxed);
    } else {
        // The handle is not returned to the pool here: only the consumer
        // side may call `release` (see audyn_buffer::pool's single-writer
        // discipline), and the consumer never saw this handle. Sustained
        // queue-full backpressure therefore shrinks the effective pool
        // size for the rest of the run; see DESIGN.md.
        stats.frames_dropped_queue_full.fetch_add(1, Ordering::Relaxed);
    }
}
