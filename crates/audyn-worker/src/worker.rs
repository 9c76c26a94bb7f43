use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use parking_lot::Mutex;

use audyn_archive::ArchivePolicy;
use audyn_buffer::{FramePoolConsumer, FrameQueueConsumer};
use audyn_ptp::PtpClock;

use crate::error::WorkerError;
use crate::sink::{open_sink, ArchiveWriter, SinkConfig};

/// Worker lifecycle state, per the `Opening -> Writing -> {Rotating,
/// Draining} -> Stopped` state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Opening,
    Writing,
    Rotating,
    Draining,
    Stopped,
}

/// How long the worker sleeps between empty-queue polls.
const POLL_INTERVAL: Duration = Duration::from_millis(1);
/// How long the queue must stay continuously empty before silence is
/// synthesized in its place.
const SILENCE_THRESHOLD: Duration = Duration::from_millis(50);

pub struct WorkerStats {
    pub frames_written: std::sync::atomic::AtomicU64,
    pub silence_frames: std::sync::atomic::AtomicU64,
    pub rotations: std::sync::atomic::AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl Default for WorkerStats {
    fn default() -> Self {
        Self {
            frames_written: std::sync::atomic::AtomicU64::new(0),
            silence_frames: std::sync::atomic::AtomicU64::new(0),
            rotations: std::sync::atomic::AtomicU64::new(0),
            last_error: Mutex::new(None),
        }
    }
}

impl WorkerStats {
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    fn record_error(&self, err: &WorkerError) {
        *self.last_error.lock() = Some(err.to_string());
    }
}

/// Pops frames from the queue, rotates the archive on policy boundaries,
/// and writes them to the current sink. Owns exactly one writer at a time.
pub struct Worker {
    queue: FrameQueueConsumer,
    pool: FramePoolConsumer,
    policy: ArchivePolicy,
    sink_config: SinkConfig,
    clock: Arc<PtpClock>,
    channels: usize,
    frame_capacity: usize,
    state: WorkerState,
    writer: Option<Box<dyn ArchiveWriter>>,
    stats: Arc<WorkerStats>,
}

impl Worker {
    pub fn new(
        queue: FrameQueueConsumer,
        pool: FramePoolConsumer,
        policy: ArchivePolicy,
        sink_config: SinkConfig,
        clock: Arc<PtpClock>,
        channels: usize,
        frame_capacity: usize,
    ) -> Self {
        Self {
            queue,
            pool,
            policy,
            sink_config,
            clock,
            channels,
            frame_capacity,
            state: WorkerState::Opening,
            writer: None,
            stats: Arc::new(WorkerStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<WorkerStats> {
        self.stats.clone()
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Runs until `stop` is set and the queue drains, or a fatal writer
    /// error occurs. Returns the terminal state.
    pub fn run(&mut self, stop: &AtomicBool) -> WorkerState {
        loop {
            match self.state {
                WorkerState::Opening => {
                    if let Err(err) = self.open_first_sink() {
                        log::error!("failed to open initial archive file: {err}");
                        self.stats.record_error(&err);
                        self.state = WorkerState::Stopped;
                    } else {
                        self.state = WorkerState::Writing;
                    }
                }
                WorkerState::Writing => {
                    if stop.load(Ordering::Relaxed) {
                        self.state = WorkerState::Draining;
                        continue;
                    }
                    if self.policy.should_rotate(self.clock.now_ns()) {
                        self.state = WorkerState::Rotating;
                        continue;
                    }
                    if let Err(err) = self.process_one(true) {
                        log::error!("fatal write error: {err}");
                        self.stats.record_error(&err);
                        self.state = WorkerState::Draining;
                    }
                }
                WorkerState::Rotating => match self.rotate() {
                    Ok(()) => self.state = WorkerState::Writing,
                    Err(err) => {
                        log::error!("fatal rotation error: {err}");
                        self.stats.record_error(&err);
                        self.state = WorkerState::Stopped;
                    }
                },
                WorkerState::Draining => {
                    if self.queue.is_empty() {
                        self.state = WorkerState::Stopped;
                        continue;
                    }
                    if let Err(err) = self.process_one(false) {
                        log::error!("error while draining: {err}");
                        self.stats.record_error(&err);
                        self.state = WorkerState::Stopped;
                    }
                }
                WorkerState::Stopped => {
                    if let Some(writer) = self.writer.take() {
                        if let Err(err) = writer.close() {
                            log::error!("error closing final archive file: {err}");
                            self.stats.record_error(&err);
                        }
                    }
                    return WorkerState::Stopped;
                }
            }
        }
    }

    fn open_first_sink(&mut self) -> Result<(), WorkerError> {
        let path = self.policy.next_path(self.clock.now_ns())?;
        let writer = open_sink(&path, &self.sink_config)?;
        self.writer = Some(writer);
        self.policy.advance();
        self.stats.rotations.fetch_add(1, Ordering::Relaxed);
        log::info!("opened archive file {}", path.display());
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), WorkerError> {
        if let Some(writer) = self.writer.take() {
            writer.close()?;
        }
        let path = self.policy.next_path(self.clock.now_ns())?;
        let writer = open_sink(&path, &self.sink_config)?;
        self.writer = Some(writer);
        self.policy.advance();
        self.stats.rotations.fetch_add(1, Ordering::Relaxed);
        log::info!("rotated archive file to {}", path.display());
        Ok(())
    }

    /// Pops one frame (synthesizing silence after a sustained stall if
    /// `allow_silence`) and writes it to the current sink.
    fn process_one(&mut self, allow_silence: bool) -> Result<(), WorkerError> {
        let Some(handle) = self.queue.pop() else {
            if allow_silence {
                return self.wait_or_synthesize();
            }
            sleep(POLL_INTERVAL);
            return Ok(());
        };
        self.write_popped_frame(handle)
    }

    fn write_popped_frame(&mut self, handle: audyn_buffer::FrameHandle) -> Result<(), WorkerError> {
        let writer = self.writer.as_mut().expect("writer open while Writing/Draining");
        let result = self.pool.with_frame(handle, |frame| {
            writer.write_frame(frame.samples(), frame.valid_frames())
        });
        self.pool.release(handle);
        result?;
        self.stats.frames_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn wait_or_synthesize(&mut self) -> Result<(), WorkerError> {
        let start = std::time::Instant::now();
        loop {
            if let Some(handle) = self.queue.pop() {
                return self.write_popped_frame(handle);
            }
            if start.elapsed() >= SILENCE_THRESHOLD {
                return self.write_silence_frame();
            }
            sleep(POLL_INTERVAL);
        }
    }

    fn write_silence_frame(&mut self) -> Result<(), WorkerError> {
        let silence = vec![0.0f32; self.channels * self.frame_capacity];
        let writer = self.writer.as_mut().expect("writer open while synthesizing silence");
        writer.write_frame(&silence, self.frame_capacity)?;
        self.stats.silence_frames.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audyn_archive::{ClockSource, Layout, PolicyConfig};
    use audyn_buffer::{frame_pool, frame_queue};

    fn sink_config() -> SinkConfig {
        SinkConfig {
            suffix: "wav".into(),
            sample_rate: 48_000,
            channels: 2,
            fsync_enabled: false,
            opus_bitrate: 64_000,
            opus_vbr: true,
            opus_complexity: 8,
        }
    }

    fn policy(root: &std::path::Path) -> ArchivePolicy {
        ArchivePolicy::new(PolicyConfig {
            root: root.to_path_buf(),
            suffix: "wav".into(),
            layout: Layout::Flat,
            period_sec: 0,
            clock_source: ClockSource::Utc,
            create_dirs: true,
        })
        .unwrap()
    }

    #[test]
    fn writes_pushed_frames_and_stops_on_signal() {
        let dir = tempfile::tempdir().unwrap();
        let (pool_producer, pool_consumer) = frame_pool(4, 2, 8);
        let (queue_producer, queue_consumer) = frame_queue(4);

        let handle = pool_producer.acquire().unwrap();
        pool_producer.with_frame_mut(handle, |frame| {
            frame.storage_mut().iter_mut().for_each(|s| *s = 0.25);
            frame.set_valid_frames(8);
        });
        assert!(queue_producer.push(handle));

        let mut worker = Worker::new(
            queue_consumer,
            pool_consumer,
            policy(dir.path()),
            sink_config(),
            Arc::new(PtpClock::none()),
            2,
            8,
        );

        let stop = AtomicBool::new(true);
        let final_state = worker.run(&stop);

        assert_eq!(final_state, WorkerState::Stopped);
        assert_eq!(worker.stats().frames_written.load(Ordering::Relaxed), 1);
        assert!(worker.stats().last_error().is_none());

        let mut entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let path = entries.remove(0).unwrap().path();
        assert_eq!(path.extension().unwrap(), "wav");
        assert!(std::fs::metadata(&path).unwrap().len() > 44);
    }

    #[test]
    fn draining_with_empty_queue_stops_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let (_pool_producer, pool_consumer) = frame_pool(1, 2, 8);
        let (_queue_producer, queue_consumer) = frame_queue(1);

        let mut worker = Worker::new(
            queue_consumer,
            pool_consumer,
            policy(dir.path()),
            sink_config(),
            Arc::new(PtpClock::none()),
            2,
            8,
        );

        let stop = AtomicBool::new(true);
        let final_state = worker.run(&stop);
        assert_eq!(final_state, WorkerState::Stopped);
        assert_eq!(worker.stats().frames_written.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn unknown_suffix_fails_open_and_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = sink_config();
        cfg.suffix = "flac".into();
        let (_pool_producer, pool_consumer) = frame_pool(1, 2, 8);
        let (_queue_producer, queue_consumer) = frame_queue(1);

        let mut worker = Worker::new(
            queue_consumer,
            pool_consumer,
            policy(dir.path()),
            cfg,
            Arc::new(PtpClock::none()),
            2,
            8,
        );

        let stop = AtomicBool::new(true);
        let final_state = worker.run(&stop);
        assert_eq!(final_state, WorkerState::Stopped);
        assert!(worker.stats().last_error().is_some());
    }
}
