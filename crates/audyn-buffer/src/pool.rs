use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::frame::{AudioFrame, FrameHandle};

/// Fixed set of pre-allocated audio frames plus a free-list of their handles.
///
/// The free-list is a bounded SPSC ring of indices, the same shape as
/// [`crate::queue::FrameQueue`]: `head`/`tail` count total acquires/releases
/// rather than wrapping at capacity directly, and only the producer
/// (`acquire`) ever advances `head` while only the consumer (`release`) ever
/// advances `tail`. A single shared counter mutated by both sides via plain
/// load-then-store (the pool's previous shape) is not atomic as a whole —
/// two concurrent calls can both read the same value and one of their
/// stores is lost, corrupting the free count. Per-side-owned atomics sidestep
/// that: each one only ever has a single writer, so there is nothing to
/// lose. The ring starts full, with every index already written into its
/// slot at construction time.
struct FramePool {
    frames: Box<[UnsafeCell<AudioFrame>]>,
    free_slots: Box<[UnsafeCell<MaybeUninit<usize>>]>,
    capacity: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// SAFETY: `frames` is only ever accessed through a handle returned by
// `acquire`, and the SPSC contract guarantees a handle is owned by exactly
// one side (producer between acquire and push, consumer between pop and
// release) at any time.
unsafe impl Sync for FramePool {}

impl FramePool {
    fn new(capacity: usize, channels: usize, samples_per_frame: usize) -> Self {
        let frames = (0..capacity)
            .map(|_| UnsafeCell::new(AudioFrame::new(channels, samples_per_frame)))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        let free_slots = (0..capacity)
            .map(|i| UnsafeCell::new(MaybeUninit::new(i)))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            frames,
            free_slots,
            capacity,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(capacity),
        }
    }

    #[inline]
    fn index(&self, counter: usize) -> usize {
        counter % self.capacity
    }

    fn acquire(&self) -> Option<FrameHandle> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        let slot = self.index(head);
        let idx = unsafe { (*self.free_slots[slot].get()).assume_init_read() };
        self.head.store(head.wrapping_add(1), Ordering::Release);
        Some(FrameHandle(idx))
    }

    fn release(&self, handle: FrameHandle) {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        debug_assert!(
            tail.wrapping_sub(head) < self.capacity,
            "release on a full free-list (double release?)"
        );
        let slot = self.index(tail);
        unsafe {
            (*self.free_slots[slot].get()).write(handle.0);
        }
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
    }

    fn free_count(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.wrapping_sub(head)
    }
}

/// Creates a frame pool of `capacity` frames, each `samples_per_frame`
/// sample-frames of `channels` interleaved floats, and returns its two
/// endpoints. The producer acquires frames; the consumer releases them.
pub fn frame_pool(
    capacity: usize,
    channels: usize,
    samples_per_frame: usize,
) -> (FramePoolProducer, FramePoolConsumer) {
    let pool = Arc::new(FramePool::new(capacity, channels, samples_per_frame));
    (
        FramePoolProducer { pool: pool.clone() },
        FramePoolConsumer { pool },
    )
}

/// The acquiring (producer) side of a frame pool.
#[derive(Clone)]
pub struct FramePoolProducer {
    pool: Arc<FramePool>,
}

impl FramePoolProducer {
    /// Returns a free frame handle, or `None` if the pool is exhausted.
    /// Constant-time, non-blocking, allocation-free.
    pub fn acquire(&self) -> Option<FrameHandle> {
        self.pool.acquire()
    }

    /// Runs `f` with mutable access to the frame behind `handle`. Callers
    /// must only do this for a handle they currently hold exclusively
    /// (i.e. one just returned by `acquire` and not yet pushed/released).
    pub fn with_frame_mut<R>(&self, handle: FrameHandle, f: impl FnOnce(&mut AudioFrame) -> R) -> R {
        let frame = unsafe { &mut *self.pool.frames[handle.0].get() };
        f(frame)
    }

    pub fn free_count(&self) -> usize {
        self.pool.free_count()
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity
    }
}

/// The releasing (consumer) side of a frame pool.
#[derive(Clone)]
pub struct FramePoolConsumer {
    pool: Arc<FramePool>,
}

impl FramePoolConsumer {
    /// Returns `handle` to the free-list. Constant-time, non-blocking.
    pub fn release(&self, handle: FrameHandle) {
        self.pool.release(handle)
    }

    /// Runs `f` with shared access to the frame behind `handle`.
    pub fn with_frame<R>(&self, handle: FrameHandle, f: impl FnOnce(&AudioFrame) -> R) -> R {
        let frame = unsafe { &*self.pool.frames[handle.0].get() };
        f(frame)
    }

    /// Runs `f` with mutable access, e.g. to fill a frame with silence
    /// in-place before writing it.
    pub fn with_frame_mut<R>(&self, handle: FrameHandle, f: impl FnOnce(&mut AudioFrame) -> R) -> R {
        let frame = unsafe { &mut *self.pool.frames[handle.0].get() };
        f(frame)
    }

    pub fn free_count(&self) -> usize {
        self.pool.free_count()
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_exhausts_then_release_refills() {
        let (producer, consumer) = frame_pool(4, 2, 16);
        assert_eq!(producer.free_count(), 4);

        let mut handles = Vec::new();
        for _ in 0..4 {
            handles.push(producer.acquire().expect("pool should have a free frame"));
        }
        assert_eq!(producer.free_count(), 0);
        assert!(producer.acquire().is_none(), "pool must be exhausted");

        for h in handles {
            consumer.release(h);
        }
        assert_eq!(producer.free_count(), 4);
    }

    #[test]
    fn pool_conservation_holds_under_mixed_use() {
        let (producer, consumer) = frame_pool(8, 2, 16);
        let a = producer.acquire().unwrap();
        let b = producer.acquire().unwrap();
        assert_eq!(producer.free_count(), 6);
        consumer.release(a);
        assert_eq!(producer.free_count(), 7);
        let c = producer.acquire().unwrap();
        let d = producer.acquire().unwrap();
        assert_eq!(producer.free_count(), 5);
        consumer.release(b);
        consumer.release(c);
        consumer.release(d);
        assert_eq!(producer.free_count(), 8);
    }

    #[test]
    fn frame_metadata_is_fixed() {
        let (producer, _consumer) = frame_pool(2, 2, 48);
        let h = producer.acquire().unwrap();
        producer.with_frame_mut(h, |frame| {
            assert_eq!(frame.channels(), 2);
            assert_eq!(frame.capacity_frames(), 48);
            assert_eq!(frame.valid_frames(), 0);
            frame.set_valid_frames(48);
        });
        producer.with_frame_mut(h, |frame| {
            assert_eq!(frame.valid_frames(), 48);
            assert_eq!(frame.channels(), 2);
        });
    }
}
