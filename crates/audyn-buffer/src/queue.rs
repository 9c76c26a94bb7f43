use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::frame::FrameHandle;

/// Bounded single-producer/single-consumer ring of frame handles.
///
/// `head`/`tail` count total pushes/pops rather than wrapping at capacity
/// directly; slot index is `counter % capacity`. Only the producer advances
/// `tail`, only the consumer advances `head`, so `push` and `pop` never
/// contend on the same atomic write.
struct FrameQueue {
    slots: Box<[UnsafeCell<MaybeUninit<FrameHandle>>]>,
    capacity: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
}

unsafe impl Sync for FrameQueue {}

impl FrameQueue {
    fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "frame queue capacity must be nonzero");
        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            slots,
            capacity,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    #[inline]
    fn index(&self, counter: usize) -> usize {
        counter % self.capacity
    }

    fn push(&self, handle: FrameHandle) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail.wrapping_sub(head) >= self.capacity {
            return false;
        }
        let slot = self.index(tail);
        unsafe {
            (*self.slots[slot].get()).write(handle);
        }
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        true
    }

    fn pop(&self) -> Option<FrameHandle> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        let slot = self.index(head);
        let handle = unsafe { (*self.slots[slot].get()).assume_init_read() };
        self.head.store(head.wrapping_add(1), Ordering::Release);
        Some(handle)
    }

    fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.wrapping_sub(head)
    }
}

/// Creates a bounded SPSC frame queue of `capacity` slots and returns its
/// two endpoints.
pub fn frame_queue(capacity: usize) -> (FrameQueueProducer, FrameQueueConsumer) {
    let queue = Arc::new(FrameQueue::new(capacity));
    (
        FrameQueueProducer { queue: queue.clone() },
        FrameQueueConsumer { queue },
    )
}

/// The pushing (producer) side of a frame queue.
#[derive(Clone)]
pub struct FrameQueueProducer {
    queue: Arc<FrameQueue>,
}

impl FrameQueueProducer {
    /// Pushes `handle`; returns `false` if the queue is full and the
    /// handle was not accepted (caller must release it back to the pool).
    pub fn push(&self, handle: FrameHandle) -> bool {
        self.queue.push(handle)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity
    }
}

/// The popping (consumer) side of a frame queue.
#[derive(Clone)]
pub struct FrameQueueConsumer {
    queue: Arc<FrameQueue>,
}

impl FrameQueueConsumer {
    /// Pops the oldest handle, or `None` if the queue is empty.
    pub fn pop(&self) -> Option<FrameHandle> {
        self.queue.pop()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_is_preserved() {
        let (producer, consumer) = frame_queue(4);
        for i in 0..4 {
            assert!(producer.push(FrameHandle(i)));
        }
        assert!(!producer.push(FrameHandle(99)), "queue should report full");

        for i in 0..4 {
            assert_eq!(consumer.pop(), Some(FrameHandle(i)));
        }
        assert_eq!(consumer.pop(), None);
    }

    #[test]
    fn wraps_around_capacity_without_reordering() {
        let (producer, consumer) = frame_queue(3);
        for i in 0..3 {
            assert!(producer.push(FrameHandle(i)));
        }
        assert_eq!(consumer.pop(), Some(FrameHandle(0)));
        assert_eq!(consumer.pop(), Some(FrameHandle(1)));
        assert!(producer.push(FrameHandle(3)));
        assert!(producer.push(FrameHandle(4)));
        assert_eq!(consumer.pop(), Some(FrameHandle(2)));
        assert_eq!(consumer.pop(), Some(FrameHandle(3)));
        assert_eq!(consumer.pop(), Some(FrameHandle(4)));
        assert_eq!(consumer.pop(), None);
    }

    #[test]
    fn len_tracks_pending_items() {
        let (producer, consumer) = frame_queue(8);
        assert_eq!(producer.len(), 0);
        producer.push(FrameHandle(1));
        producer.push(FrameHandle(2));
        assert_eq!(producer.len(), 2);
        consumer.pop();
        assert_eq!(consumer.len(), 1);
        assert!(!consumer.is_empty());
        consumer.pop();
        assert!(consumer.is_empty());
    }
}
