//! Bounded frame queue between the acquisition thread and consumers.
//!
//! Frames are handed over by value. When the queue is full the oldest frame
//! is evicted so consumers always see the most recent data; stale radar
//! frames are worthless for live processing.
//!
//! All state lives behind one mutex, and one condition variable signals
//! "non-empty or stopped". [`FrameQueue::stop`] is the only way to release
//! every blocked consumer without enqueuing data.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::frame::Frame;

/// Whether the queue accepts frames.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum QueueState {
    Running,
    Stopped,
}

#[derive(Debug)]
struct Inner<F> {
    frames: VecDeque<F>,
    max_count: usize,
    state: QueueState,
    dropped: u64,
}

impl<F> Inner<F> {
    /// Evict from the head until `extra` more frames fit.
    fn make_room(&mut self, extra: usize) {
        if self.max_count == 0 {
            return;
        }
        while self.frames.len() + extra > self.max_count {
            if self.frames.pop_front().is_none() {
                break;
            }
            self.dropped += 1;
        }
    }
}

/// Thread-safe, capacity-bounded FIFO of owned frames.
///
/// Share it between threads with `Arc`; every method takes `&self`.
#[derive(Debug)]
pub struct FrameQueue<F = Frame> {
    inner: Mutex<Inner<F>>,
    available: Condvar,
}

impl<F> Default for FrameQueue<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> FrameQueue<F> {
    /// Create an unbounded, running queue.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_count(0)
    }

    /// Create a running queue holding at most `max_count` frames (0 = unbounded).
    #[must_use]
    pub fn with_max_count(max_count: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                frames: VecDeque::new(),
                max_count,
                state: QueueState::Running,
                dropped: 0,
            }),
            available: Condvar::new(),
        }
    }

    // Poisoning is ignored: the queue is consistent between statements.
    fn lock(&self) -> MutexGuard<'_, Inner<F>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the capacity (0 = unbounded).
    ///
    /// Shrinking below the current length evicts the oldest frames at once.
    pub fn set_max_count(&self, max_count: usize) {
        let mut inner = self.lock();
        inner.max_count = max_count;
        inner.make_room(0);
    }

    /// Current capacity (0 = unbounded).
    pub fn max_count(&self) -> usize {
        self.lock().max_count
    }

    /// Append a frame, evicting the oldest one if the queue is full.
    ///
    /// # Errors
    ///
    /// Hands the frame back if the queue is stopped.
    pub fn enqueue(&self, frame: F) -> Result<(), F> {
        let mut inner = self.lock();
        if inner.state == QueueState::Stopped {
            return Err(frame);
        }

        inner.make_room(1);
        inner.frames.push_back(frame);
        drop(inner);

        self.available.notify_one();
        Ok(())
    }

    /// Take the oldest frame without blocking.
    ///
    /// Returns `None` if the queue is empty or stopped.
    pub fn dequeue(&self) -> Option<F> {
        let mut inner = self.lock();
        match inner.state {
            QueueState::Running => inner.frames.pop_front(),
            QueueState::Stopped => None,
        }
    }

    /// Take the oldest frame, waiting until one arrives.
    ///
    /// A zero `timeout`, or one too long to represent as a deadline, waits
    /// indefinitely. Returns `None` on timeout or if the queue is (or
    /// becomes) stopped.
    pub fn blocking_dequeue(&self, timeout: Duration) -> Option<F> {
        let deadline = if timeout.is_zero() { None } else { Instant::now().checked_add(timeout) };
        let mut inner = self.lock();

        loop {
            if inner.state == QueueState::Stopped {
                return None;
            }
            if let Some(frame) = inner.frames.pop_front() {
                return Some(frame);
            }

            inner = match deadline {
                None => self.available.wait(inner).unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    self.available
                        .wait_timeout(inner, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Drop every queued frame. The running state is unchanged.
    pub fn clear(&self) {
        // Frames are dropped after the lock is released
        let frames = std::mem::take(&mut self.lock().frames);
        drop(frames);
    }

    /// Accept frames again after [`stop`](Self::stop).
    ///
    /// Returns `true` if the state changed.
    pub fn start(&self) -> bool {
        let mut inner = self.lock();
        let changed = inner.state == QueueState::Stopped;
        inner.state = QueueState::Running;
        changed
    }

    /// Reject further frames and wake every blocked consumer.
    ///
    /// Returns `true` if the state changed.
    pub fn stop(&self) -> bool {
        let mut inner = self.lock();
        let changed = inner.state == QueueState::Running;
        inner.state = QueueState::Stopped;
        drop(inner);

        self.available.notify_all();
        changed
    }

    /// True while the queue accepts frames.
    pub fn is_running(&self) -> bool {
        self.lock().state == QueueState::Running
    }

    /// Number of queued frames.
    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    /// True if no frame is queued.
    pub fn is_empty(&self) -> bool {
        self.lock().frames.is_empty()
    }

    /// Total frames evicted to make room since creation.
    pub fn dropped_count(&self) -> u64 {
        self.lock().dropped
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let queue = FrameQueue::new();
        for i in 0..5 {
            queue.enqueue(i).unwrap();
        }
        let drained: Vec<i32> = std::iter::from_fn(|| queue.dequeue()).collect();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn test_eviction_keeps_newest() {
        let queue = FrameQueue::with_max_count(2);
        queue.enqueue(1).unwrap();
        queue.enqueue(2).unwrap();
        queue.enqueue(3).unwrap();

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped_count(), 1);
        assert_eq!(queue.dequeue(), Some(2));
        assert_eq!(queue.dequeue(), Some(3));
    }

    #[test]
    fn test_shrinking_capacity_trims_oldest() {
        let queue = FrameQueue::new();
        for i in 0..10 {
            queue.enqueue(i).unwrap();
        }
        queue.set_max_count(3);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.max_count(), 3);
        assert_eq!(queue.dropped_count(), 7);
        assert_eq!(queue.dequeue(), Some(7));
    }

    #[test]
    fn test_evicted_frames_are_dropped() {
        let payload = Arc::new(());
        let queue = FrameQueue::with_max_count(1);
        queue.enqueue(Arc::clone(&payload)).unwrap();
        queue.enqueue(Arc::clone(&payload)).unwrap();
        assert_eq!(Arc::strong_count(&payload), 2);

        queue.clear();
        assert_eq!(Arc::strong_count(&payload), 1);
        assert!(queue.is_running());
    }

    #[test]
    fn test_stopped_queue_rejects_frames() {
        let queue = FrameQueue::new();
        queue.enqueue(1).unwrap();
        assert!(queue.stop());
        assert!(!queue.stop());

        assert_eq!(queue.enqueue(2), Err(2));
        assert_eq!(queue.dequeue(), None);
        assert_eq!(queue.blocking_dequeue(Duration::ZERO), None);

        assert!(queue.start());
        assert_eq!(queue.dequeue(), Some(1));
    }

    #[test]
    fn test_blocking_dequeue_timeout() {
        let queue: FrameQueue<u32> = FrameQueue::new();
        let start = Instant::now();
        assert_eq!(queue.blocking_dequeue(Duration::from_millis(30)), None);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_blocking_dequeue_unrepresentable_timeout() {
        let queue = Arc::new(FrameQueue::new());
        queue.enqueue(7u32).unwrap();
        assert_eq!(queue.blocking_dequeue(Duration::MAX), Some(7));

        // Waits indefinitely until stopped
        let waiter = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.blocking_dequeue(Duration::MAX))
        };
        thread::sleep(Duration::from_millis(20));
        queue.stop();
        assert_eq!(waiter.join().unwrap(), None);
    }

    #[test]
    fn test_blocking_dequeue_receives_frame() {
        let queue = Arc::new(FrameQueue::new());
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                queue.enqueue(42u32).unwrap();
            })
        };

        assert_eq!(queue.blocking_dequeue(Duration::from_secs(5)), Some(42));
        producer.join().unwrap();
    }

    #[test]
    fn test_stop_wakes_all_waiters() {
        let queue: Arc<FrameQueue<u32>> = Arc::new(FrameQueue::new());
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.blocking_dequeue(Duration::ZERO))
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        let start = Instant::now();
        queue.stop();

        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), None);
        }
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
