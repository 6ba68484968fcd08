//! Acquisition pipeline
//!
//! A producer thread owns the [`BoardSession`] while streaming. It reads frame
//! packets and hands them to a shared [`FrameQueue`]; consumers take them out
//! on their own threads. Corrupt frames are dropped and counted, a transport
//! failure ends the stream.
//!
//! ```rust,ignore
//! let queue = Arc::new(FrameQueue::new());
//! let acquisition = Acquisition::start(session, Arc::clone(&queue), &AcquisitionConfig::default())?;
//!
//! while let Some(frame) = queue.blocking_dequeue(Duration::from_secs(1)) {
//!     process(frame);
//! }
//!
//! let session = acquisition.stop();
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bridge::{BoardSession, Transport};
use crate::config::AcquisitionConfig;
use crate::error::LinkError;
use crate::frame::Frame;
use crate::queue::FrameQueue;

/// Counters describing an acquisition run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionStats {
    /// Frames read and accepted by the queue
    pub frames_received: u64,
    /// Frames read while the queue was stopped and handed back by it
    pub frames_rejected: u64,
    /// Frames dropped because they failed to parse
    pub frames_corrupt: u64,
    /// Frames evicted from the queue to make room
    pub frames_evicted: u64,
}

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    rejected: AtomicU64,
    corrupt: AtomicU64,
}

/// A running producer thread.
#[derive(Debug)]
pub struct Acquisition<T: Transport + 'static> {
    handle: Option<JoinHandle<BoardSession<T>>>,
    stop: Arc<AtomicBool>,
    counters: Arc<Counters>,
    queue: Arc<FrameQueue<Frame>>,
}

impl<T: Transport + 'static> Acquisition<T> {
    /// Start streaming from `session` into `queue`.
    ///
    /// Sets the queue capacity from `config`, sends the start command and
    /// spawns the producer thread.
    ///
    /// # Errors
    ///
    /// Returns error if the board does not confirm the start command. The
    /// session is closed in that case.
    pub fn start(
        mut session: BoardSession<T>,
        queue: Arc<FrameQueue<Frame>>,
        config: &AcquisitionConfig,
    ) -> Result<Self, LinkError> {
        session.set_max_frame_payload(config.max_frame_payload);
        session.start_acquisition()?;

        queue.set_max_count(config.queue_capacity);
        queue.start();

        let stop = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(Counters::default());
        let read_timeout = config.read_timeout;

        let handle = {
            let stop = Arc::clone(&stop);
            let counters = Arc::clone(&counters);
            let queue = Arc::clone(&queue);
            thread::Builder::new()
                .name("radarlink-acquisition".to_string())
                .spawn(move || produce(session, &queue, &stop, &counters, read_timeout))
                .map_err(crate::error::TransportError::Io)?
        };

        Ok(Self { handle: Some(handle), stop, counters, queue })
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> AcquisitionStats {
        AcquisitionStats {
            frames_received: self.counters.received.load(Ordering::SeqCst),
            frames_rejected: self.counters.rejected.load(Ordering::SeqCst),
            frames_corrupt: self.counters.corrupt.load(Ordering::SeqCst),
            frames_evicted: self.queue.dropped_count(),
        }
    }

    /// True while the producer thread is still reading.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the producer, tell the board to stop and release all consumers.
    ///
    /// Returns the session, or `None` if the producer thread panicked.
    pub fn stop(mut self) -> Option<BoardSession<T>> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<BoardSession<T>> {
        let handle = self.handle.take()?;
        self.stop.store(true, Ordering::SeqCst);

        let session = match handle.join() {
            Ok(mut session) => {
                if session.is_open() {
                    if let Err(e) = session.stop_acquisition() {
                        tracing::warn!("Board did not confirm stop: {}", e);
                    }
                }
                Some(session)
            }
            Err(_) => {
                tracing::error!("Acquisition thread panicked");
                None
            }
        };

        self.queue.stop();
        let stats = self.stats();
        tracing::info!(
            "Acquisition finished: {} received, {} rejected, {} corrupt, {} evicted",
            stats.frames_received,
            stats.frames_rejected,
            stats.frames_corrupt,
            stats.frames_evicted
        );
        session
    }
}

impl<T: Transport + 'static> Drop for Acquisition<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Producer loop. Runs until stopped or the transport fails.
fn produce<T: Transport>(
    mut session: BoardSession<T>,
    queue: &FrameQueue<Frame>,
    stop: &AtomicBool,
    counters: &Counters,
    read_timeout: Duration,
) -> BoardSession<T> {
    while !stop.load(Ordering::SeqCst) {
        match session.read_frame(read_timeout) {
            Ok(Some(frame)) => {
                if queue.enqueue(frame).is_ok() {
                    counters.received.fetch_add(1, Ordering::SeqCst);
                } else {
                    counters.rejected.fetch_add(1, Ordering::SeqCst);
                    tracing::debug!("Queue stopped, discarding frame");
                }
            }
            Ok(None) => {}
            Err(LinkError::Protocol(e)) => {
                counters.corrupt.fetch_add(1, Ordering::SeqCst);
                tracing::warn!("Dropping corrupt frame: {}", e);
            }
            Err(LinkError::Transport(e)) => {
                tracing::error!("Transport failed on {}: {}", session.identifier(), e);
                session.close();
                queue.stop();
                break;
            }
        }
    }
    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{Discovery, SimulatedBoard, SimulatedConnector};

    #[test]
    fn test_streams_into_queue() {
        let board = SimulatedBoard::default().with_frames(5, 16);
        let discovery = Discovery::new(SimulatedConnector::new("sim0", board));
        let session = discovery.discover(&["sim0"]).unwrap();

        let queue = Arc::new(FrameQueue::new());
        let acquisition = Acquisition::start(session, Arc::clone(&queue), &AcquisitionConfig::default()).unwrap();

        let sequences: Vec<u32> = (0..5)
            .map(|_| queue.blocking_dequeue(Duration::from_secs(2)).unwrap().sequence)
            .collect();
        assert_eq!(sequences, vec![0, 1, 2, 3, 4]);

        let session = acquisition.stop().unwrap();
        assert!(session.is_open());
        assert!(!queue.is_running());
    }

    #[test]
    fn test_small_queue_evicts() {
        let board = SimulatedBoard::default().with_frames(10, 8);
        let discovery = Discovery::new(SimulatedConnector::new("sim0", board));
        let session = discovery.discover(&["sim0"]).unwrap();

        let queue = Arc::new(FrameQueue::new());
        let config = AcquisitionConfig { queue_capacity: 2, ..AcquisitionConfig::default() };
        let acquisition = Acquisition::start(session, Arc::clone(&queue), &config).unwrap();

        while acquisition.stats().frames_received < 10 {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dequeue().unwrap().sequence, 8);

        let stats = acquisition.stats();
        assert_eq!(stats.frames_evicted, 8);
        drop(acquisition);
    }

    #[test]
    fn test_stopped_queue_rejects_frames() {
        let board = SimulatedBoard::default().with_frames(3, 8);
        let discovery = Discovery::new(SimulatedConnector::new("sim0", board));
        let mut session = discovery.discover(&["sim0"]).unwrap();
        session.start_acquisition().unwrap();

        let queue: FrameQueue<Frame> = FrameQueue::new();
        queue.stop();
        let stop = AtomicBool::new(false);
        let counters = Counters::default();

        thread::scope(|s| {
            let producer = s.spawn(|| produce(session, &queue, &stop, &counters, Duration::from_millis(5)));
            while counters.rejected.load(Ordering::SeqCst) < 3 {
                thread::sleep(Duration::from_millis(1));
            }
            stop.store(true, Ordering::SeqCst);
            producer.join().unwrap();
        });

        assert_eq!(counters.received.load(Ordering::SeqCst), 0);
        assert_eq!(counters.rejected.load(Ordering::SeqCst), 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_transport_failure_stops_queue() {
        let board = SimulatedBoard::default();
        let connector = SimulatedConnector::new("sim0", board);
        let discovery = Discovery::new(connector.clone());
        let mut session = discovery.discover(&["sim0"]).unwrap();
        session.start_acquisition().unwrap();
        session.close();

        let queue: Arc<FrameQueue<Frame>> = Arc::new(FrameQueue::new());
        let stop = AtomicBool::new(false);
        let counters = Counters::default();
        let session = produce(session, &queue, &stop, &counters, Duration::from_millis(5));

        assert!(!session.is_open());
        assert!(!queue.is_running());
        assert_eq!(connector.open_transports(), 0);
    }
}
