//! Radarlink Native - Host-side board communication
//!
//! This crate provides the host side of a radar sensor board link:
//! - Board discovery with baud-rate negotiation over an abstract transport
//! - A bounded, thread-safe frame queue between acquisition and processing
//! - The acquisition pipeline that streams frames from a board session
//! - Frame layout decoding and antenna deinterleaving
//!
//! # Modules
//!
//! - [`bridge`]: Transports, discovery and board sessions
//! - [`queue`]: Frame hand-off between producer and consumer threads
//! - [`acquisition`]: Producer thread feeding the queue from a session
//! - [`layout`]: Sample decoding and deinterleaving
//! - [`config`]: Discovery and acquisition configuration
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use radarlink_native::bridge::{Discovery, SimulatedBoard, SimulatedConnector};
//! use radarlink_native::{Acquisition, AcquisitionConfig, FrameQueue};
//!
//! let board = SimulatedBoard::default().with_frames(3, 64);
//! let discovery = Discovery::new(SimulatedConnector::new("sim0", board));
//! let session = discovery.discover(&["sim0"]).expect("board present");
//!
//! let queue = Arc::new(FrameQueue::new());
//! let acquisition = Acquisition::start(session, Arc::clone(&queue), &AcquisitionConfig::default())?;
//!
//! let frame = queue.blocking_dequeue(Duration::from_secs(1)).expect("frame");
//! assert_eq!(frame.len(), 64);
//!
//! let _session = acquisition.stop();
//! # Ok::<(), radarlink_native::LinkError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod acquisition;
pub mod bridge;
pub mod config;
pub mod error;
pub mod frame;
pub mod layout;
pub mod queue;

// Re-export key types
pub use acquisition::{Acquisition, AcquisitionStats};
pub use config::{AcquisitionConfig, BoardDescriptor, DiscoveryConfig};
pub use error::{AttemptError, AttemptFailure, LayoutError, LinkError, NotFoundError, TransportError};
pub use frame::Frame;
pub use layout::{FrameLayout, SampleFormat};
pub use queue::FrameQueue;
