//! Board communication bridges
//!
//! This module connects the host to a radar board:
//! - [`Transport`] / [`Connector`]: the byte-stream abstraction every bridge implements
//! - [`serial`]: Serial/USB-CDC transport (requires `serial` feature)
//! - [`sim`]: Scripted in-process board for tests and `--simulate`
//! - [`discovery`]: Baud-rate negotiation and board identification
//! - [`session`]: An open, validated link to one board
//!
//! # Discovery
//!
//! Each candidate port is probed at the primary baud rate and, if the reply
//! is missing or corrupt, once more at the fallback rate. The probe reply is
//! CRC-checked, so a wrong baud rate cannot be mistaken for a working link.
//!
//! ```rust,ignore
//! use radarlink_native::bridge::{Discovery, SerialConnector};
//!
//! let discovery = Discovery::new(SerialConnector::default());
//! let ports = SerialConnector::list_ports()?;
//! let mut session = discovery.discover(&ports)?;
//!
//! println!("{} at {} baud", session.descriptor().name, session.baud_rate());
//! session.close();
//! ```

use std::time::Duration;

use crate::error::TransportError;

pub mod discovery;
mod exchange;
pub mod session;
pub mod sim;

#[cfg(feature = "serial")]
pub mod serial;

// Re-export key types
pub use discovery::Discovery;
pub use session::{close_session, BoardSession};
pub use sim::{SimulatedBoard, SimulatedConnector, SimulatedTransport};

#[cfg(feature = "serial")]
pub use serial::{SerialConnector, SerialTransport};

/// An open byte channel to a board.
pub trait Transport: Send {
    /// Identifier the transport was opened with (e.g. `/dev/ttyACM0`).
    fn identifier(&self) -> &str;

    /// Write all of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns error if the transport is closed or the write fails.
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Read at most `max_bytes`, waiting up to `timeout` for the first byte.
    ///
    /// Returns an empty vector if nothing arrived in time.
    ///
    /// # Errors
    ///
    /// Returns error if the transport is closed or the read fails.
    fn read(&mut self, max_bytes: usize, timeout: Duration) -> Result<Vec<u8>, TransportError>;

    /// Release the channel. Calling it again has no effect.
    fn close(&mut self);
}

/// Opens transports by identifier.
pub trait Connector {
    /// Transport produced by this connector
    type Transport: Transport;

    /// Open `identifier` at `baud_rate`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Open`] if the channel cannot be opened.
    fn open(&self, identifier: &str, baud_rate: u32) -> Result<Self::Transport, TransportError>;
}
