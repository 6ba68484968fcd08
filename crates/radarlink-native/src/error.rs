//! Error types for host-side board communication.
//!
//! Transport and integrity failures are recoverable and drive the discovery
//! retry logic; [`NotFoundError`] is what a discovery call finally surfaces.
//! Frame-level parse failures ([`LinkError::Protocol`], [`LayoutError`]) only
//! affect the frame being parsed.

use std::fmt;
use std::io;

use thiserror::Error;

use radarlink_core::error::{CursorError, ProtocolError, RangeError, ShapeError};

// ============================================================================
// Transport Errors
// ============================================================================

/// Failures of the underlying byte transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Transport could not be opened
    #[error("Cannot open {identifier} at {baud_rate} baud: {reason}")]
    Open {
        /// Transport identifier (port name)
        identifier: String,
        /// Requested baud rate
        baud_rate: u32,
        /// Driver-level reason
        reason: String,
    },

    /// I/O error during read/write
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port driver error
    #[cfg(feature = "serial")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// No complete reply before the deadline
    #[error("No reply within {waited_ms} ms")]
    Timeout {
        /// Time waited in milliseconds
        waited_ms: u64,
    },

    /// Transport already closed
    #[error("Transport closed")]
    Closed,
}

// ============================================================================
// Link Errors
// ============================================================================

/// Errors while exchanging packets over an open transport.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Transport failure (usually fatal for the session)
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Malformed or corrupt packet (affects only that packet)
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

// ============================================================================
// Discovery Errors
// ============================================================================

/// Why a single discovery attempt was rejected.
#[derive(Debug, Error)]
pub enum AttemptError {
    /// Transport failed to open, read or write
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Reply failed the integrity check at this baud rate
    #[error("Integrity check failed: {0}")]
    Integrity(ProtocolError),

    /// Intact reply, but the board refused the probe
    #[error("Board refused probe: {0}")]
    Refused(ProtocolError),

    /// Intact reply from a board that is not in the known-board table
    #[error("Unknown board {vid:04X}:{pid:04X}")]
    UnknownBoard {
        /// Reported vendor id
        vid: u16,
        /// Reported product id
        pid: u16,
    },
}

impl AttemptError {
    /// Whether another baud rate could succeed where this attempt failed.
    ///
    /// Transport and integrity failures are retried at the fallback rate; a
    /// refused probe or unknown board means the link already works.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Integrity(_))
    }
}

impl From<ProtocolError> for AttemptError {
    fn from(err: ProtocolError) -> Self {
        if err.is_integrity_failure() {
            Self::Integrity(err)
        } else {
            Self::Refused(err)
        }
    }
}

impl From<LinkError> for AttemptError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::Transport(err) => Self::Transport(err),
            LinkError::Protocol(err) => err.into(),
        }
    }
}

/// One rejected discovery attempt.
#[derive(Debug)]
pub struct AttemptFailure {
    /// Transport identifier that was probed
    pub identifier: String,
    /// Baud rate of the attempt
    pub baud_rate: u32,
    /// Why it was rejected
    pub cause: AttemptError,
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {} baud: {}", self.identifier, self.baud_rate, self.cause)
    }
}

/// No board answered on any candidate with any baud rate.
#[derive(Debug, Default, Error)]
#[error("Board not found ({} attempts failed)", attempts.len())]
pub struct NotFoundError {
    /// Every failed attempt, in probing order
    pub attempts: Vec<AttemptFailure>,
}

// ============================================================================
// Layout Errors
// ============================================================================

/// Errors decoding a frame payload into samples.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// Payload size does not match the configured layout
    #[error("Payload length mismatch: expected {expected} bytes, got {actual}")]
    PayloadLength {
        /// Length implied by the layout
        expected: usize,
        /// Actual payload length
        actual: usize,
    },

    /// Layout has no enabled receive antenna
    #[error("Layout has an empty rx mask")]
    NoAntennas,

    /// Frame size implied by the layout does not fit in memory
    #[error("Layout describes a frame too large to address")]
    TooLarge,

    /// Payload could not be consumed
    #[error("Cursor error: {0}")]
    Cursor(#[from] CursorError),

    /// Sample buffer does not match the layout's matrix shape
    #[error("Shape error: {0}")]
    Shape(#[from] ShapeError),

    /// Sample width does not fit the sample type
    #[error("Range error: {0}")]
    Range(#[from] RangeError),
}

// ============================================================================
// Tests
// ============================================================================
