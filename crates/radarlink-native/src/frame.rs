//! Acquired frames.

use std::time::Instant;

/// One complete unit of data streamed by the board.
///
/// A frame has exactly one owner at a time. The producer creates it, the
/// queue holds it, and a consumer takes it out; dropping it releases the
/// payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Sequence number assigned by the firmware
    pub sequence: u32,
    /// Firmware-defined flags
    pub flags: u8,
    /// Host arrival time
    pub timestamp: Instant,
    /// Raw payload bytes
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame stamped with the current time.
    #[must_use]
    pub fn new(sequence: u32, flags: u8, payload: Vec<u8>) -> Self {
        Self { sequence, flags, timestamp: Instant::now(), payload }
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// True if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
