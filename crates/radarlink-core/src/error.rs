//! Error types for Radarlink Core
//!
//! This module provides error types that work in `no_std` environments.
//! All errors are `Copy`, carry the context needed for debugging and never
//! allocate.

use core::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Bit Primitive Errors
// ============================================================================

/// A bit mask does not fit into the target integer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeError {
    /// Requested mask width in bits
    pub width: u32,
    /// Requested shift of the mask
    pub offset: u32,
    /// Width of the target integer type
    pub bits: u32,
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "width {} + offset {} exceed type width of {} bits",
            self.width, self.offset, self.bits
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for RangeError {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Range: {}+{} > {}", self.width, self.offset, self.bits);
    }
}

/// A flat buffer does not have the length implied by its matrix shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeError {
    /// Actual buffer length
    pub len: usize,
    /// Requested row count
    pub rows: usize,
    /// Requested column count
    pub cols: usize,
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "buffer of {} elements cannot hold a {}x{} matrix",
            self.len, self.rows, self.cols
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ShapeError {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Shape: {} != {}x{}", self.len, self.rows, self.cols);
    }
}

// ============================================================================
// Cursor Errors
// ============================================================================

/// Errors raised while consuming a buffer with a [`Cursor`](crate::cursor::Cursor).
///
/// Sizes are reported in bytes regardless of the cursor's unit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CursorError {
    /// Consuming would read past the end of the buffer
    OutOfBounds {
        /// Bytes requested by the consume call
        requested: usize,
        /// Bytes left in the buffer
        remaining: usize,
    },
    /// Element size is not a multiple of the buffer's unit size
    ElementSize {
        /// Size of the requested element type
        element: usize,
        /// Size of the buffer's unit type
        unit: usize,
    },
    /// The parse ended before the buffer was fully consumed
    TrailingData {
        /// Bytes left over
        remaining: usize,
    },
}

impl fmt::Display for CursorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfBounds { requested, remaining } => {
                write!(
                    f,
                    "consuming {requested} bytes with only {remaining} remaining (possibly check struct packing)"
                )
            }
            Self::ElementSize { element, unit } => {
                write!(f, "element of {element} bytes is not a multiple of the {unit} byte buffer unit")
            }
            Self::TrailingData { remaining } => {
                write!(f, "{remaining} bytes left unconsumed")
            }
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CursorError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::OutOfBounds { requested, remaining } => {
                defmt::write!(f, "OOB: {} > {}", requested, remaining);
            }
            Self::ElementSize { element, unit } => {
                defmt::write!(f, "Elem: {} % {}", element, unit);
            }
            Self::TrailingData { remaining } => {
                defmt::write!(f, "Trailing: {}", remaining);
            }
        }
    }
}

// ============================================================================
// Protocol Errors
// ============================================================================

/// Errors in the board communication protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolError {
    /// Packet does not begin with the expected start byte
    InvalidStart {
        /// Expected start byte
        expected: u8,
        /// Byte found instead
        got: u8,
    },
    /// Unknown command byte
    InvalidCommand {
        /// Unknown command value
        command: u8,
    },
    /// Reply echoes a different command than the one sent
    UnexpectedCommand {
        /// Command that was sent
        expected: u8,
        /// Command echoed in the reply
        got: u8,
    },
    /// CRC mismatch
    ChecksumMismatch {
        /// CRC carried by the packet
        received: u16,
        /// CRC computed over the packet
        computed: u16,
    },
    /// Board answered with a non-zero status
    BoardStatus {
        /// Status code reported by the board
        status: u16,
    },
    /// Payload length exceeds maximum
    PayloadTooLarge {
        /// Announced payload length
        length: usize,
        /// Maximum allowed length
        maximum: usize,
    },
    /// Incomplete packet (not enough bytes)
    IncompletePacket {
        /// Bytes received
        received: usize,
        /// Bytes expected
        expected: usize,
    },
    /// Packet body could not be deserialized
    Cursor(CursorError),
}

impl ProtocolError {
    /// Whether the error means the bytes on the wire are not a valid packet.
    ///
    /// A [`BoardStatus`](Self::BoardStatus) error is the only one that proves the
    /// link works: the packet was intact, the board just refused the command.
    #[must_use]
    pub const fn is_integrity_failure(&self) -> bool {
        !matches!(self, Self::BoardStatus { .. })
    }
}

impl From<CursorError> for ProtocolError {
    fn from(err: CursorError) -> Self {
        Self::Cursor(err)
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidStart { expected, got } => {
                write!(f, "Invalid start byte: expected 0x{expected:02X}, got 0x{got:02X}")
            }
            Self::InvalidCommand { command } => {
                write!(f, "Invalid command: 0x{command:02X}")
            }
            Self::UnexpectedCommand { expected, got } => {
                write!(f, "Unexpected reply: sent 0x{expected:02X}, board answered 0x{got:02X}")
            }
            Self::ChecksumMismatch { received, computed } => {
                write!(f, "CRC mismatch: packet carries 0x{received:04X}, computed 0x{computed:04X}")
            }
            Self::BoardStatus { status } => {
                write!(f, "Board rejected command with status 0x{status:04X}")
            }
            Self::PayloadTooLarge { length, maximum } => {
                write!(f, "Payload too large: {length} bytes (max {maximum})")
            }
            Self::IncompletePacket { received, expected } => {
                write!(f, "Incomplete packet: got {received}/{expected} bytes")
            }
            Self::Cursor(err) => write!(f, "Malformed packet: {err}"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ProtocolError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::InvalidStart { expected, got } => {
                defmt::write!(f, "Bad start: {:02X} != {:02X}", got, expected);
            }
            Self::InvalidCommand { command } => {
                defmt::write!(f, "Bad cmd: {:02X}", command);
            }
            Self::UnexpectedCommand { expected, got } => {
                defmt::write!(f, "Cmd: {:02X} -> {:02X}", expected, got);
            }
            Self::ChecksumMismatch { received, computed } => {
                defmt::write!(f, "CRC: {:04X} != {:04X}", received, computed);
            }
            Self::BoardStatus { status } => {
                defmt::write!(f, "Status: {:04X}", status);
            }
            Self::PayloadTooLarge { length, maximum } => {
                defmt::write!(f, "Payload: {} > {}", length, maximum);
            }
            Self::IncompletePacket { received, expected } => {
                defmt::write!(f, "Incomplete: {}/{}", received, expected);
            }
            Self::Cursor(err) => defmt::write!(f, "Cursor: {}", err),
        }
    }
}

// ============================================================================
// std integration
// ============================================================================

#[cfg(feature = "std")]
impl std::error::Error for RangeError {}

#[cfg(feature = "std")]
impl std::error::Error for ShapeError {}

#[cfg(feature = "std")]
impl std::error::Error for CursorError {}

#[cfg(feature = "std")]
impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Cursor(err) => Some(err),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
