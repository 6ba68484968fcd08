//! Radarlink Core - `no_std` compatible protocol and parsing primitives
//!
//! This crate provides the leaf building blocks for talking to a radar sensor
//! board. It is designed to work in `no_std` environments (with `alloc`) as
//! well as `std` environments.
//!
//! # Modules
//!
//! - [`bits`]: Bit manipulation and array transposition for deinterleaving
//! - [`cursor`]: Bounds-checked, forward-only deserialization of byte buffers
//! - [`protocol`]: Wire format for probe requests, replies and frame packets
//! - [`error`]: Error types for the modules above
//!
//! # Features
//!
//! - `std`: Implement `std::error::Error` for all error types
//! - `defmt`: Enable `defmt` formatting for embedded logging
//!
//! # Example
//!
//! ```rust
//! use radarlink_core::bits::{bitmask, popcount};
//! use radarlink_core::cursor::Cursor;
//!
//! // Antenna count from an rx mask
//! assert_eq!(popcount(0b0000_0101u8), 2);
//! assert_eq!(bitmask::<u8>(4, 2).unwrap(), 0b0011_1100);
//!
//! // Read a little-endian header field and check the buffer was consumed
//! let bytes = [0x34, 0x12];
//! let mut cursor = Cursor::new(&bytes);
//! assert_eq!(cursor.consume_u16_le().unwrap(), 0x1234);
//! assert!(cursor.finished());
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod bits;
pub mod cursor;
pub mod error;
pub mod protocol;

// Re-export commonly used types at crate root
pub use bits::{bitmask, popcount, reverse_bits, swap_bits, transpose, transpose_in_place, UnsignedBits};
pub use cursor::Cursor;
pub use error::{CursorError, ProtocolError, RangeError, ShapeError};
pub use protocol::{BoardInfo, Command, FrameHeader, Reply, Request};
