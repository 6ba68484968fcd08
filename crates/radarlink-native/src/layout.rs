//! Frame layout decoding
//!
//! The board streams raw ADC samples in acquisition order: for every chirp,
//! for every sample, one value per enabled receive antenna. Processing wants
//! one contiguous block per antenna, so [`FrameLayout::deinterleave`]
//! transposes the `(chirp * sample) x rx` matrix in place.

use serde::{Deserialize, Serialize};

use radarlink_core::bits::{bitmask, mask_bits, popcount, transpose_in_place};
use radarlink_core::cursor::Cursor;

use crate::error::LayoutError;
use crate::frame::Frame;

/// Encoding of samples in the frame payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleFormat {
    /// One sample per little-endian `u16`
    U16,
    /// Two 12-bit samples per 3 bytes, low sample first
    Packed12,
}

/// Acquisition geometry of a frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameLayout {
    /// Bitmask of enabled receive antennas
    pub rx_mask: u32,
    /// Chirps per frame
    pub num_chirps: usize,
    /// Samples per chirp and antenna
    pub num_samples_per_chirp: usize,
    /// ADC resolution; higher bits of `U16` samples are ignored
    pub sample_bits: u32,
    /// Payload encoding
    pub sample_format: SampleFormat,
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self {
            rx_mask: 0b111,
            num_chirps: 32,
            num_samples_per_chirp: 64,
            sample_bits: 12,
            sample_format: SampleFormat::U16,
        }
    }
}

impl FrameLayout {
    /// Number of enabled receive antennas.
    #[must_use]
    pub fn num_rx(&self) -> usize {
        popcount(self.rx_mask) as usize
    }

    /// Indices of the enabled receive antennas, ascending.
    #[must_use]
    pub fn antennas(&self) -> Vec<u32> {
        (0..u32::BITS).filter(|bit| self.rx_mask & (1 << bit) != 0).collect()
    }

    /// Samples per antenna in one frame.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::TooLarge`] if the count does not fit in `usize`.
    pub fn samples_per_antenna(&self) -> Result<usize, LayoutError> {
        self.num_chirps.checked_mul(self.num_samples_per_chirp).ok_or(LayoutError::TooLarge)
    }

    /// Total samples in one frame.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::TooLarge`] if the count does not fit in `usize`.
    pub fn samples_per_frame(&self) -> Result<usize, LayoutError> {
        self.samples_per_antenna()?.checked_mul(self.num_rx()).ok_or(LayoutError::TooLarge)
    }

    /// Payload size implied by the layout.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::TooLarge`] if the size does not fit in `usize`.
    pub fn expected_payload_len(&self) -> Result<usize, LayoutError> {
        let samples = self.samples_per_frame()?;
        let len = match self.sample_format {
            SampleFormat::U16 => samples.checked_mul(2),
            SampleFormat::Packed12 => samples.div_ceil(2).checked_mul(3),
        };
        len.ok_or(LayoutError::TooLarge)
    }

    /// Decode a frame payload into samples in acquisition order.
    ///
    /// # Errors
    ///
    /// Returns error if no antenna is enabled, the layout is too large to
    /// address or the payload size does not match it.
    pub fn decode_samples(&self, payload: &[u8]) -> Result<Vec<u16>, LayoutError> {
        if self.num_rx() == 0 {
            return Err(LayoutError::NoAntennas);
        }
        let expected = self.expected_payload_len()?;
        if payload.len() != expected {
            return Err(LayoutError::PayloadLength { expected, actual: payload.len() });
        }

        let count = self.samples_per_frame()?;
        let mut cursor = Cursor::new(payload);

        let samples = match self.sample_format {
            SampleFormat::U16 => {
                let mut samples = vec![0u16; count];
                cursor.consume_into(&mut samples)?;
                for sample in &mut samples {
                    *sample = mask_bits(u16::from_le(*sample), self.sample_bits);
                }
                samples
            }
            SampleFormat::Packed12 => {
                let mask = bitmask::<u32>(12, 0)?;
                let mut samples = Vec::with_capacity(count + 1);
                while samples.len() < count {
                    let [b0, b1, b2]: [u8; 3] = cursor.consume()?;
                    let word = u32::from_le_bytes([b0, b1, b2, 0]);
                    samples.push((word & mask) as u16);
                    samples.push(((word >> 12) & mask) as u16);
                }
                samples.truncate(count);
                samples
            }
        };

        cursor.finish()?;
        Ok(samples)
    }

    /// Reorder samples from `[chirp][sample][rx]` to `[rx][chirp][sample]`.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::Shape`] if `samples` does not hold exactly one
    /// frame, or [`LayoutError::TooLarge`] if the layout cannot be addressed.
    pub fn deinterleave(&self, samples: &mut [u16]) -> Result<(), LayoutError> {
        let rows = self.samples_per_antenna()?;
        transpose_in_place(samples, rows, self.num_rx())?;
        Ok(())
    }

    /// Decode and deinterleave a frame.
    ///
    /// # Errors
    ///
    /// See [`decode_samples`](Self::decode_samples).
    pub fn decode_frame(&self, frame: &Frame) -> Result<Vec<u16>, LayoutError> {
        let mut samples = self.decode_samples(&frame.payload)?;
        self.deinterleave(&mut samples)?;
        Ok(samples)
    }

    /// The block of one antenna in deinterleaved samples.
    #[must_use]
    pub fn antenna_block<'s>(&self, samples: &'s [u16], rx: usize) -> Option<&'s [u16]> {
        let block = self.samples_per_antenna().ok()?;
        let start = rx.checked_mul(block)?;
        samples.get(start..start.checked_add(block)?)
    }
}
