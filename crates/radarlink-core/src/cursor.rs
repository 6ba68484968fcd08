//! Forward-only, bounds-checked deserialization cursor
//!
//! Hardware frames are flat byte blobs whose layout is only known by
//! convention. A [`Cursor`] walks such a buffer once, front to back, and every
//! consume call states exactly how much it claims. The single bounds check
//! lives here, so truncated or malformed transport data surfaces as a
//! [`CursorError`] instead of an over-read.

use core::mem::size_of;

use bytemuck::Pod;

use crate::error::CursorError;

/// Sequential reader over a caller-owned buffer of `U` units.
///
/// `U` is the buffer's atomic unit: `u8` for byte streams, `u16`/`u32` for
/// word-oriented DMA buffers. Consumed element types must be a whole number of
/// units wide.
#[derive(Clone, Debug)]
pub struct Cursor<'a, U: Pod = u8> {
    data: &'a [U],
    position: usize,
}

impl<'a, U: Pod> Cursor<'a, U> {
    /// Create a cursor over the whole of `data`.
    #[must_use]
    pub const fn new(data: &'a [U]) -> Self {
        Self { data, position: 0 }
    }

    /// Create a cursor over the first `size` units of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`CursorError::OutOfBounds`] if `size` exceeds `data.len()`.
    pub fn with_size(data: &'a [U], size: usize) -> Result<Self, CursorError> {
        if size > data.len() {
            return Err(CursorError::OutOfBounds {
                requested: size.saturating_mul(size_of::<U>()),
                remaining: data.len() * size_of::<U>(),
            });
        }
        Ok(Self::new(&data[..size]))
    }

    /// Current position in units.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Units left before the end bound.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// True iff the whole buffer has been consumed.
    #[must_use]
    pub const fn finished(&self) -> bool {
        self.position == self.data.len()
    }

    /// Require that the whole buffer has been consumed.
    ///
    /// # Errors
    ///
    /// Returns [`CursorError::TrailingData`] if units are left over.
    pub const fn finish(&self) -> Result<(), CursorError> {
        if self.finished() {
            Ok(())
        } else {
            Err(CursorError::TrailingData { remaining: self.remaining() * size_of::<U>() })
        }
    }

    /// Copy `dest.len()` elements of `T` out of the buffer.
    ///
    /// Advances by `dest.len() * size_of::<T>() / size_of::<U>()` units. The
    /// copy is bytewise, so the source does not need to be aligned for `T`.
    ///
    /// # Errors
    ///
    /// - [`CursorError::ElementSize`] if `T` is not a whole number of units
    /// - [`CursorError::OutOfBounds`] if fewer units remain than requested
    ///
    /// On error the position is unchanged.
    pub fn consume_into<T: Pod>(&mut self, dest: &mut [T]) -> Result<(), CursorError> {
        let unit = size_of::<U>();
        let element = size_of::<T>();
        if unit == 0 || element == 0 || element % unit != 0 {
            return Err(CursorError::ElementSize { element, unit });
        }

        let units = dest.len() * (element / unit);
        if units > self.remaining() {
            return Err(CursorError::OutOfBounds {
                requested: units * unit,
                remaining: self.remaining() * unit,
            });
        }

        let source = &self.data[self.position..self.position + units];
        bytemuck::cast_slice_mut::<T, u8>(dest).copy_from_slice(bytemuck::cast_slice::<U, u8>(source));
        self.position += units;

        Ok(())
    }

    /// Consume a single scalar or `#[repr(C, packed)]` struct.
    ///
    /// # Errors
    ///
    /// See [`consume_into`](Self::consume_into).
    pub fn consume<T: Pod>(&mut self) -> Result<T, CursorError> {
        let mut value = T::zeroed();
        self.consume_into(core::slice::from_mut(&mut value))?;
        Ok(value)
    }
}

impl<'a> Cursor<'a, u8> {
    /// Borrow the next `count` bytes and advance past them.
    ///
    /// # Errors
    ///
    /// Returns [`CursorError::OutOfBounds`] if fewer than `count` bytes remain.
    pub fn consume_bytes(&mut self, count: usize) -> Result<&'a [u8], CursorError> {
        if count > self.remaining() {
            return Err(CursorError::OutOfBounds { requested: count, remaining: self.remaining() });
        }
        let bytes = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(bytes)
    }

    /// Consume one byte.
    ///
    /// # Errors
    ///
    /// Returns [`CursorError::OutOfBounds`] at the end of the buffer.
    pub fn consume_u8(&mut self) -> Result<u8, CursorError> {
        self.consume()
    }

    /// Consume a little-endian `u16`.
    ///
    /// # Errors
    ///
    /// Returns [`CursorError::OutOfBounds`] if fewer than 2 bytes remain.
    pub fn consume_u16_le(&mut self) -> Result<u16, CursorError> {
        self.consume::<[u8; 2]>().map(u16::from_le_bytes)
    }

    /// Consume a little-endian `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`CursorError::OutOfBounds`] if fewer than 4 bytes remain.
    pub fn consume_u32_le(&mut self) -> Result<u32, CursorError> {
        self.consume::<[u8; 4]>().map(u32::from_le_bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C, packed)]
    #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
    struct Header {
        tag: u8,
        flags: u8,
        length: u16,
    }

    #[test]
    fn test_consume_scalars_exactly() {
        let bytes = [0x01, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12];
        let mut cursor = Cursor::new(&bytes);

        assert_eq!(cursor.consume_u8().unwrap(), 0x01);
        assert_eq!(cursor.consume_u16_le().unwrap(), 0x1234);
        assert!(!cursor.finished());
        assert_eq!(cursor.consume_u32_le().unwrap(), 0x1234_5678);
        assert!(cursor.finished());
        assert!(cursor.finish().is_ok());
    }

    #[test]
    fn test_consume_packed_struct() {
        let length: u16 = 0x0203;
        let mut bytes = [0xAA, 0x01, 0, 0, 0xFF];
        bytes[2..4].copy_from_slice(&length.to_ne_bytes());

        let mut cursor = Cursor::new(&bytes);
        let header: Header = cursor.consume().unwrap();

        assert_eq!(header.tag, 0xAA);
        assert_eq!(header.flags, 0x01);
        assert_eq!({ header.length }, 0x0203);
        assert_eq!(cursor.position(), 4);
        assert_eq!(cursor.finish(), Err(CursorError::TrailingData { remaining: 1 }));
    }

    #[test]
    fn test_out_of_bounds_leaves_position() {
        let bytes = [1u8, 2, 3];
        let mut cursor = Cursor::new(&bytes);
        cursor.consume_u8().unwrap();

        let mut dest = [0u16; 2];
        let err = cursor.consume_into(&mut dest).unwrap_err();
        assert_eq!(err, CursorError::OutOfBounds { requested: 4, remaining: 2 });
        assert_eq!(cursor.position(), 1);

        // The remaining two bytes are still there
        assert_eq!(cursor.consume_bytes(2).unwrap(), &[2, 3]);
        assert!(cursor.finished());
        assert!(cursor.consume_u8().is_err());
    }

    #[test]
    fn test_word_buffer_rejects_narrow_elements() {
        let words = [0x1122_3344u32, 0x5566_7788];
        let mut cursor = Cursor::new(&words);

        // A u16 is half a unit: rejected before any copy
        let err = cursor.consume::<u16>().unwrap_err();
        assert_eq!(err, CursorError::ElementSize { element: 2, unit: 4 });
        assert_eq!(cursor.position(), 0);

        // A u64 spans two units
        let both: u64 = cursor.consume().unwrap();
        assert_eq!(both.to_ne_bytes()[..4], 0x1122_3344u32.to_ne_bytes());
        assert!(cursor.finished());
    }

    #[test]
    fn test_with_size_bounds() {
        let bytes = [0u8; 8];
        let cursor = Cursor::with_size(&bytes, 6).unwrap();
        assert_eq!(cursor.remaining(), 6);

        assert!(matches!(
            Cursor::with_size(&bytes, 9),
            Err(CursorError::OutOfBounds { requested: 9, remaining: 8 })
        ));
    }

    #[test]
    fn test_with_size_reports_huge_sizes() {
        let words = [0u16; 2];
        assert!(matches!(
            Cursor::with_size(&words, usize::MAX),
            Err(CursorError::OutOfBounds { requested: usize::MAX, remaining: 4 })
        ));
    }

    #[test]
    fn test_empty_consume_is_noop() {
        let bytes: [u8; 0] = [];
        let mut cursor = Cursor::new(&bytes);
        let mut dest: [u32; 0] = [];

        cursor.consume_into(&mut dest).unwrap();
        assert!(cursor.finished());
    }
}
