//! Bit manipulation and matrix transposition (`no_std` compatible)
//!
//! This module provides:
//! - Bit masks, bit swapping, population count and bit reversal over any
//!   unsigned integer width
//! - In-place and out-of-place transposition of flat row-major matrices,
//!   used to deinterleave antenna/chirp data laid out in transport order

use alloc::vec;
use alloc::vec::Vec;
use core::fmt::Debug;
use core::ops::{BitAnd, BitOr, BitXor, Not, Shl, Shr, Sub};

use crate::error::{RangeError, ShapeError};

// ============================================================================
// Unsigned Integer Capability
// ============================================================================

mod sealed {
    pub trait Sealed {}
}

/// Unsigned fixed-width integer.
///
/// Sealed: only the primitive unsigned types implement it, which rules out
/// sign extension in [`reverse_bits`] and friends at compile time.
pub trait UnsignedBits:
    sealed::Sealed
    + Copy
    + Eq
    + Debug
    + Shl<u32, Output = Self>
    + Shr<u32, Output = Self>
    + BitAnd<Output = Self>
    + BitOr<Output = Self>
    + BitXor<Output = Self>
    + Not<Output = Self>
    + Sub<Output = Self>
{
    /// Width of the type in bits
    const BITS: u32;
    /// All bits cleared
    const ZERO: Self;
    /// Only bit 0 set
    const ONE: Self;
    /// All bits set
    const MAX: Self;

    /// Number of set bits.
    fn count_ones(self) -> u32;

    /// Bit order reversed.
    fn reverse_bits(self) -> Self;
}

macro_rules! impl_unsigned_bits {
    ($($t:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $t {}

            impl UnsignedBits for $t {
                const BITS: u32 = <$t>::BITS;
                const ZERO: Self = 0;
                const ONE: Self = 1;
                const MAX: Self = <$t>::MAX;

                #[inline]
                fn count_ones(self) -> u32 {
                    <$t>::count_ones(self)
                }

                #[inline]
                fn reverse_bits(self) -> Self {
                    <$t>::reverse_bits(self)
                }
            }
        )*
    };
}

impl_unsigned_bits!(u8, u16, u32, u64, u128, usize);

// ============================================================================
// Scalar Primitives
// ============================================================================

/// Exchange bits `a` and `b` of `value`.
///
/// Both positions must be below `T::BITS`.
#[inline]
#[must_use]
pub fn swap_bits<T: UnsignedBits>(value: T, a: u32, b: u32) -> T {
    debug_assert!(a < T::BITS && b < T::BITS, "bit position out of range");

    // Only toggle when the two bits differ
    if ((value >> a) ^ (value >> b)) & T::ONE == T::ZERO {
        value
    } else {
        value ^ (T::ONE << a) ^ (T::ONE << b)
    }
}

/// Build a mask of `width` contiguous set bits shifted left by `offset`.
///
/// # Errors
///
/// Returns [`RangeError`] if `width + offset` exceeds `T::BITS`.
pub fn bitmask<T: UnsignedBits>(width: u32, offset: u32) -> Result<T, RangeError> {
    let error = RangeError { width, offset, bits: T::BITS };
    let end = width.checked_add(offset).ok_or(error)?;
    if end > T::BITS {
        return Err(error);
    }

    if width == 0 {
        return Ok(T::ZERO);
    }
    if width == T::BITS {
        return Ok(T::MAX);
    }

    Ok(((T::ONE << width) - T::ONE) << offset)
}

/// Keep only the lowest `bits` bits of `value`.
#[inline]
#[must_use]
pub fn mask_bits<T: UnsignedBits>(value: T, bits: u32) -> T {
    if bits >= T::BITS {
        value
    } else {
        value & ((T::ONE << bits) - T::ONE)
    }
}

/// Count the set bits of `value`.
///
/// Used to derive antenna and channel counts from mask-encoded fields.
#[inline]
#[must_use]
pub fn popcount<T: UnsignedBits>(value: T) -> u32 {
    value.count_ones()
}

/// Reverse the bit order of `value`.
#[inline]
#[must_use]
pub fn reverse_bits<T: UnsignedBits>(value: T) -> T {
    value.reverse_bits()
}

// ============================================================================
// Matrix Transposition
// ============================================================================

/// One bit per element, marking elements already moved to their target.
struct PlacedSet {
    words: Vec<u64>,
}

impl PlacedSet {
    fn new(len: usize) -> Self {
        Self { words: vec![0; len.div_ceil(64)] }
    }

    #[inline]
    fn insert(&mut self, index: usize) {
        self.words[index / 64] |= 1 << (index % 64);
    }

    #[inline]
    fn contains(&self, index: usize) -> bool {
        self.words[index / 64] & (1 << (index % 64)) != 0
    }
}

fn check_shape(len: usize, rows: usize, cols: usize) -> Result<(), ShapeError> {
    match rows.checked_mul(cols) {
        Some(expected) if expected == len => Ok(()),
        _ => Err(ShapeError { len, rows, cols }),
    }
}

/// Transpose a row-major `rows x cols` matrix in place.
///
/// Afterwards `buffer` holds the `cols x rows` transpose in row-major order
/// (equivalently, the original matrix in column-major order). Elements are
/// moved by following permutation cycles, so each one is touched exactly
/// once; a bit set of `rows * cols` bits tracks which are already placed.
///
/// # Errors
///
/// Returns [`ShapeError`] if `buffer.len() != rows * cols`.
pub fn transpose_in_place<T>(buffer: &mut [T], rows: usize, cols: usize) -> Result<(), ShapeError> {
    check_shape(buffer.len(), rows, cols)?;

    // Vectors are their own transpose in flat memory
    if rows <= 1 || cols <= 1 {
        return Ok(());
    }

    // The first and last element never move; every other index i moves to
    // (i * rows) mod (len - 1).
    let last = buffer.len() - 1;
    let mut placed = PlacedSet::new(buffer.len());

    for start in 1..last {
        if placed.contains(start) {
            continue;
        }

        // Park each displaced element at `start` until its target comes round
        let mut index = start;
        loop {
            placed.insert(index);
            let target = ((index as u128 * rows as u128) % last as u128) as usize;
            if target == start {
                break;
            }
            buffer.swap(start, target);
            index = target;
        }
    }

    Ok(())
}

/// Transpose a row-major `rows x cols` matrix from `input` into `output`.
///
/// Copies element by element; use this when a second buffer is acceptable
/// and the input must stay intact.
///
/// # Errors
///
/// Returns [`ShapeError`] if either buffer length differs from `rows * cols`.
pub fn transpose<T: Copy>(input: &[T], output: &mut [T], rows: usize, cols: usize) -> Result<(), ShapeError> {
    check_shape(input.len(), rows, cols)?;
    check_shape(output.len(), rows, cols)?;

    for (row, chunk) in input.chunks_exact(cols.max(1)).enumerate() {
        for (col, &value) in chunk.iter().enumerate() {
            output[col * rows + row] = value;
        }
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
