//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Widen a slot or gate count to `f32`, allowing precision loss in one place.
#[must_use]
pub fn usize_to_f32(value: usize) -> f32 {
    cast::<usize, f32>(value).unwrap_or(f32::MAX)
}

/// Widen a `u32` gate count to `f32`.
#[must_use]
pub fn u32_to_f32(value: u32) -> f32 {
    cast::<u32, f32>(value).unwrap_or(f32::MAX)
}

/// Convert a `u32` index to `usize`.
#[must_use]
pub fn u32_to_usize(value: u32) -> usize {
    cast::<u32, usize>(value).unwrap_or(usize::MAX)
}

/// Convert a `usize` index to `u32`, saturating at `u32::MAX`.
#[must_use]
pub fn usize_to_u32(value: usize) -> u32 {
    cast::<usize, u32>(value).unwrap_or(u32::MAX)
}

/// Convert a non-negative `i64` draw to `usize`, returning 0 for negatives.
#[must_use]
pub fn i64_to_usize(value: i64) -> usize {
    cast::<i64, usize>(value).unwrap_or(0)
}
