//! Load-factor policy for the bucket array.
//!
//! Tables with fewer than [`SMALL_TABLE_LIMIT`] buckets are allowed to fill
//! completely before growing. Larger tables grow once they reach a 75% load
//! factor.

/// Smallest bucket count a table grows to on its first insert.
pub const MIN_TABLE_SIZE: usize = 2;

/// Bucket counts below this value use a 100% load factor.
pub const SMALL_TABLE_LIMIT: usize = 16;

/// Largest bucket count a table may reach. Bucket counts are stored as `u32`
/// internally, and this is the largest power of two that fits.
pub const MAX_TABLE_SIZE: usize = 1 << 31;

/// Returns the number of entries a table with `capacity` buckets may hold
/// before the next insert forces it to grow.
///
/// - `0` (the shared empty table) maps to `0`, so any insert grows it.
/// - `1..16` maps to `capacity`.
/// - `16..` maps to `floor(0.75 * capacity)`.
///
/// # Examples
///
/// ```rust
/// use region_map::threshold;
///
/// assert_eq!(threshold(0), 0);
/// assert_eq!(threshold(8), 8);
/// assert_eq!(threshold(16), 12);
/// assert_eq!(threshold(1024), 768);
/// ```
#[inline]
pub const fn threshold(capacity: usize) -> usize {
    if capacity < SMALL_TABLE_LIMIT {
        capacity
    } else {
        // floor(3 * capacity / 4) without overflowing for huge capacities.
        (capacity / 4) * 3 + (capacity % 4) * 3 / 4
    }
}

/// Picks the bucket count to grow to when `required` entries must fit in a
/// table that currently has `current` buckets.
///
/// The result is the smallest power of two that is at least
/// `max(2 * current, MIN_TABLE_SIZE)` and whose [`threshold`] admits
/// `required` entries.
///
/// # Panics
///
/// Panics if the result would exceed [`MAX_TABLE_SIZE`].
#[inline]
pub(crate) fn next_capacity(current: usize, required: usize) -> usize {
    let mut capacity = current
        .checked_mul(2)
        .expect("capacity overflow")
        .max(MIN_TABLE_SIZE)
        .next_power_of_two();

    while threshold(capacity) < required {
        capacity = capacity.checked_mul(2).expect("capacity overflow");
    }

    assert!(
        capacity <= MAX_TABLE_SIZE,
        "bucket count {capacity} exceeds the table ceiling of {MAX_TABLE_SIZE}"
    );
    capacity
}

/// Bucket count needed to hold `len` entries without growing, starting from
/// the empty table.
#[inline]
pub(crate) fn capacity_for(len: usize) -> usize {
    if len == 0 { 0 } else { next_capacity(0, len) }
}
