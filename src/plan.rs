//! Volume splitting for transfers that exceed a pipette's working volume.
//!
//! A requested volume larger than what the instrument can hold in one
//! aspiration is divided into the minimum number of near-equal chunks, each
//! within capacity, summing exactly to the request. Planning is a pure
//! function of its two inputs; the caller threads the result through
//! [`crate::transfer::execute_transfer`], which reuses one tip across all
//! chunks.
//!
//! # Examples
//! ```
//! use beadwash::plan::plan_chunks;
//! assert_eq!(plan_chunks(275, 200).unwrap(), vec![138, 137]);
//! assert_eq!(plan_chunks(50, 300).unwrap(), vec![50]);
//! ```

use crate::error::{Error, Result};

/// Split `requested_volume` into `ceil(requested_volume / capacity)` chunks.
///
/// The base chunk is `requested_volume / count`; the remainder is spread one
/// microliter at a time over the first `requested_volume % count` chunks, so
/// chunk sizes differ by at most one. Guarantees on success:
///
/// - the chunks sum to exactly `requested_volume`;
/// - every chunk is positive and no larger than `capacity`;
/// - the chunk count is minimal.
///
/// Fails with [`Error::InvalidVolume`] when either argument is zero.
pub fn plan_chunks(requested_volume: u32, capacity: u32) -> Result<Vec<u32>> {
    if requested_volume == 0 || capacity == 0 {
        return Err(Error::InvalidVolume {
            requested: requested_volume,
            capacity,
        });
    }
    let count = requested_volume.div_ceil(capacity);
    let base = requested_volume / count;
    let remainder = requested_volume % count;
    Ok((0..count)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect())
}
