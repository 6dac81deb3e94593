//! Converts byte level size changes on a file into the number of blocks the
//! file gains or gives up.
//!
//! A file of `n` bytes always occupies `ceil(n / block size)` blocks, so only
//! the difference of the two ceilings matters. Appending to a partially filled
//! last block costs nothing until the block overflows.

use crate::error::{Result, SimFsError};
use std::convert::TryFrom;

/// Ceiling division for block counts, with zero bytes needing zero blocks.
///
/// # Panics
///
/// Panics if `block_size` is zero and `bytes` is not.
pub fn ceil_div(bytes: u64, block_size: u64) -> u64 {
    if bytes == 0 {
        0
    } else {
        (bytes - 1) / block_size + 1
    }
}

/// The outcome of resizing a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resize {
    pub size_before: u64,
    pub size_after: u64,
    /// Blocks gained when growing or released when shrinking.
    pub blocks: u64,
}

fn block_size_checked(block_size: u64) -> Result<u64> {
    if block_size == 0 {
        return Err(SimFsError::InvalidConfig(
            "block size must be positive".to_string(),
        ));
    }
    Ok(block_size)
}

fn positive(request: i64) -> Result<u64> {
    match u64::try_from(request) {
        Ok(bytes) if bytes > 0 => Ok(bytes),
        _ => Err(SimFsError::InvalidAmount(request)),
    }
}

/// Computes the blocks a file of `size_before` bytes needs to take on
/// `request` more bytes.
///
/// # Errors
///
/// `InvalidAmount` when `request` is not positive, `Overflow` when the new
/// size does not fit in a `u64` and `InvalidConfig` for a zero block size.
pub fn grow(size_before: u64, request: i64, block_size: u64) -> Result<Resize> {
    let block_size = block_size_checked(block_size)?;
    let request = positive(request)?;
    let size_after = size_before
        .checked_add(request)
        .ok_or(SimFsError::Overflow {
            size: size_before,
            request,
        })?;
    let blocks = if size_before > 0 {
        ceil_div(size_after, block_size) - ceil_div(size_before, block_size)
    } else {
        // Empty files hold no blocks yet.
        ceil_div(size_after, block_size)
    };

    Ok(Resize {
        size_before,
        size_after,
        blocks,
    })
}

/// Computes the blocks a file of `size_before` bytes gives up when `request`
/// bytes are cut from it.
///
/// # Errors
///
/// `InvalidAmount` when `request` is not positive, `Underflow` when it exceeds
/// the file size. `InvalidConfig` for a zero block size.
pub fn shrink(size_before: u64, request: i64, block_size: u64) -> Result<Resize> {
    let block_size = block_size_checked(block_size)?;
    let request = positive(request)?;
    let size_after = size_before
        .checked_sub(request)
        .ok_or(SimFsError::Underflow {
            size: size_before,
            request,
        })?;
    let blocks = if size_after > 0 {
        ceil_div(size_before, block_size) - ceil_div(size_after, block_size)
    } else {
        ceil_div(size_before, block_size)
    };

    Ok(Resize {
        size_before,
        size_after,
        blocks,
    })
}
