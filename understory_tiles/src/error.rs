// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type shared by every fallible grid operation.

use alloc::string::String;

/// Errors raised by region construction, tiling, and grid operations.
///
/// All errors are raised synchronously at the call site; a failed operation
/// leaves the grid unchanged.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// A shape, region, or tile coordinate has the wrong number of dimensions.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Dimension the grid (or first operand) has.
        expected: usize,
        /// Dimension that was supplied.
        found: usize,
    },

    /// The shape is not fully inside the grid's bounding region.
    #[error("shape lies outside the grid bounds")]
    OutOfBounds,

    /// An entry, node, or tile index is past the end.
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// The offending index.
        index: usize,
        /// Number of valid indices.
        len: usize,
    },

    /// Capacity is zero, or the tiling exceeds
    /// [`TileLayout::MAX_TILES`](crate::TileLayout::MAX_TILES).
    #[error("invalid grid capacity")]
    InvalidCapacity,

    /// A low bound is greater than its high bound (or is NaN).
    #[error("low bound exceeds high bound in dimension {dimension}")]
    InvertedBounds {
        /// Dimension with the inverted bounds.
        dimension: usize,
    },

    /// A region or point was built with zero dimensions.
    #[error("a region needs at least one dimension")]
    EmptyDimension,

    /// An internal invariant does not hold.
    #[error("invalid grid state: {0}")]
    InvalidState(String),
}

/// Result alias for grid operations.
pub type Result<T, E = GridError> = core::result::Result<T, E>;
