// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tile partition of the root region.
//!
//! The root region is cut into a regular grid of `Π tiles_number[i]` tiles. Tile
//! coordinates are per-dimension indices; node ids are their mixed-radix encoding
//! with dimension 0 varying fastest, which is also the order [`TileLayout`]
//! creates leaves in.

use alloc::vec::Vec;

use smallvec::{SmallVec, smallvec};

use crate::config::TilingScheme;
use crate::error::{GridError, Result};
use crate::node::Node;
use crate::types::{Coords, Region, Scalar, max_t, min_t};

/// Tile counts and sizes for a bounding region. Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct TileLayout<T> {
    region: Region<T>,
    capacity: usize,
    scheme: TilingScheme,
    tiles_number: Coords<usize>,
    tiles_size: Coords<T>,
    tile_count: usize,
}

impl<T: Scalar> TileLayout<T> {
    /// Largest number of tiles a layout may realize.
    pub const MAX_TILES: usize = 1 << 24;

    /// Compute the tiling of `region` for a target `capacity`.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidCapacity`] if `capacity` is zero, or if
    /// `capacity` or the realized tile count exceeds [`MAX_TILES`][Self::MAX_TILES].
    ///
    /// # Examples
    ///
    /// ```
    /// use understory_tiles::{Region, TileLayout, TilingScheme};
    ///
    /// let bounds = Region::new(&[0.0, 0.0], &[100.0, 100.0]).unwrap();
    /// let layout = TileLayout::new(bounds, 4, TilingScheme::Balanced).unwrap();
    /// assert_eq!(layout.tiles_number(), &[2, 2]);
    /// assert_eq!(layout.tiles_size(), &[50.0, 50.0]);
    /// ```
    pub fn new(region: Region<T>, capacity: usize, scheme: TilingScheme) -> Result<Self> {
        if capacity == 0 || capacity > Self::MAX_TILES {
            return Err(GridError::InvalidCapacity);
        }
        let spans: Coords<f64> = (0..region.dimension())
            .map(|i| T::widen(region.span(i)))
            .collect();
        let tiles_number = match scheme {
            TilingScheme::Proportional => proportional_counts(&spans, capacity),
            TilingScheme::Balanced => balanced_counts(&spans, capacity),
        };
        let tile_count = tiles_number
            .iter()
            .try_fold(1_usize, |acc, &n| acc.checked_mul(n))
            .filter(|&count| count <= Self::MAX_TILES)
            .ok_or(GridError::InvalidCapacity)?;
        let tiles_size = tiles_number
            .iter()
            .enumerate()
            .map(|(i, &n)| T::div_count(region.span(i), n))
            .collect();

        log::debug!(
            "tiling {:?}: {} tiles {:?} for capacity {}",
            scheme,
            tile_count,
            tiles_number.as_slice(),
            capacity
        );

        Ok(Self {
            region,
            capacity,
            scheme,
            tiles_number,
            tiles_size,
            tile_count,
        })
    }

    /// The partitioned region.
    #[inline]
    pub fn region(&self) -> &Region<T> {
        &self.region
    }

    /// Number of dimensions.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.region.dimension()
    }

    /// The capacity this layout was requested with.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The scheme this layout was computed with.
    #[inline]
    pub fn scheme(&self) -> TilingScheme {
        self.scheme
    }

    /// Tile count per dimension.
    #[inline]
    pub fn tiles_number(&self) -> &[usize] {
        &self.tiles_number
    }

    /// Tile extent per dimension.
    #[inline]
    pub fn tiles_size(&self) -> &[T] {
        &self.tiles_size
    }

    /// Total number of tiles, i.e. the product of [`tiles_number`][Self::tiles_number].
    #[inline]
    pub fn tile_count(&self) -> usize {
        self.tile_count
    }

    fn check_dimension(&self, found: usize) -> Result<()> {
        if found == self.dimension() {
            Ok(())
        } else {
            Err(GridError::DimensionMismatch {
                expected: self.dimension(),
                found,
            })
        }
    }

    /// Flatten a tile coordinate into a node id: `Σ index[i] * Π tiles_number[..i]`.
    ///
    /// # Errors
    ///
    /// - [`GridError::DimensionMismatch`] if `index` has the wrong length.
    /// - [`GridError::IndexOutOfBounds`] if `index[i] >= tiles_number[i]`.
    pub fn grid_index_to_node_id(&self, index: &[usize]) -> Result<usize> {
        self.check_dimension(index.len())?;
        let mut id = 0;
        let mut stride = 1;
        for (&i, &n) in index.iter().zip(&self.tiles_number) {
            if i >= n {
                return Err(GridError::IndexOutOfBounds { index: i, len: n });
            }
            id += i * stride;
            stride *= n;
        }
        Ok(id)
    }

    /// Inverse of [`grid_index_to_node_id`][Self::grid_index_to_node_id].
    ///
    /// # Errors
    ///
    /// Returns [`GridError::IndexOutOfBounds`] if `id >= tile_count()`.
    pub fn node_id_to_grid_index(&self, id: usize) -> Result<SmallVec<[usize; 4]>> {
        if id >= self.tile_count {
            return Err(GridError::IndexOutOfBounds {
                index: id,
                len: self.tile_count,
            });
        }
        let mut rest = id;
        Ok(self
            .tiles_number
            .iter()
            .map(|&n| {
                let i = rest % n;
                rest /= n;
                i
            })
            .collect())
    }

    /// Tile coordinate of a position, floored and clamped into the grid.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::DimensionMismatch`] if `coords` has the wrong length.
    pub fn tile_index_of(&self, coords: &[T]) -> Result<SmallVec<[usize; 4]>> {
        self.check_dimension(coords.len())?;
        Ok(coords
            .iter()
            .enumerate()
            .map(|(i, &c)| self.axis_coord(i, c))
            .collect())
    }

    /// Region covered by one tile.
    ///
    /// # Errors
    ///
    /// Fails like [`grid_index_to_node_id`][Self::grid_index_to_node_id].
    pub fn tile_region(&self, index: &[usize]) -> Result<Region<T>> {
        self.grid_index_to_node_id(index)?;
        Ok(self.region_of(index))
    }

    /// Tiles a region may overlap, as a cursor over an inclusive tile range.
    ///
    /// The range is clipped to the grid and padded by one tile on each side so
    /// that rounding at tile edges never drops a tile; callers refine with exact
    /// region tests. Returns `None` when the region misses the grid entirely.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::DimensionMismatch`] if `region` has the wrong dimension.
    pub fn find_matching_tiles(&self, region: &Region<T>) -> Result<Option<TileCursor>> {
        self.check_dimension(region.dimension())?;
        if !self.region.intersects(region) {
            return Ok(None);
        }
        let mut start = Coords::new();
        let mut end = Coords::new();
        for i in 0..self.dimension() {
            let lo = max_t(region.low(i), self.region.low(i));
            let hi = min_t(region.high(i), self.region.high(i));
            start.push(self.axis_coord(i, lo).saturating_sub(1));
            end.push((self.axis_coord(i, hi) + 1).min(self.tiles_number[i] - 1));
        }
        Ok(Some(TileCursor::from_range(start, end)))
    }

    /// Create one leaf per tile, ids in mixed-radix order starting at 0.
    pub(crate) fn split<P>(&self) -> Result<Vec<Node<T, P>>> {
        let mut leaves = Vec::new();
        leaves
            .try_reserve_exact(self.tile_count)
            .map_err(|_| GridError::InvalidCapacity)?;
        let last = self.tiles_number.iter().map(|&n| n - 1).collect();
        let mut cursor = TileCursor::from_range(smallvec![0; self.dimension()], last);
        loop {
            let id = leaves.len();
            debug_assert_eq!(
                self.grid_index_to_node_id(cursor.position()),
                Ok(id),
                "leaf order must follow the mixed-radix encoding"
            );
            leaves.push(Node::leaf(id, self.region_of(cursor.position())));
            if !cursor.increment() {
                break;
            }
        }
        debug_assert_eq!(leaves.len(), self.tile_count, "one leaf per tile");
        Ok(leaves)
    }

    fn axis_coord(&self, axis: usize, value: T) -> usize {
        T::tile_coord(
            value,
            self.region.low(axis),
            self.tiles_size[axis],
            self.tiles_number[axis],
        )
    }

    // `index` must already be in range.
    fn region_of(&self, index: &[usize]) -> Region<T> {
        let mut low = Coords::with_capacity(index.len());
        let mut high = Coords::with_capacity(index.len());
        for (axis, &i) in index.iter().enumerate() {
            let origin = self.region.low(axis);
            let size = self.tiles_size[axis];
            let lo = if i == 0 {
                origin
            } else {
                T::add(origin, T::mul_count(size, i))
            };
            // The last tile ends exactly on the grid bound.
            let hi = if i + 1 == self.tiles_number[axis] {
                self.region.high(axis)
            } else {
                T::add(origin, T::mul_count(size, i + 1))
            };
            low.push(lo);
            high.push(max_t(lo, hi));
        }
        Region::from_corners(low, high)
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "The ratio is non-negative; the saturating cast is the floor."
)]
fn proportional_counts(spans: &[f64], capacity: usize) -> Coords<usize> {
    let total: f64 = spans.iter().sum();
    if total <= 0.0 {
        return smallvec![1; spans.len()];
    }
    spans
        .iter()
        .map(|&span| ((capacity as f64 * span / total) as usize).saturating_add(1))
        .collect()
}

fn balanced_counts(spans: &[f64], capacity: usize) -> Coords<usize> {
    let mut counts: Coords<usize> = smallvec![1; spans.len()];
    let mut product = 1_usize;
    while product < capacity {
        // Split the dimension with the longest tiles; ties go to the lower dimension.
        let mut widest = None;
        let mut widest_extent = 0.0;
        for (axis, (&span, &n)) in spans.iter().zip(&counts).enumerate() {
            let extent = span / n as f64;
            if extent > widest_extent {
                widest = Some(axis);
                widest_extent = extent;
            }
        }
        let Some(axis) = widest else {
            // Every dimension is degenerate; a single tile covers the region.
            break;
        };
        product = (product / counts[axis]).saturating_mul(counts[axis] + 1);
        counts[axis] += 1;
    }
    counts
}

/// Cursor over an inclusive, multi-dimensional range of tile coordinates.
///
/// Dimension 0 varies fastest.
///
/// ```
/// use understory_tiles::TileCursor;
///
/// let mut cursor = TileCursor::new(&[0, 0], &[1, 1]).unwrap();
/// let mut seen = vec![cursor.position().to_vec()];
/// while cursor.increment() {
///     seen.push(cursor.position().to_vec());
/// }
/// assert_eq!(seen, [[0, 0], [1, 0], [0, 1], [1, 1]]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileCursor {
    start: Coords<usize>,
    end: Coords<usize>,
    position: Coords<usize>,
}

impl TileCursor {
    /// A cursor positioned at `start`, ending at `end` (inclusive).
    ///
    /// # Errors
    ///
    /// - [`GridError::DimensionMismatch`] if the bounds have different lengths.
    /// - [`GridError::EmptyDimension`] if the bounds are empty.
    /// - [`GridError::IndexOutOfBounds`] if `start[i] > end[i]`.
    pub fn new(start: &[usize], end: &[usize]) -> Result<Self> {
        if start.len() != end.len() {
            return Err(GridError::DimensionMismatch {
                expected: start.len(),
                found: end.len(),
            });
        }
        if start.is_empty() {
            return Err(GridError::EmptyDimension);
        }
        if let Some((&s, &e)) = start.iter().zip(end).find(|(s, e)| s > e) {
            return Err(GridError::IndexOutOfBounds {
                index: s,
                len: e + 1,
            });
        }
        Ok(Self::from_range(
            Coords::from_slice(start),
            Coords::from_slice(end),
        ))
    }

    fn from_range(start: Coords<usize>, end: Coords<usize>) -> Self {
        Self {
            position: start.clone(),
            start,
            end,
        }
    }

    /// Number of dimensions.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.position.len()
    }

    /// Current tile coordinate.
    #[inline]
    pub fn position(&self) -> &[usize] {
        &self.position
    }

    /// First tile coordinate of the range.
    #[inline]
    pub fn start(&self) -> &[usize] {
        &self.start
    }

    /// Last tile coordinate of the range (inclusive).
    #[inline]
    pub fn end(&self) -> &[usize] {
        &self.end
    }

    /// Number of tile coordinates in the range.
    pub fn tile_count(&self) -> usize {
        self.start
            .iter()
            .zip(&self.end)
            .map(|(s, e)| e - s + 1)
            .product()
    }

    /// Advance to the next coordinate.
    ///
    /// Returns `false` once the range is exhausted, leaving the cursor back at `start`.
    pub fn increment(&mut self) -> bool {
        for axis in 0..self.position.len() {
            if self.position[axis] < self.end[axis] {
                self.position[axis] += 1;
                return true;
            }
            self.position[axis] = self.start[axis];
        }
        false
    }
}
