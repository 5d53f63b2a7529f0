// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Primitive geometry types: scalars, regions, points, and the [`Shape`] abstraction.

use core::cmp::Ordering;
use core::fmt::Debug;

use smallvec::SmallVec;

use crate::error::{GridError, Result};

/// Per-dimension storage. Four dimensions stay inline.
pub(crate) type Coords<T> = SmallVec<[T; 4]>;

/// Numeric scalar abstraction for grid coordinates.
///
/// Beyond plain arithmetic, the grid needs to scale a tile extent by a tile count,
/// divide a span into a number of tiles, and map a coordinate back onto a tile.
/// Ratios used while sizing the tiling are computed in `f64`.
pub trait Scalar: Copy + PartialOrd + Debug {
    /// Add two scalar values.
    fn add(a: Self, b: Self) -> Self;

    /// Subtract two scalar values: a - b.
    fn sub(a: Self, b: Self) -> Self;

    /// Multiply a value by a tile count.
    fn mul_count(v: Self, n: usize) -> Self;

    /// Divide a value by a (non-zero) tile count.
    fn div_count(v: Self, n: usize) -> Self;

    /// Convert a scalar to `f64` for ratio computations.
    fn widen(v: Self) -> f64;

    /// Map a coordinate to a tile coordinate along one axis.
    ///
    /// The result is `floor((value - origin) / tile_size)` clamped to `0..tiles`.
    /// A zero `tile_size` (degenerate axis) always maps to tile 0.
    fn tile_coord(value: Self, origin: Self, tile_size: Self, tiles: usize) -> usize;
}

impl Scalar for f32 {
    #[inline]
    fn add(a: Self, b: Self) -> Self {
        a + b
    }

    #[inline]
    fn sub(a: Self, b: Self) -> Self {
        a - b
    }

    #[allow(
        clippy::cast_precision_loss,
        reason = "Tile counts are far below the range where f32 loses integer precision."
    )]
    #[inline]
    fn mul_count(v: Self, n: usize) -> Self {
        v * n as Self
    }

    #[allow(
        clippy::cast_precision_loss,
        reason = "Tile counts are far below the range where f32 loses integer precision."
    )]
    #[inline]
    fn div_count(v: Self, n: usize) -> Self {
        debug_assert!(n > 0, "cannot divide a span into zero tiles");
        v / n as Self
    }

    #[inline]
    fn widen(v: Self) -> f64 {
        f64::from(v)
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "The value is non-negative here; the saturating cast is clamped right after."
    )]
    #[inline]
    fn tile_coord(value: Self, origin: Self, tile_size: Self, tiles: usize) -> usize {
        debug_assert!(tiles > 0, "an axis always has at least one tile");
        if tile_size <= 0.0 {
            return 0;
        }
        let t = (value - origin) / tile_size;
        // Negative (and NaN) map to the first tile; the cast truncates, i.e. floors.
        let coord = if t > 0.0 { t as usize } else { 0 };
        coord.min(tiles - 1)
    }
}

impl Scalar for f64 {
    #[inline]
    fn add(a: Self, b: Self) -> Self {
        a + b
    }

    #[inline]
    fn sub(a: Self, b: Self) -> Self {
        a - b
    }

    #[allow(
        clippy::cast_precision_loss,
        reason = "Tile counts are far below 2^52."
    )]
    #[inline]
    fn mul_count(v: Self, n: usize) -> Self {
        v * n as Self
    }

    #[allow(
        clippy::cast_precision_loss,
        reason = "Tile counts are far below 2^52."
    )]
    #[inline]
    fn div_count(v: Self, n: usize) -> Self {
        debug_assert!(n > 0, "cannot divide a span into zero tiles");
        v / n as Self
    }

    #[inline(always)]
    fn widen(v: Self) -> f64 {
        v
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "The value is non-negative here; the saturating cast is clamped right after."
    )]
    #[inline]
    fn tile_coord(value: Self, origin: Self, tile_size: Self, tiles: usize) -> usize {
        debug_assert!(tiles > 0, "an axis always has at least one tile");
        if tile_size <= 0.0 {
            return 0;
        }
        let t = (value - origin) / tile_size;
        let coord = if t > 0.0 { t as usize } else { 0 };
        coord.min(tiles - 1)
    }
}

pub(crate) fn min_t<T: PartialOrd + Copy>(a: T, b: T) -> T {
    match a.partial_cmp(&b) {
        Some(Ordering::Greater) => b,
        _ => a,
    }
}

pub(crate) fn max_t<T: PartialOrd + Copy>(a: T, b: T) -> T {
    match a.partial_cmp(&b) {
        Some(Ordering::Less) => b,
        _ => a,
    }
}

/// Axis-aligned hyper-rectangle with per-dimension low/high bounds.
///
/// Bounds are inclusive: a region contains its own edges, and two regions that
/// share only an edge intersect.
#[derive(Clone, Debug, PartialEq)]
pub struct Region<T> {
    low: Coords<T>,
    high: Coords<T>,
}

impl<T: Scalar> Region<T> {
    /// Create a region from its low and high corners.
    ///
    /// # Errors
    ///
    /// - [`GridError::DimensionMismatch`] if the corners have different lengths.
    /// - [`GridError::EmptyDimension`] if the corners are empty.
    /// - [`GridError::InvertedBounds`] if `low[i] > high[i]` (or either is NaN).
    ///
    /// # Examples
    ///
    /// ```
    /// use understory_tiles::Region;
    ///
    /// let r = Region::new(&[0.0, 0.0], &[10.0, 5.0]).unwrap();
    /// assert_eq!(r.dimension(), 2);
    /// assert!(Region::new(&[1.0], &[0.0]).is_err());
    /// ```
    pub fn new(low: &[T], high: &[T]) -> Result<Self> {
        if low.len() != high.len() {
            return Err(GridError::DimensionMismatch {
                expected: low.len(),
                found: high.len(),
            });
        }
        if low.is_empty() {
            return Err(GridError::EmptyDimension);
        }
        for (dimension, (l, h)) in low.iter().zip(high).enumerate() {
            if !matches!(l.partial_cmp(h), Some(Ordering::Less | Ordering::Equal)) {
                return Err(GridError::InvertedBounds { dimension });
            }
        }
        Ok(Self {
            low: Coords::from_slice(low),
            high: Coords::from_slice(high),
        })
    }

    /// Build a region from corners the caller has already validated.
    pub(crate) fn from_corners(low: Coords<T>, high: Coords<T>) -> Self {
        debug_assert_eq!(low.len(), high.len(), "region corners must match");
        Self { low, high }
    }

    /// A zero-extent region at a point.
    pub fn from_point(point: &Point<T>) -> Self {
        Self {
            low: point.coords.clone(),
            high: point.coords.clone(),
        }
    }

    /// Number of dimensions.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.low.len()
    }

    /// Low bound along dimension `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.dimension()`.
    #[inline]
    pub fn low(&self, i: usize) -> T {
        self.low[i]
    }

    /// High bound along dimension `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.dimension()`.
    #[inline]
    pub fn high(&self, i: usize) -> T {
        self.high[i]
    }

    /// The low corner.
    #[inline]
    pub fn lows(&self) -> &[T] {
        &self.low
    }

    /// The high corner.
    #[inline]
    pub fn highs(&self) -> &[T] {
        &self.high
    }

    /// Extent along dimension `i`.
    #[inline]
    pub fn span(&self, i: usize) -> T {
        T::sub(self.high[i], self.low[i])
    }

    /// Whether `other` lies entirely inside this region (edges included).
    pub fn contains(&self, other: &Self) -> bool {
        self.dimension() == other.dimension()
            && (0..self.dimension())
                .all(|i| self.low[i] <= other.low[i] && other.high[i] <= self.high[i])
    }

    /// Whether this region overlaps `other` in every dimension (edges included).
    pub fn intersects(&self, other: &Self) -> bool {
        self.dimension() == other.dimension()
            && (0..self.dimension())
                .all(|i| self.low[i] <= other.high[i] && other.low[i] <= self.high[i])
    }

    /// Whether the point lies inside this region (edges included).
    pub fn contains_point(&self, point: &Point<T>) -> bool {
        self.dimension() == point.dimension()
            && point
                .coords
                .iter()
                .enumerate()
                .all(|(i, &c)| self.low[i] <= c && c <= self.high[i])
    }

    /// The smallest region enclosing both regions.
    ///
    /// Both regions must have the same dimension; extra dimensions are dropped.
    pub fn union(&self, other: &Self) -> Self {
        debug_assert_eq!(
            self.dimension(),
            other.dimension(),
            "union of regions with different dimensions"
        );
        Self {
            low: self
                .low
                .iter()
                .zip(&other.low)
                .map(|(&a, &b)| min_t(a, b))
                .collect(),
            high: self
                .high
                .iter()
                .zip(&other.high)
                .map(|(&a, &b)| max_t(a, b))
                .collect(),
        }
    }

    /// Hyper-volume of the region, widened to `f64`.
    pub fn area(&self) -> f64 {
        (0..self.dimension())
            .map(|i| T::widen(self.span(i)))
            .product()
    }
}

/// A point in N dimensions.
#[derive(Clone, Debug, PartialEq)]
pub struct Point<T> {
    coords: Coords<T>,
}

impl<T: Scalar> Point<T> {
    /// Create a point from its coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::EmptyDimension`] if `coords` is empty.
    pub fn new(coords: &[T]) -> Result<Self> {
        if coords.is_empty() {
            return Err(GridError::EmptyDimension);
        }
        Ok(Self {
            coords: Coords::from_slice(coords),
        })
    }

    /// Number of dimensions.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.coords.len()
    }

    /// The coordinates of the point.
    #[inline]
    pub fn coords(&self) -> &[T] {
        &self.coords
    }
}

/// Anything that can be tested against stored regions.
///
/// Inserted and deleted shapes are reduced to their MBR; queries use the
/// predicates directly, so implementors can refine beyond the MBR.
pub trait Shape<T: Scalar> {
    /// Number of dimensions.
    fn dimension(&self) -> usize;

    /// Minimum bounding region.
    fn mbr(&self) -> Region<T>;

    /// Whether the shape overlaps `region`.
    fn intersects_region(&self, region: &Region<T>) -> bool;

    /// Whether the shape entirely contains `region`.
    fn contains_region(&self, region: &Region<T>) -> bool;
}

impl<T: Scalar> Shape<T> for Region<T> {
    fn dimension(&self) -> usize {
        Self::dimension(self)
    }

    fn mbr(&self) -> Self {
        self.clone()
    }

    fn intersects_region(&self, region: &Self) -> bool {
        self.intersects(region)
    }

    fn contains_region(&self, region: &Self) -> bool {
        self.contains(region)
    }
}

impl<T: Scalar> Shape<T> for Point<T> {
    fn dimension(&self) -> usize {
        Self::dimension(self)
    }

    fn mbr(&self) -> Region<T> {
        Region::from_point(self)
    }

    fn intersects_region(&self, region: &Region<T>) -> bool {
        region.contains_point(self)
    }

    fn contains_region(&self, region: &Region<T>) -> bool {
        region.dimension() == self.dimension()
            && (0..self.dimension())
                .all(|i| region.low(i) == self.coords[i] && region.high(i) == self.coords[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(lx: f64, ly: f64, hx: f64, hy: f64) -> Region<f64> {
        Region::new(&[lx, ly], &[hx, hy]).unwrap()
    }

    #[test]
    fn construction_rejects_bad_corners() {
        assert_eq!(
            Region::new(&[0.0, 0.0], &[1.0]),
            Err(GridError::DimensionMismatch {
                expected: 2,
                found: 1
            })
        );
        assert_eq!(
            Region::<f64>::new(&[], &[]),
            Err(GridError::EmptyDimension)
        );
        assert_eq!(
            Region::new(&[0.0, 5.0], &[1.0, 4.0]),
            Err(GridError::InvertedBounds { dimension: 1 })
        );
        assert_eq!(
            Region::new(&[f64::NAN], &[1.0]),
            Err(GridError::InvertedBounds { dimension: 0 })
        );
    }

    #[test]
    fn containment_and_intersection_include_edges() {
        let outer = rect(0.0, 0.0, 10.0, 10.0);
        assert!(outer.contains(&rect(0.0, 0.0, 10.0, 10.0)));
        assert!(outer.contains(&rect(2.0, 2.0, 3.0, 3.0)));
        assert!(!outer.contains(&rect(5.0, 5.0, 11.0, 6.0)));

        assert!(outer.intersects(&rect(10.0, 0.0, 20.0, 10.0)));
        assert!(!outer.intersects(&rect(11.0, 0.0, 20.0, 10.0)));
    }

    #[test]
    fn predicates_are_false_across_dimensions() {
        let flat = rect(0.0, 0.0, 10.0, 10.0);
        let cube = Region::new(&[0.0, 0.0, 0.0], &[1.0, 1.0, 1.0]).unwrap();
        assert!(!flat.contains(&cube));
        assert!(!flat.intersects(&cube));
        assert!(!flat.contains_point(&Point::new(&[1.0]).unwrap()));
    }

    #[test]
    fn union_and_area() {
        let a = rect(0.0, 0.0, 2.0, 3.0);
        let b = rect(1.0, -1.0, 4.0, 2.0);
        let u = a.union(&b);
        assert_eq!(u, rect(0.0, -1.0, 4.0, 3.0));
        assert!((u.area() - 16.0).abs() < 1e-10);
        assert!(rect(1.0, 1.0, 1.0, 5.0).area().abs() < 1e-10);
    }

    #[test]
    fn point_shape_semantics() {
        let p = Point::new(&[3.0_f32, 4.0]).unwrap();
        let mbr = p.mbr();
        assert_eq!(mbr.lows(), mbr.highs());
        assert!(p.intersects_region(&Region::new(&[0.0, 0.0], &[3.0, 4.0]).unwrap()));
        assert!(p.contains_region(&mbr));
        assert!(!p.contains_region(&Region::new(&[3.0, 4.0], &[3.5, 4.0]).unwrap()));
    }

    #[test]
    fn tile_coord_floors_and_clamps() {
        assert_eq!(f64::tile_coord(0.0, 0.0, 25.0, 4), 0);
        assert_eq!(f64::tile_coord(24.9, 0.0, 25.0, 4), 0);
        assert_eq!(f64::tile_coord(25.0, 0.0, 25.0, 4), 1);
        assert_eq!(f64::tile_coord(100.0, 0.0, 25.0, 4), 3);
        assert_eq!(f64::tile_coord(-3.0, 0.0, 25.0, 4), 0);
        assert_eq!(f64::tile_coord(1e300, 0.0, 1.0, 7), 6);
        assert_eq!(f32::tile_coord(5.0, 5.0, 0.0, 1), 0);
        assert_eq!(f32::tile_coord(f32::NAN, 0.0, 1.0, 3), 0);
    }
}
