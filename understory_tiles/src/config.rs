// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Grid construction parameters.

use crate::types::Region;

/// How the root region is divided into tiles.
///
/// Both schemes realize a regular product grid: the number of tiles is the
/// product of the per-dimension tile counts.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TilingScheme {
    /// Grow the tile count of whichever dimension currently has the longest
    /// tiles until the product reaches the requested capacity.
    ///
    /// Tiles come out close to square and the tile count stays close to the
    /// capacity.
    #[default]
    Balanced,
    /// Size every dimension independently as
    /// `floor(capacity * span_i / Σ span) + 1`.
    ///
    /// The product of those counts grows quickly with the dimension; prefer
    /// [`Balanced`][Self::Balanced] above two dimensions.
    Proportional,
}

/// Parameters for [`Grid::with_config`][crate::Grid::with_config].
///
/// ```
/// use understory_tiles::{GridConfig, Region, TilingScheme};
///
/// let bounds = Region::new(&[0.0, 0.0], &[100.0, 100.0]).unwrap();
/// let config = GridConfig::new(bounds, 16).with_tiling(TilingScheme::Proportional);
/// assert_eq!(config.capacity, 16);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct GridConfig<T> {
    /// Bounding region of the whole grid. Shapes outside it are rejected.
    pub region: Region<T>,
    /// Target number of tiles; the realized count may be larger.
    pub capacity: usize,
    /// Tiling scheme.
    pub tiling: TilingScheme,
}

impl<T> GridConfig<T> {
    /// A configuration with the default tiling scheme.
    pub fn new(region: Region<T>, capacity: usize) -> Self {
        Self {
            region,
            capacity,
            tiling: TilingScheme::default(),
        }
    }

    /// Replace the tiling scheme.
    #[must_use]
    pub fn with_tiling(mut self, tiling: TilingScheme) -> Self {
        self.tiling = tiling;
        self
    }
}
