// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_tiles --heading-base-level=0

//! Understory Tiles: a fixed-tile spatial grid index over N-dimensional regions.
//!
//! Understory Tiles is a small, predictable spatial index for data that lives inside
//! known bounds.
//!
//! - The bounding region is split once into a regular grid of tiles, sized from a
//!   target capacity.
//! - Each entry is an `(id, region, payload)` triple stored in the single tile that
//!   fully contains it; entries crossing tile boundaries are stored at the root.
//! - Queries scan the root and the tiles they touch, testing intersection or
//!   containment against every entry there.
//!
//! There is no rebalancing and no re-tiling: [`Grid::flush`] drops every entry and
//! keeps the same tiling. Shapes outside the bounds are rejected rather
//! than growing the grid.
//!
//! # Example
//!
//! ```rust
//! use understory_tiles::{Grid, Point, Region};
//!
//! let bounds = Region::new(&[0.0, 0.0], &[100.0, 100.0]).unwrap();
//! let mut grid: Grid<f64, &str> = Grid::new(bounds, 4).unwrap();
//!
//! // A small box fits in one tile; a box across the centre goes to the root.
//! let small = Region::new(&[10.0, 10.0], &[20.0, 20.0]).unwrap();
//! let wide = Region::new(&[40.0, 40.0], &[60.0, 60.0]).unwrap();
//! let leaf = grid.insert_data("small", &small, 1).unwrap();
//! let root = grid.insert_data("wide", &wide, 2).unwrap();
//! assert!(grid.node(leaf).unwrap().is_leaf());
//! assert_eq!(root, grid.root().id());
//!
//! // Containment: only entries fully inside the query.
//! let query = Region::new(&[0.0, 0.0], &[30.0, 30.0]).unwrap();
//! let mut found = Vec::new();
//! grid.containment_query(&query, |d| found.push(*d.payload())).unwrap();
//! assert_eq!(found, ["small"]);
//!
//! // Points are shapes too.
//! let centre = Point::new(&[50.0, 50.0]).unwrap();
//! let mut found = Vec::new();
//! grid.point_location_query(&centre, |d| found.push(d.id())).unwrap();
//! assert_eq!(found, [2]);
//!
//! assert_eq!(grid.delete_data(&small, 1).unwrap(), 1);
//! assert_eq!(grid.len(), 1);
//! ```
//!
//! ## Tiling
//!
//! A [`TileLayout`] computes a tile count per dimension and always realizes the full
//! product grid. Two schemes are available through [`GridConfig`]:
//!
//! - [`TilingScheme::Balanced`] *(default)*: keeps adding a tile to the dimension
//!   with the longest tiles until the product reaches the capacity.
//! - [`TilingScheme::Proportional`]: `floor(capacity * span_i / Σ span) + 1` tiles per
//!   dimension, independently.
//!
//! Leaves are numbered by the mixed-radix encoding of their tile coordinate
//! ([`TileLayout::grid_index_to_node_id`]); the root takes the id after the last leaf.
//!
//! ### Float semantics
//!
//! Coordinates are assumed finite. Region bounds are inclusive, so regions sharing only
//! an edge intersect. Tile lookups pad their ranges by one tile and then filter with exact
//! region tests, so rounding at tile edges never hides an entry.
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade (`debug` for tiling and flushes, `trace` for
//! root fallbacks and deletes). It never installs a logger.

#![no_std]

extern crate alloc;

mod config;
mod error;
mod grid;
mod node;
mod tiling;
mod types;

pub use config::{GridConfig, TilingScheme};
pub use error::{GridError, Result};
pub use grid::{Grid, GridStatistics, Visitor};
pub use node::{GridData, Node, NodeId, NodeKind, QueryKind};
pub use tiling::{TileCursor, TileLayout};
pub use types::{Point, Region, Scalar, Shape};
