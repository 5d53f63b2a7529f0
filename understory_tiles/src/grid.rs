// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The grid index: a fixed tile partition plus a root node for spanning entries.
//!
//! An entry lives in the tile holding its low corner when that tile fully
//! contains it, and at the root otherwise. The tiling never changes after
//! construction, so the index works best when most entries are small compared
//! to a tile and lie within fixed, known bounds.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::Cell;
use core::fmt::Debug;

use crate::config::GridConfig;
use crate::error::{GridError, Result};
use crate::node::{GridData, Node, NodeId, QueryKind};
use crate::tiling::TileLayout;
use crate::types::{Point, Region, Scalar, Shape};

/// Callbacks invoked while a query walks the grid.
///
/// Any `FnMut(&GridData<T, P>)` closure is a visitor.
pub trait Visitor<T, P> {
    /// Called once for each node about to be scanned.
    fn visit_node(&mut self, node: &Node<T, P>) {
        let _ = node;
    }

    /// Called for each entry matching the query.
    fn visit_data(&mut self, data: &GridData<T, P>);
}

impl<T, P, F: FnMut(&GridData<T, P>)> Visitor<T, P> for F {
    fn visit_data(&mut self, data: &GridData<T, P>) {
        self(data);
    }
}

/// Counters describing the work done since construction or the last flush.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GridStatistics {
    /// Nodes scanned by queries.
    pub reads: usize,
    /// Entries inserted or removed.
    pub writes: usize,
    /// Insertions that fell back to the root because no single tile held the shape.
    pub root_insertions: usize,
    /// Entries currently stored.
    pub data: usize,
    /// Nodes in the grid: every tile plus the root.
    pub nodes: usize,
    /// Entries reported to visitors.
    pub query_results: usize,
}

/// Fixed-tile spatial index over N-dimensional regions with payloads `P`.
///
/// ```
/// use understory_tiles::{Grid, Region};
///
/// let bounds = Region::new(&[0.0, 0.0], &[100.0, 100.0]).unwrap();
/// let mut grid: Grid<f64, &str> = Grid::new(bounds, 4).unwrap();
///
/// let shop = Region::new(&[10.0, 10.0], &[20.0, 20.0]).unwrap();
/// grid.insert_data("shop", &shop, 7).unwrap();
///
/// let hits = grid.collect_intersecting(&shop).unwrap();
/// assert_eq!(hits.len(), 1);
/// assert_eq!(*hits[0].payload(), "shop");
///
/// assert_eq!(grid.delete_data(&shop, 7).unwrap(), 1);
/// assert!(grid.is_empty());
/// ```
pub struct Grid<T: Scalar, P> {
    config: GridConfig<T>,
    layout: TileLayout<T>,
    root: Node<T, P>,
    leaves: Vec<Node<T, P>>,
    stats: Cell<GridStatistics>,
}

impl<T: Scalar, P> Debug for Grid<T, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let occupied = self.leaves.iter().filter(|leaf| !leaf.is_empty()).count();
        f.debug_struct("Grid")
            .field("bounds", self.layout.region())
            .field("tiles_number", &self.layout.tiles_number())
            .field("occupied_tiles", &occupied)
            .field("root_entries", &self.root.len())
            .field("stats", &self.stats.get())
            .finish_non_exhaustive()
    }
}

impl<T: Scalar, P> Grid<T, P> {
    /// Create a grid over `region` with at least `capacity` tiles, using the default scheme.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidCapacity`] if `capacity` is zero or too large.
    pub fn new(region: Region<T>, capacity: usize) -> Result<Self> {
        Self::with_config(GridConfig::new(region, capacity))
    }

    /// Create a grid from an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidCapacity`] if the capacity is zero or the
    /// tiling would exceed [`TileLayout::MAX_TILES`].
    pub fn with_config(config: GridConfig<T>) -> Result<Self> {
        let layout = TileLayout::new(config.region.clone(), config.capacity, config.tiling)?;
        let leaves = layout.split()?;
        let root = Node::root(leaves.len(), config.region.clone());
        let stats = GridStatistics {
            nodes: leaves.len() + 1,
            ..GridStatistics::default()
        };
        Ok(Self {
            config,
            layout,
            root,
            leaves,
            stats: Cell::new(stats),
        })
    }

    /// The configuration the grid was built from.
    pub fn config(&self) -> &GridConfig<T> {
        &self.config
    }

    /// The tile partition.
    pub fn layout(&self) -> &TileLayout<T> {
        &self.layout
    }

    /// Bounding region of the whole grid.
    pub fn bounds(&self) -> &Region<T> {
        self.root.region()
    }

    /// Number of dimensions.
    pub fn dimension(&self) -> usize {
        self.layout.dimension()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.root.len() + self.leaves.iter().map(Node::len).sum::<usize>()
    }

    /// Whether the grid stores no entries.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty() && self.leaves.iter().all(Node::is_empty)
    }

    /// The root node.
    pub fn root(&self) -> &Node<T, P> {
        &self.root
    }

    /// All leaves, indexed by their node id.
    pub fn leaves(&self) -> &[Node<T, P>] {
        &self.leaves
    }

    /// Look up a leaf or the root by id.
    pub fn node(&self, id: NodeId) -> Option<&Node<T, P>> {
        if id == self.root.id() {
            Some(&self.root)
        } else {
            self.leaves.get(id.get())
        }
    }

    /// Snapshot of the statistics counters.
    pub fn statistics(&self) -> GridStatistics {
        self.stats.get()
    }

    fn bump(&self, f: impl FnOnce(&mut GridStatistics)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
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

    /// Store `payload` under `id` with the bounding region of `shape`.
    ///
    /// Returns the node now holding the entry: the tile containing the
    /// shape's low corner if that tile holds the whole shape, the root
    /// otherwise. Ids are not required to be unique.
    ///
    /// # Errors
    ///
    /// - [`GridError::DimensionMismatch`] if the shape's dimension differs from the grid's.
    /// - [`GridError::OutOfBounds`] if the shape is not fully inside [`bounds`][Self::bounds].
    pub fn insert_data<S>(&mut self, payload: P, shape: &S, id: i64) -> Result<NodeId>
    where
        S: Shape<T> + ?Sized,
    {
        self.check_dimension(shape.dimension())?;
        let mbr = shape.mbr();
        if !self.root.region().contains(&mbr) {
            return Self::insert_data_out_of_bounds(&mbr, id);
        }

        let tile = self.layout.tile_index_of(mbr.lows())?;
        let leaf = self.layout.grid_index_to_node_id(&tile)?;
        let fits = self
            .leaves
            .get(leaf)
            .is_some_and(|node| node.region().contains(&mbr));

        let node = if fits {
            &mut self.leaves[leaf]
        } else {
            log::trace!("entry {id} spans tiles; storing at root");
            &mut self.root
        };
        let node_id = node.id();
        node.store_mut().push(GridData::new(id, mbr, payload));

        self.bump(|s| {
            s.writes += 1;
            s.data += 1;
            if !fits {
                s.root_insertions += 1;
            }
        });
        Ok(node_id)
    }

    // The grid never grows to admit a shape.
    fn insert_data_out_of_bounds(mbr: &Region<T>, id: i64) -> Result<NodeId> {
        log::trace!("rejecting entry {id}: {mbr:?} is outside the grid");
        Err(GridError::OutOfBounds)
    }

    /// Remove every entry stored under `id` in the nodes `shape` may touch.
    ///
    /// The root is always scanned; tiles are scanned when their region
    /// intersects the shape's bounding region. Entries are matched by id alone.
    /// Returns the number of entries removed, so deleting twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::DimensionMismatch`] if the shape's dimension differs from the grid's.
    pub fn delete_data<S>(&mut self, shape: &S, id: i64) -> Result<usize>
    where
        S: Shape<T> + ?Sized,
    {
        self.check_dimension(shape.dimension())?;
        let touched = self.touched_leaves(&shape.mbr())?;

        let mut removed = self.root.store_mut().remove_id(id);
        for leaf in touched {
            removed += self.leaves[leaf].store_mut().remove_id(id);
        }

        if removed > 0 {
            log::trace!("deleted {removed} entries with id {id}");
            self.bump(|s| {
                s.writes += removed;
                s.data -= removed;
            });
        }
        Ok(removed)
    }

    /// Remove the entry at `index` within one node, moving the node's last entry into its place.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::IndexOutOfBounds`] for an unknown node or an index past its end.
    pub fn delete_entry_at(&mut self, node: NodeId, index: usize) -> Result<GridData<T, P>> {
        let nodes = self.leaves.len() + 1;
        let target = if node == self.root.id() {
            &mut self.root
        } else {
            self.leaves
                .get_mut(node.get())
                .ok_or(GridError::IndexOutOfBounds {
                    index: node.get(),
                    len: nodes,
                })?
        };
        let data = target.store_mut().swap_remove(index)?;
        self.bump(|s| {
            s.writes += 1;
            s.data -= 1;
        });
        Ok(data)
    }

    /// Scan the entries of a single node, reporting matches to `visitor`.
    ///
    /// Returns the number of matches. No pruning happens here: the caller picks
    /// the node. See [`query`][Self::query] for a walk over every relevant node.
    ///
    /// # Errors
    ///
    /// - [`GridError::IndexOutOfBounds`] for an unknown node.
    /// - [`GridError::DimensionMismatch`] if the query's dimension differs from the grid's.
    pub fn visit_data<S, V>(
        &self,
        node: NodeId,
        visitor: &mut V,
        query: &S,
        kind: QueryKind,
    ) -> Result<usize>
    where
        S: Shape<T> + ?Sized,
        V: Visitor<T, P> + ?Sized,
    {
        self.check_dimension(query.dimension())?;
        let target = self.node(node).ok_or(GridError::IndexOutOfBounds {
            index: node.get(),
            len: self.leaves.len() + 1,
        })?;
        Ok(self.scan(target, visitor, query, kind))
    }

    fn scan<S, V>(&self, node: &Node<T, P>, visitor: &mut V, query: &S, kind: QueryKind) -> usize
    where
        S: Shape<T> + ?Sized,
        V: Visitor<T, P> + ?Sized,
    {
        visitor.visit_node(node);
        let hits = node.visit_matching(query, kind, |data| visitor.visit_data(data));
        self.bump(|s| {
            s.reads += 1;
            s.query_results += hits;
        });
        hits
    }

    /// Visit every entry matching `query` under `kind`.
    ///
    /// Scans the root, then each tile whose region intersects the query's
    /// bounding region. Returns the number of matches.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::DimensionMismatch`] if the query's dimension differs from the grid's.
    pub fn query<S, V>(&self, query: &S, kind: QueryKind, visitor: &mut V) -> Result<usize>
    where
        S: Shape<T> + ?Sized,
        V: Visitor<T, P> + ?Sized,
    {
        self.check_dimension(query.dimension())?;
        let touched = self.touched_leaves(&query.mbr())?;

        let mut hits = self.scan(&self.root, visitor, query, kind);
        for leaf in touched {
            hits += self.scan(&self.leaves[leaf], visitor, query, kind);
        }
        Ok(hits)
    }

    /// Ids of the leaves whose region intersects `mbr`, in tile order.
    fn touched_leaves(&self, mbr: &Region<T>) -> Result<Vec<usize>> {
        let mut out = Vec::new();
        let Some(mut cursor) = self.layout.find_matching_tiles(mbr)? else {
            return Ok(out);
        };
        loop {
            let leaf = self.layout.grid_index_to_node_id(cursor.position())?;
            if self
                .leaves
                .get(leaf)
                .is_some_and(|node| node.region().intersects(mbr))
            {
                out.push(leaf);
            }
            if !cursor.increment() {
                break;
            }
        }
        Ok(out)
    }

    /// Call `f` for each entry whose region `shape` intersects.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::DimensionMismatch`] if the shape's dimension differs from the grid's.
    pub fn intersection_query<S, F>(&self, shape: &S, mut f: F) -> Result<usize>
    where
        S: Shape<T> + ?Sized,
        F: FnMut(&GridData<T, P>),
    {
        self.query(shape, QueryKind::Intersection, &mut f)
    }

    /// Call `f` for each entry whose region `shape` fully contains.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::DimensionMismatch`] if the shape's dimension differs from the grid's.
    pub fn containment_query<S, F>(&self, shape: &S, mut f: F) -> Result<usize>
    where
        S: Shape<T> + ?Sized,
        F: FnMut(&GridData<T, P>),
    {
        self.query(shape, QueryKind::Containment, &mut f)
    }

    /// Call `f` for each entry whose region contains `point`.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::DimensionMismatch`] if the point's dimension differs from the grid's.
    pub fn point_location_query<F>(&self, point: &Point<T>, f: F) -> Result<usize>
    where
        F: FnMut(&GridData<T, P>),
    {
        self.intersection_query(point, f)
    }

    /// Iterate over the entries whose region `shape` intersects.
    ///
    /// Root entries come first, then each touched tile's entries in tile order.
    /// The nodes to scan are counted as reads up front; the lazily produced
    /// matches are not counted as query results.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::DimensionMismatch`] if the shape's dimension differs from the grid's.
    pub fn query_intersecting<'g, S>(
        &'g self,
        shape: &S,
    ) -> Result<impl Iterator<Item = &'g GridData<T, P>>>
    where
        S: Shape<T> + ?Sized,
    {
        self.check_dimension(shape.dimension())?;
        let touched = self.touched_leaves(&shape.mbr())?;
        self.bump(|s| s.reads += touched.len() + 1);

        let nodes = core::iter::once(&self.root)
            .chain(touched.into_iter().map(move |leaf| &self.leaves[leaf]));
        Ok(nodes
            .flat_map(|node| node.store().iter())
            .filter(move |data| shape.intersects_region(data.region())))
    }

    /// Collect the entries whose region `shape` intersects.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::DimensionMismatch`] if the shape's dimension differs from the grid's.
    pub fn collect_intersecting<S>(&self, shape: &S) -> Result<Vec<&GridData<T, P>>>
    where
        S: Shape<T> + ?Sized,
    {
        let out: Vec<_> = self.query_intersecting(shape)?.collect();
        self.bump(|s| s.query_results += out.len());
        Ok(out)
    }

    /// Drop every entry, keeping the root and its tiles. Statistics are reset.
    pub fn flush(&mut self) {
        log::debug!("flushing grid with {} entries", self.len());
        for node in self.leaves.iter_mut().chain(core::iter::once(&mut self.root)) {
            node.store_mut().clear();
        }
        self.stats.set(GridStatistics {
            nodes: self.leaves.len() + 1,
            ..GridStatistics::default()
        });
    }

    /// Check the structural invariants of the index.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::InvalidState`] describing the first violation found.
    pub fn validate(&self) -> Result<()> {
        if self.leaves.len() != self.layout.tile_count() {
            return Err(invalid(format!(
                "{} leaves for {} tiles",
                self.leaves.len(),
                self.layout.tile_count()
            )));
        }
        for (i, leaf) in self.leaves.iter().enumerate() {
            if leaf.id().get() != i || !leaf.is_leaf() {
                return Err(invalid(format!("leaf at position {i} is {:?}", leaf.id())));
            }
            let expected = self
                .layout
                .tile_region(&self.layout.node_id_to_grid_index(i)?)?;
            if leaf.region() != &expected {
                return Err(invalid(format!("leaf {i} does not cover its tile")));
            }
            check_node(leaf)?;
        }

        if !self.root.is_root() || self.root.id().get() != self.leaves.len() {
            return Err(invalid(format!("root has id {:?}", self.root.id())));
        }
        if self.root.region() != self.layout.region() {
            return Err(invalid(String::from("root region differs from the tiling")));
        }
        check_node(&self.root)?;

        let stored = self.len();
        let counted = self.stats.get().data;
        if stored != counted {
            return Err(invalid(format!(
                "{stored} entries stored but {counted} counted"
            )));
        }
        Ok(())
    }
}

fn check_node<T: Scalar, P>(node: &Node<T, P>) -> Result<()> {
    if !node.store().is_consistent() {
        return Err(invalid(format!(
            "node {:?} has ids out of step with its entries",
            node.id()
        )));
    }
    if let Some(data) = node
        .entries()
        .iter()
        .find(|data| !node.region().contains(data.region()))
    {
        return Err(invalid(format!(
            "entry {} escapes node {:?}",
            data.id(),
            node.id()
        )));
    }
    Ok(())
}

fn invalid(message: String) -> GridError {
    log::warn!("grid validation failed: {message}");
    GridError::InvalidState(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TilingScheme;
    use alloc::vec;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn rect(lx: f64, ly: f64, hx: f64, hy: f64) -> Region<f64> {
        Region::new(&[lx, ly], &[hx, hy]).unwrap()
    }

    fn grid(capacity: usize) -> Grid<f64, u32> {
        Grid::new(rect(0.0, 0.0, 100.0, 100.0), capacity).unwrap()
    }

    fn ids_matching(g: &Grid<f64, u32>, query: &Region<f64>, kind: QueryKind) -> Vec<i64> {
        let mut ids = Vec::new();
        g.query(query, kind, &mut |d: &GridData<f64, u32>| ids.push(d.id()))
            .unwrap();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn worked_example_round_trips() {
        let config = GridConfig::new(rect(0.0, 0.0, 100.0, 100.0), 4)
            .with_tiling(TilingScheme::Proportional);
        let mut g: Grid<f64, u32> = Grid::with_config(config).unwrap();
        assert_eq!(g.layout().tiles_number(), &[3, 3]);

        let shape = rect(10.0, 10.0, 20.0, 20.0);
        let node = g.insert_data(1, &shape, 42).unwrap();
        assert_eq!(node, NodeId(0));
        assert_eq!(g.statistics().root_insertions, 0);
        assert_eq!(ids_matching(&g, &shape, QueryKind::Containment), vec![42]);

        assert_eq!(g.delete_data(&shape, 42).unwrap(), 1);
        assert!(ids_matching(&g, &shape, QueryKind::Containment).is_empty());
        assert_eq!(g.delete_data(&shape, 42).unwrap(), 0);
        g.validate().unwrap();
    }

    #[test]
    fn shape_inside_one_tile_lands_in_that_leaf() {
        let mut g = grid(4);
        let node = g.insert_data(7, &rect(60.0, 10.0, 70.0, 20.0), 1).unwrap();
        // Balanced 2x2 tiling: tile (1, 0) is leaf 1.
        assert_eq!(node.get(), 1);
        assert_eq!(g.leaves()[1].len(), 1);
        assert!(g.root().is_empty());
        assert_eq!(g.node(node).map(Node::kind), Some(crate::NodeKind::Leaf));
    }

    #[test]
    fn spanning_shape_falls_back_to_root() {
        let mut g = grid(4);
        let spanning = rect(40.0, 40.0, 60.0, 60.0);
        let node = g.insert_data(9, &spanning, 5).unwrap();
        assert_eq!(node, g.root().id());
        assert_eq!(g.statistics().root_insertions, 1);

        // Any query that visits the root finds it.
        assert_eq!(
            ids_matching(&g, &rect(0.0, 0.0, 1.0, 1.0), QueryKind::Intersection),
            vec![]
        );
        assert_eq!(
            ids_matching(&g, &rect(55.0, 55.0, 90.0, 90.0), QueryKind::Intersection),
            vec![5]
        );
        assert_eq!(
            ids_matching(&g, &rect(0.0, 0.0, 100.0, 100.0), QueryKind::Containment),
            vec![5]
        );
        let mut visited = 0;
        let mut count = |_: &GridData<f64, u32>| visited += 1;
        g.visit_data(g.root().id(), &mut count, &spanning, QueryKind::Containment)
            .unwrap();
        assert_eq!(visited, 1);
    }

    #[test]
    fn out_of_bounds_and_wrong_dimension_are_rejected() {
        let mut g = grid(4);
        assert_eq!(
            g.insert_data(0, &rect(90.0, 90.0, 110.0, 95.0), 1),
            Err(GridError::OutOfBounds)
        );
        assert_eq!(
            g.insert_data(0, &rect(200.0, 200.0, 210.0, 210.0), 1),
            Err(GridError::OutOfBounds)
        );
        let cube = Region::new(&[1.0; 3], &[2.0; 3]).unwrap();
        assert_eq!(
            g.insert_data(0, &cube, 1),
            Err(GridError::DimensionMismatch {
                expected: 2,
                found: 3
            })
        );
        assert!(g.delete_data(&cube, 1).is_err());
        assert!(g.intersection_query(&cube, |_| {}).is_err());
        assert!(g.is_empty());
        assert_eq!(g.statistics().writes, 0);
    }

    #[test]
    fn shapes_on_the_grid_edge_are_accepted() {
        let mut g = grid(4);
        let node = g.insert_data(0, &rect(90.0, 90.0, 100.0, 100.0), 1).unwrap();
        assert_eq!(node.get(), 3);
        let corner = Point::new(&[100.0, 100.0]).unwrap();
        let mut hits = Vec::new();
        g.point_location_query(&corner, |d| hits.push(*d.payload()))
            .unwrap();
        assert_eq!(hits, vec![0]);
    }

    #[test]
    fn delete_matches_by_id_in_touched_nodes_only() {
        let mut g = grid(4);
        g.insert_data(0, &rect(10.0, 10.0, 20.0, 20.0), 1).unwrap();
        g.insert_data(1, &rect(60.0, 60.0, 70.0, 70.0), 1).unwrap();
        g.insert_data(2, &rect(45.0, 45.0, 55.0, 55.0), 2).unwrap();

        // Only the lower-left tile and the root are touched.
        assert_eq!(g.delete_data(&rect(10.0, 10.0, 20.0, 20.0), 1).unwrap(), 1);
        assert_eq!(g.len(), 2);
        assert_eq!(
            ids_matching(&g, &rect(0.0, 0.0, 100.0, 100.0), QueryKind::Intersection),
            vec![1, 2]
        );

        // Root entries are always reachable.
        assert_eq!(g.delete_data(&rect(0.0, 0.0, 1.0, 1.0), 2).unwrap(), 1);
        assert_eq!(g.statistics().data, 1);
        g.validate().unwrap();
    }

    #[test]
    fn delete_entry_at_swaps_with_last() {
        let mut g = grid(1);
        for id in 0..3 {
            g.insert_data(0, &rect(1.0, 1.0, 2.0, 2.0), id).unwrap();
        }
        let leaf = NodeId(0);
        let removed = g.delete_entry_at(leaf, 0).unwrap();
        assert_eq!(removed.id(), 0);
        let ids: Vec<_> = g.leaves()[0].entries().iter().map(GridData::id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(
            g.delete_entry_at(leaf, 2),
            Err(GridError::IndexOutOfBounds { index: 2, len: 2 })
        );
        assert!(g.delete_entry_at(NodeId(9), 0).is_err());
        g.validate().unwrap();
    }

    #[test]
    fn containment_is_stricter_than_intersection() {
        let mut g = grid(16);
        g.insert_data(0, &rect(5.0, 5.0, 8.0, 8.0), 1).unwrap();
        g.insert_data(0, &rect(7.0, 7.0, 12.0, 12.0), 2).unwrap();
        let query = rect(0.0, 0.0, 10.0, 10.0);
        assert_eq!(ids_matching(&g, &query, QueryKind::Intersection), vec![1, 2]);
        assert_eq!(ids_matching(&g, &query, QueryKind::Containment), vec![1]);
    }

    #[test]
    fn flush_empties_everything() {
        let mut g = grid(9);
        for i in 0..20 {
            let x = f64::from(i) * 4.0;
            g.insert_data(0, &rect(x, x, x + 3.0, x + 3.0), i64::from(i))
                .unwrap();
        }
        assert_eq!(g.len(), 20);
        let regions: Vec<_> = g
            .leaves()
            .iter()
            .map(|leaf| leaf.region().clone())
            .collect();
        g.flush();
        assert!(g.is_empty());
        assert!(
            g.leaves()
                .iter()
                .zip(&regions)
                .all(|(leaf, region)| leaf.region() == region)
        );
        let everything = rect(0.0, 0.0, 100.0, 100.0);
        assert!(ids_matching(&g, &everything, QueryKind::Intersection).is_empty());
        let stats = g.statistics();
        assert_eq!(stats.data, 0);
        assert_eq!(stats.nodes, g.layout().tile_count() + 1);
        g.validate().unwrap();
    }

    #[test]
    fn statistics_track_work() {
        let mut g = grid(4);
        g.insert_data(0, &rect(1.0, 1.0, 2.0, 2.0), 1).unwrap();
        g.insert_data(0, &rect(40.0, 40.0, 60.0, 60.0), 2).unwrap();
        let hits = g
            .intersection_query(&rect(0.0, 0.0, 100.0, 100.0), |_| {})
            .unwrap();
        assert_eq!(hits, 2);
        let stats = g.statistics();
        assert_eq!(stats.writes, 2);
        assert_eq!(stats.root_insertions, 1);
        // Root plus all four tiles.
        assert_eq!(stats.reads, 5);
        assert_eq!(stats.query_results, 2);
        assert_eq!(stats.nodes, 5);
    }

    #[test]
    fn visitor_sees_nodes_before_their_data() {
        #[derive(Default)]
        struct Trace(Vec<(bool, i64)>);

        impl Visitor<f64, u32> for Trace {
            fn visit_node(&mut self, node: &Node<f64, u32>) {
                self.0.push((true, node.id().get() as i64));
            }

            fn visit_data(&mut self, data: &GridData<f64, u32>) {
                self.0.push((false, data.id()));
            }
        }

        let mut g = grid(1);
        g.insert_data(0, &rect(1.0, 1.0, 2.0, 2.0), 11).unwrap();
        let mut trace = Trace::default();
        g.query(&rect(0.0, 0.0, 5.0, 5.0), QueryKind::Intersection, &mut trace)
            .unwrap();
        // Root (id 1) first, then the single tile and its entry.
        assert_eq!(trace.0, vec![(true, 1), (true, 0), (false, 11)]);
    }

    #[test]
    fn huge_capacity_is_an_error_not_a_panic() {
        for tiling in [TilingScheme::Balanced, TilingScheme::Proportional] {
            let config = GridConfig::new(Region::new(&[0.0], &[10.0]).unwrap(), 1 << 62)
                .with_tiling(tiling);
            let built: Result<Grid<f64, ()>> = Grid::with_config(config);
            assert_eq!(built.err(), Some(GridError::InvalidCapacity), "{tiling:?}");
        }
    }

    #[test]
    fn query_intersecting_walks_root_then_tiles() {
        let mut g = grid(4);
        g.insert_data(0, &rect(60.0, 60.0, 70.0, 70.0), 1).unwrap();
        g.insert_data(1, &rect(10.0, 10.0, 20.0, 20.0), 2).unwrap();
        g.insert_data(2, &rect(40.0, 40.0, 60.0, 60.0), 3).unwrap();
        g.insert_data(3, &rect(80.0, 5.0, 90.0, 10.0), 4).unwrap();

        let query = rect(0.0, 0.0, 65.0, 65.0);
        let ids: Vec<_> = g
            .query_intersecting(&query)
            .unwrap()
            .map(GridData::id)
            .collect();
        // Root first, then tiles in id order; entry 4 lies outside the query.
        assert_eq!(ids, vec![3, 2, 1]);

        let cube = Region::new(&[0.0; 3], &[1.0; 3]).unwrap();
        assert!(g.query_intersecting(&cube).is_err());

        let collected = g.collect_intersecting(&query).unwrap();
        assert_eq!(collected.len(), 3);
        assert_eq!(g.statistics().query_results, 3);
    }

    #[test]
    fn validate_reports_drift() {
        let mut g = grid(4);
        g.insert_data(0, &rect(1.0, 1.0, 2.0, 2.0), 1).unwrap();
        g.validate().unwrap();
        // Smuggle an entry in behind the counters.
        g.leaves[0]
            .store_mut()
            .push(GridData::new(2, rect(1.0, 1.0, 2.0, 2.0), 0));
        assert!(matches!(g.validate(), Err(GridError::InvalidState(_))));
    }

    #[test]
    fn matches_brute_force_scan() {
        let mut rng = StdRng::seed_from_u64(0x5EED);
        let bounds = Region::new(&[-50.0, 0.0, 0.0], &[50.0, 80.0, 20.0]).unwrap();
        let mut g: Grid<f64, usize> = Grid::new(bounds, 27).unwrap();
        let mut all = Vec::new();

        for i in 0..400 {
            let lo: [f64; 3] = [
                rng.gen_range(-50.0..45.0),
                rng.gen_range(0.0..75.0),
                rng.gen_range(0.0..18.0),
            ];
            let ext: f64 = rng.gen_range(0.0..5.0);
            let hi = [lo[0] + ext, lo[1] + ext, (lo[2] + ext).min(20.0)];
            let region = Region::new(&lo, &hi).unwrap();
            g.insert_data(i, &region, i as i64).unwrap();
            all.push(region);
        }
        g.validate().unwrap();

        for _ in 0..50 {
            let lo: [f64; 3] = [
                rng.gen_range(-60.0..50.0),
                rng.gen_range(-10.0..80.0),
                rng.gen_range(-5.0..20.0),
            ];
            let ext: f64 = rng.gen_range(0.0..30.0);
            let query = Region::new(&lo, &[lo[0] + ext, lo[1] + ext, lo[2] + ext]).unwrap();

            for kind in [QueryKind::Intersection, QueryKind::Containment] {
                let mut found = Vec::new();
                let mut collect = |d: &GridData<f64, usize>| found.push(*d.payload());
                g.query(&query, kind, &mut collect).unwrap();
                found.sort_unstable();
                let expected: Vec<_> = all
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| kind.matches(&query, r))
                    .map(|(i, _)| i)
                    .collect();
                assert_eq!(found, expected, "{kind:?} query {query:?}");
            }

            let mut lazy: Vec<_> = g
                .query_intersecting(&query)
                .unwrap()
                .map(|d| *d.payload())
                .collect();
            lazy.sort_unstable();
            let expected: Vec<_> = all
                .iter()
                .enumerate()
                .filter(|(_, r)| query.intersects(r))
                .map(|(i, _)| i)
                .collect();
            assert_eq!(lazy, expected, "lazy query {query:?}");
        }

        // Delete half and re-check a full scan.
        for (i, region) in all.iter().enumerate().step_by(2) {
            assert_eq!(g.delete_data(region, i as i64).unwrap(), 1);
        }
        let everything = g.collect_intersecting(g.bounds()).unwrap();
        assert_eq!(everything.len(), 200);
        assert!(everything.iter().all(|d| d.id() % 2 == 1));
        g.validate().unwrap();
    }
}
