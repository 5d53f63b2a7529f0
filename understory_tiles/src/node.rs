// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node storage: stored entries, the shared entry array, and the leaf/root node variant.

use alloc::vec::Vec;

use crate::error::{GridError, Result};
use crate::types::{Region, Scalar, Shape};

/// Identifier of a node in a [`Grid`][crate::Grid].
///
/// Leaves are numbered `0..tile_count` in tile order; the root takes the next id.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// The raw index of this node.
    #[inline]
    pub const fn get(self) -> usize {
        self.0
    }
}

/// Whether a node is a tile or the root.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// One tile of the root partition.
    Leaf,
    /// The top-level node holding entries that span tile boundaries.
    Root,
}

/// How a query shape is tested against stored regions.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum QueryKind {
    /// Match entries whose region the query intersects.
    #[default]
    Intersection,
    /// Match entries whose region the query fully contains.
    Containment,
}

impl QueryKind {
    #[inline]
    pub(crate) fn matches<T, S>(self, query: &S, region: &Region<T>) -> bool
    where
        T: Scalar,
        S: Shape<T> + ?Sized,
    {
        match self {
            Self::Intersection => query.intersects_region(region),
            Self::Containment => query.contains_region(region),
        }
    }
}

/// One stored spatial object.
#[derive(Clone, Debug, PartialEq)]
pub struct GridData<T, P> {
    id: i64,
    region: Region<T>,
    payload: P,
}

impl<T, P> GridData<T, P> {
    pub(crate) const fn new(id: i64, region: Region<T>, payload: P) -> Self {
        Self {
            id,
            region,
            payload,
        }
    }

    /// Caller-supplied identifier.
    #[inline]
    pub const fn id(&self) -> i64 {
        self.id
    }

    /// Bounding region of the stored shape.
    #[inline]
    pub const fn region(&self) -> &Region<T> {
        &self.region
    }

    /// Caller-supplied payload.
    #[inline]
    pub const fn payload(&self) -> &P {
        &self.payload
    }

    /// Consume the entry, returning its payload.
    #[inline]
    pub fn into_payload(self) -> P {
        self.payload
    }
}

/// Growable entry array with a parallel id array for quick identity scans.
#[derive(Clone, Debug)]
pub(crate) struct EntryStore<T, P> {
    entries: Vec<GridData<T, P>>,
    ids: Vec<i64>,
}

impl<T, P> EntryStore<T, P> {
    pub(crate) const fn new() -> Self {
        Self {
            entries: Vec::new(),
            ids: Vec::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Allocated entry slots.
    pub(crate) fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    pub(crate) fn entries(&self) -> &[GridData<T, P>] {
        &self.entries
    }

    pub(crate) fn iter(&self) -> core::slice::Iter<'_, GridData<T, P>> {
        self.entries.iter()
    }

    /// Drop every entry, keeping the allocation.
    pub(crate) fn clear(&mut self) {
        self.ids.clear();
        self.entries.clear();
    }

    pub(crate) fn is_consistent(&self) -> bool {
        self.ids.len() == self.entries.len()
            && self.ids.iter().zip(&self.entries).all(|(&id, e)| id == e.id)
    }

    /// Append an entry; capacity doubles when full.
    pub(crate) fn push(&mut self, data: GridData<T, P>) {
        self.ids.push(data.id);
        self.entries.push(data);
    }

    pub(crate) fn position_of(&self, id: i64) -> Option<usize> {
        self.ids.iter().position(|&stored| stored == id)
    }

    /// Remove by index, moving the last entry into its place.
    pub(crate) fn swap_remove(&mut self, index: usize) -> Result<GridData<T, P>> {
        if index >= self.entries.len() {
            return Err(GridError::IndexOutOfBounds {
                index,
                len: self.entries.len(),
            });
        }
        self.ids.swap_remove(index);
        Ok(self.entries.swap_remove(index))
    }

    /// Remove every entry stored under `id`, returning how many were removed.
    pub(crate) fn remove_id(&mut self, id: i64) -> usize {
        let mut removed = 0;
        while let Some(pos) = self.position_of(id) {
            self.ids.swap_remove(pos);
            self.entries.swap_remove(pos);
            removed += 1;
        }
        removed
    }
}

/// A tile or the root, with the entries stored directly in it.
#[derive(Clone, Debug)]
pub struct Node<T, P> {
    id: NodeId,
    kind: NodeKind,
    region: Region<T>,
    store: EntryStore<T, P>,
}

impl<T: Scalar, P> Node<T, P> {
    pub(crate) const fn leaf(id: usize, region: Region<T>) -> Self {
        Self {
            id: NodeId(id),
            kind: NodeKind::Leaf,
            region,
            store: EntryStore::new(),
        }
    }

    pub(crate) const fn root(id: usize, region: Region<T>) -> Self {
        Self {
            id: NodeId(id),
            kind: NodeKind::Root,
            region,
            store: EntryStore::new(),
        }
    }

    /// Identifier of this node.
    #[inline]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Leaf or root.
    #[inline]
    pub const fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Whether this node is a tile.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.kind == NodeKind::Leaf
    }

    /// Whether this node is the root.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.kind == NodeKind::Root
    }

    /// The tile's region, or the whole grid bound for the root.
    #[inline]
    pub const fn region(&self) -> &Region<T> {
        &self.region
    }

    /// Number of entries stored directly in this node.
    #[inline]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether no entries are stored directly in this node.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Number of entries the node can hold before reallocating.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Entries stored directly in this node, in storage order.
    #[inline]
    pub fn entries(&self) -> &[GridData<T, P>] {
        self.store.entries()
    }

    pub(crate) const fn store(&self) -> &EntryStore<T, P> {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut EntryStore<T, P> {
        &mut self.store
    }

    /// Scan every entry, calling `f` on those matching `query`. Returns the match count.
    pub(crate) fn visit_matching<S, F>(&self, query: &S, kind: QueryKind, mut f: F) -> usize
    where
        S: Shape<T> + ?Sized,
        F: FnMut(&GridData<T, P>),
    {
        let mut hits = 0;
        for data in self.store.iter() {
            if kind.matches(query, &data.region) {
                f(data);
                hits += 1;
            }
        }
        hits
    }
}
