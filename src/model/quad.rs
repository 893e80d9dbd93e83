//! Quad and Die grids.

use crate::model::cluster::Cluster;
use crate::model::node::{Aggregate, Component, ComponentKind, IdAllocator};
use crate::spec::{CLUSTERS_PER_SIDE, QUADS_PER_SIDE};

/// Square grid of optional slots, row-major on the heap so that dies and
/// quads stay small when moved.
#[derive(Debug, Clone)]
struct Grid<T> {
    side: usize,
    slots: Vec<Option<T>>,
}

impl<T> Grid<T> {
    fn new(side: usize) -> Self {
        Self {
            side,
            slots: std::iter::repeat_with(|| None).take(side * side).collect(),
        }
    }

    fn index(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.side && col < self.side).then_some(row * self.side + col)
    }

    fn get(&self, row: usize, col: usize) -> Option<&T> {
        self.slots[self.index(row, col)?].as_ref()
    }

    fn get_mut(&mut self, row: usize, col: usize) -> Option<&mut T> {
        let idx = self.index(row, col)?;
        self.slots[idx].as_mut()
    }

    /// Callers place only validated positions.
    fn replace(&mut self, row: usize, col: usize, value: T) -> Option<T> {
        debug_assert!(row < self.side && col < self.side);
        self.slots[row * self.side + col].replace(value)
    }

    fn iter(&self) -> impl Iterator<Item = ((usize, usize), &T)> {
        let side = self.side;
        self.slots
            .iter()
            .enumerate()
            .filter_map(move |(i, slot)| slot.as_ref().map(|v| ((i / side, i % side), v)))
    }

    fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().flatten()
    }
}

/// 8x8 cluster slots plus one HBM leaf.
#[derive(Debug, Clone)]
pub struct Quad {
    node: Component,
    name: String,
    clusters: Grid<Cluster>,
    hbm: Component,
    is_enable: bool,
}

impl Quad {
    pub fn new(ids: &mut IdAllocator, id: Option<u64>, name: impl Into<String>) -> Self {
        let node = Component::with_id(ids.assign(id), ComponentKind::Quad);
        let hbm = Component::new(ids, ComponentKind::Hbm);
        Self {
            node,
            name: name.into(),
            clusters: Grid::new(CLUSTERS_PER_SIDE),
            hbm,
            is_enable: false,
        }
    }

    pub fn node(&self) -> &Component {
        &self.node
    }

    pub fn id(&self) -> u64 {
        self.node.id()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_enable(&self) -> bool {
        self.is_enable
    }

    pub fn set_enable(&mut self, enable: bool) {
        self.is_enable = enable;
    }

    pub fn hbm(&self) -> &Component {
        &self.hbm
    }

    pub fn hbm_mut(&mut self) -> &mut Component {
        &mut self.hbm
    }

    /// Put `cluster` in its slot, returning whatever occupied it before.
    pub fn place(&mut self, cluster: Cluster) -> Option<Cluster> {
        let (row, col) = cluster.position();
        self.clusters.replace(row, col, cluster)
    }

    pub fn cluster(&self, row: usize, col: usize) -> Option<&Cluster> {
        self.clusters.get(row, col)
    }

    pub fn cluster_mut(&mut self, row: usize, col: usize) -> Option<&mut Cluster> {
        self.clusters.get_mut(row, col)
    }

    /// Populated slots, row-major.
    pub fn clusters(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter().map(|(_, c)| c)
    }
}

impl Aggregate for Quad {
    fn components(&self) -> Vec<&Component> {
        let mut out: Vec<&Component> = self.clusters().flat_map(|c| c.components()).collect();
        out.push(&self.hbm);
        out.push(&self.node);
        out
    }

    fn components_mut(&mut self) -> Vec<&mut Component> {
        let Quad {
            node,
            clusters,
            hbm,
            ..
        } = self;
        let mut out: Vec<&mut Component> = clusters
            .values_mut()
            .flat_map(|c| c.components_mut())
            .collect();
        out.push(hbm);
        out.push(node);
        out
    }
}

/// 2x2 quad grid.
#[derive(Debug, Clone)]
pub struct Die {
    node: Component,
    quads: Grid<Quad>,
    is_enable: bool,
}

impl Die {
    pub fn new(ids: &mut IdAllocator, id: Option<u64>) -> Self {
        Self {
            node: Component::with_id(ids.assign(id), ComponentKind::Die),
            quads: Grid::new(QUADS_PER_SIDE),
            is_enable: false,
        }
    }

    pub fn node(&self) -> &Component {
        &self.node
    }

    pub fn id(&self) -> u64 {
        self.node.id()
    }

    pub fn is_enable(&self) -> bool {
        self.is_enable
    }

    pub fn set_enable(&mut self, enable: bool) {
        self.is_enable = enable;
    }

    pub fn place(&mut self, row: usize, col: usize, quad: Quad) -> Option<Quad> {
        self.quads.replace(row, col, quad)
    }

    pub fn quad(&self, row: usize, col: usize) -> Option<&Quad> {
        self.quads.get(row, col)
    }

    pub fn quad_mut(&mut self, row: usize, col: usize) -> Option<&mut Quad> {
        self.quads.get_mut(row, col)
    }

    /// Populated quads, row-major, with their grid position.
    pub fn quads(&self) -> impl Iterator<Item = ((usize, usize), &Quad)> {
        self.quads.iter()
    }
}

impl Aggregate for Die {
    fn components(&self) -> Vec<&Component> {
        let mut out: Vec<&Component> = self.quads().flat_map(|(_, q)| q.components()).collect();
        out.push(&self.node);
        out
    }

    fn components_mut(&mut self) -> Vec<&mut Component> {
        let Die { node, quads, .. } = self;
        let mut out: Vec<&mut Component> = quads
            .values_mut()
            .flat_map(|q| q.components_mut())
            .collect();
        out.push(node);
        out
    }
}
