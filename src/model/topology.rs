//! The session-wide tree: lazily loaded dies, the host interface, the die-to-die
//! leaf and the enablement overlay.

use crate::error::TopologyError;
use crate::model::build::{build_die, build_host_interface};
use crate::model::host::HostInterface;
use crate::model::node::{Aggregate, Component, ComponentKind, IdAllocator};
use crate::model::quad::Die;
use crate::spec::{
    CLUSTERS_PER_SIDE, ChipSpec, EnabledCluster, EnablementSpec, QUADS_PER_SIDE, quad_position,
};

use std::collections::BTreeMap;
use tracing::{debug, info};

pub struct Topology {
    spec: ChipSpec,
    enablement: EnablementSpec,
    ids: IdAllocator,
    dies: BTreeMap<usize, Die>,
    die2die: Component,
    host_interface: HostInterface,
    overlay_applied: bool,
}

impl Topology {
    /// Validate both documents and build the host interface. Dies are built on
    /// demand by `load_die`.
    pub fn new(spec: ChipSpec, enablement: EnablementSpec) -> Result<Self, TopologyError> {
        Self::with_allocator(spec, enablement, IdAllocator::new())
    }

    pub fn with_allocator(
        spec: ChipSpec,
        enablement: EnablementSpec,
        mut ids: IdAllocator,
    ) -> Result<Self, TopologyError> {
        spec.dies()?;
        enablement.clusters()?;
        let host_spec = spec.host_interface()?;

        let die2die = Component::new(&mut ids, ComponentKind::D2d);
        let host_interface = build_host_interface(&host_spec, &mut ids);

        Ok(Self {
            spec,
            enablement,
            ids,
            dies: BTreeMap::new(),
            die2die,
            host_interface,
            overlay_applied: false,
        })
    }

    /// Number of dies declared by the topology document.
    pub fn die_count(&self) -> usize {
        self.spec.dies().map(|d| d.len()).unwrap_or(0)
    }

    /// Build die `index` if it is not built yet. Once every declared die is
    /// loaded, the enablement overlay is applied (exactly once).
    pub fn load_die(&mut self, index: usize) -> Result<&Die, TopologyError> {
        if !self.dies.contains_key(&index) {
            let specs = self.spec.dies()?;
            let die_spec = specs.get(index).ok_or(TopologyError::DieIndexOutOfRange {
                index,
                count: specs.len(),
            })?;
            let die = build_die(die_spec, &mut self.ids)?;
            self.dies.insert(index, die);

            // A rejected overlay leaves the die unloaded so the next call retries.
            if !self.overlay_applied && self.dies.len() == self.die_count() {
                if let Err(e) = self.apply_enablement() {
                    self.dies.remove(&index);
                    return Err(e);
                }
            }
        }

        self.dies
            .get(&index)
            .ok_or(TopologyError::DieNotLoaded(index as i64))
    }

    pub fn load_all_dies(&mut self) -> Result<(), TopologyError> {
        for index in 0..self.die_count() {
            self.load_die(index)?;
        }
        Ok(())
    }

    /// Resolve every entry first; flags are only touched once all of them
    /// name populated slots.
    fn apply_enablement(&mut self) -> Result<(), TopologyError> {
        let enabled = self.enablement.clusters()?;
        let slots = enabled
            .iter()
            .map(|entry| self.resolve(entry))
            .collect::<Result<Vec<_>, _>>()?;

        for slot in &slots {
            let Some(quad) = self
                .dies
                .get_mut(&slot.die)
                .and_then(|d| d.quad_mut(slot.quad.0, slot.quad.1))
            else {
                continue;
            };
            if let Some(cluster) = quad.cluster_mut(slot.cell.0, slot.cell.1) {
                cluster.set_enable(true);
                quad.set_enable(true);
            }
        }
        for die in self.dies.values_mut() {
            let any = die.quads().any(|(_, q)| q.is_enable());
            die.set_enable(any);
        }
        self.overlay_applied = true;
        info!("enablement overlay applied: {} clusters", enabled.len());
        Ok(())
    }

    fn resolve(&self, entry: &EnabledCluster) -> Result<Slot, TopologyError> {
        let index = usize::try_from(entry.die).map_err(|_| TopologyError::DieNotLoaded(entry.die))?;
        let die = self
            .dies
            .get(&index)
            .ok_or(TopologyError::DieNotLoaded(entry.die))?;

        let (qrow, qcol) = i32::try_from(entry.quad)
            .ok()
            .and_then(quad_position)
            .ok_or(TopologyError::IndexOutOfRange {
                what: "quad",
                index: entry.quad,
                bound: QUADS_PER_SIDE * QUADS_PER_SIDE,
            })?;
        let unpopulated = || TopologyError::UnpopulatedSlot(describe(entry));
        let quad = die.quad(qrow, qcol).ok_or_else(unpopulated)?;

        let (row, col) = match (usize::try_from(entry.row), usize::try_from(entry.col)) {
            (Ok(r), Ok(c)) if r < CLUSTERS_PER_SIDE && c < CLUSTERS_PER_SIDE => (r, c),
            _ => {
                return Err(TopologyError::PositionOutOfRange {
                    component: "enabled cluster",
                    row: entry.row,
                    col: entry.col,
                    size: CLUSTERS_PER_SIDE,
                });
            }
        };
        quad.cluster(row, col).ok_or_else(unpopulated)?;
        debug!("enabling {}", describe(entry));
        Ok(Slot {
            die: index,
            quad: (qrow, qcol),
            cell: (row, col),
        })
    }

    pub fn is_overlay_applied(&self) -> bool {
        self.overlay_applied
    }

    pub fn die(&self, index: usize) -> Option<&Die> {
        self.dies.get(&index)
    }

    pub fn die_mut(&mut self, index: usize) -> Option<&mut Die> {
        self.dies.get_mut(&index)
    }

    /// Loaded dies keyed by document index.
    pub fn dies(&self) -> impl Iterator<Item = (usize, &Die)> {
        self.dies.iter().map(|(i, d)| (*i, d))
    }

    pub fn host_interface(&self) -> &HostInterface {
        &self.host_interface
    }

    pub fn host_interface_mut(&mut self) -> &mut HostInterface {
        &mut self.host_interface
    }

    pub fn die2die(&self) -> &Component {
        &self.die2die
    }

    pub fn die2die_mut(&mut self) -> &mut Component {
        &mut self.die2die
    }
}

/// Grid coordinates of one validated enablement entry.
struct Slot {
    die: usize,
    quad: (usize, usize),
    cell: (usize, usize),
}

fn describe(entry: &EnabledCluster) -> String {
    format!(
        "die:{};quad:{};row:{};col:{}",
        entry.die, entry.quad, entry.row, entry.col
    )
}

impl Aggregate for Topology {
    /// Dies in index order, then the host interface, then the die-to-die leaf.
    fn components(&self) -> Vec<&Component> {
        let mut out: Vec<&Component> = self.dies.values().flat_map(|d| d.components()).collect();
        out.extend(self.host_interface.components());
        out.push(&self.die2die);
        out
    }

    fn components_mut(&mut self) -> Vec<&mut Component> {
        let Topology {
            dies,
            die2die,
            host_interface,
            ..
        } = self;
        let mut out: Vec<&mut Component> =
            dies.values_mut().flat_map(|d| d.components_mut()).collect();
        out.extend(host_interface.components_mut());
        out.push(die2die);
        out
    }
}
