//! Cluster slots of a quad grid.
//!
//! Every cluster owns an MCU subtree and an LNB leaf. What else it owns
//! depends on its variant:
//! - Ecore: bmt, cbus/nfi inject+collect leaves and a list of ecore instances
//! - Cbu: the fixed `CBU_SUBUNITS` placeholders
//! - Tcu: nothing extra

use crate::model::mcu::Mcu;
use crate::model::node::{Aggregate, CBU_SUBUNITS, Component, ComponentKind, IdAllocator};
use crate::spec::ClusterSpec;

#[derive(Debug, Clone)]
pub struct EcoreUnits {
    bmt: Component,
    cbus_inj: Component,
    cbus_clt: Component,
    nfi_inj: Component,
    nfi_clt: Component,
    ecores: Vec<Component>,
}

impl EcoreUnits {
    fn new(ids: &mut IdAllocator, instances: usize) -> Self {
        Self {
            bmt: Component::new(ids, ComponentKind::Bmt),
            cbus_inj: Component::new(ids, ComponentKind::CbusInj),
            cbus_clt: Component::new(ids, ComponentKind::CbusClt),
            nfi_inj: Component::new(ids, ComponentKind::NfiInj),
            nfi_clt: Component::new(ids, ComponentKind::NfiClt),
            ecores: (0..instances)
                .map(|_| Component::new(ids, ComponentKind::Ecore))
                .collect(),
        }
    }

    fn fixed(&self) -> Vec<&Component> {
        let mut out = vec![
            &self.bmt,
            &self.cbus_inj,
            &self.cbus_clt,
            &self.nfi_inj,
            &self.nfi_clt,
        ];
        out.extend(self.ecores.iter());
        out
    }

    fn fixed_mut(&mut self) -> Vec<&mut Component> {
        let mut out = vec![
            &mut self.bmt,
            &mut self.cbus_inj,
            &mut self.cbus_clt,
            &mut self.nfi_inj,
            &mut self.nfi_clt,
        ];
        out.extend(self.ecores.iter_mut());
        out
    }
}

#[derive(Debug, Clone)]
pub struct CbuUnits {
    subunits: Vec<Component>,
}

impl CbuUnits {
    fn new(ids: &mut IdAllocator) -> Self {
        Self {
            subunits: CBU_SUBUNITS
                .iter()
                .map(|name| Component::new(ids, ComponentKind::Subunit(*name)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TcuUnits;

#[derive(Debug, Clone)]
pub enum ClusterVariant {
    Ecore(EcoreUnits),
    Cbu(CbuUnits),
    Tcu(TcuUnits),
}

impl ClusterVariant {
    pub fn kind(&self) -> ComponentKind {
        match self {
            ClusterVariant::Ecore(_) => ComponentKind::Ecore,
            ClusterVariant::Cbu(_) => ComponentKind::Cbu,
            ClusterVariant::Tcu(_) => ComponentKind::Tcu,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Cluster {
    node: Component,
    row: usize,
    col: usize,
    is_enable: bool,
    mcu: Mcu,
    lnb: Component,
    variant: ClusterVariant,
}

impl Cluster {
    /// Build an Ecore cluster; one ecore instance per `Ecores` entry.
    pub fn ecore(ids: &mut IdAllocator, spec: &ClusterSpec, row: usize, col: usize) -> Self {
        let (mcu, lnb) = shared_units(ids, spec);
        let units = EcoreUnits::new(ids, spec.ecores.len());
        Self::assemble(spec, row, col, mcu, lnb, ClusterVariant::Ecore(units))
    }

    pub fn cbu(ids: &mut IdAllocator, spec: &ClusterSpec, row: usize, col: usize) -> Self {
        let (mcu, lnb) = shared_units(ids, spec);
        let units = CbuUnits::new(ids);
        Self::assemble(spec, row, col, mcu, lnb, ClusterVariant::Cbu(units))
    }

    pub fn tcu(ids: &mut IdAllocator, spec: &ClusterSpec, row: usize, col: usize) -> Self {
        let (mcu, lnb) = shared_units(ids, spec);
        Self::assemble(spec, row, col, mcu, lnb, ClusterVariant::Tcu(TcuUnits))
    }

    fn assemble(
        spec: &ClusterSpec,
        row: usize,
        col: usize,
        mcu: Mcu,
        lnb: Component,
        variant: ClusterVariant,
    ) -> Self {
        Self {
            node: Component::with_id(spec.cluster_id, variant.kind()),
            row,
            col,
            is_enable: false,
            mcu,
            lnb,
            variant,
        }
    }

    pub fn node(&self) -> &Component {
        &self.node
    }

    pub fn id(&self) -> u64 {
        self.node.id()
    }

    pub fn kind(&self) -> ComponentKind {
        self.node.kind()
    }

    pub fn position(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    pub fn is_enable(&self) -> bool {
        self.is_enable
    }

    pub fn set_enable(&mut self, enable: bool) {
        self.is_enable = enable;
    }

    pub fn mcu(&self) -> &Mcu {
        &self.mcu
    }

    pub fn mcu_mut(&mut self) -> &mut Mcu {
        &mut self.mcu
    }

    /// Immediate, semantically named children (see `details_of`).
    pub fn details(&self) -> Vec<&Component> {
        details_of(self)
    }

    pub fn details_mut(&mut self) -> Vec<&mut Component> {
        details_of_mut(self)
    }

    /// Every leaf below the cluster, excluding the cluster node itself.
    pub fn all_inner_details(&self) -> Vec<&Component> {
        let mut out = Vec::new();
        match &self.variant {
            ClusterVariant::Ecore(units) => {
                out.extend(units.fixed());
                out.push(&self.lnb);
                out.push(self.mcu.node());
                out.extend(self.mcu.details());
            }
            ClusterVariant::Cbu(units) => {
                out.push(&self.lnb);
                out.push(self.mcu.node());
                out.extend(self.mcu.details());
                out.extend(units.subunits.iter());
            }
            ClusterVariant::Tcu(_) => {
                out.push(&self.lnb);
                out.push(self.mcu.node());
                out.extend(self.mcu.details());
            }
        }
        out
    }
}

fn shared_units(ids: &mut IdAllocator, spec: &ClusterSpec) -> (Mcu, Component) {
    let mcu = Mcu::new(ids, spec.mcu.as_ref());
    let lnb = Component::new(ids, ComponentKind::Lnb);
    (mcu, lnb)
}

/// Direct details of a cluster, dispatched on its variant.
///
/// Ecore: bmt, cbus inj, cbus clt, nfi inj, nfi clt, ecores.., MCU, lnb.
/// Cbu: MCU, lnb, subunits... Tcu: MCU, lnb.
pub fn details_of(cluster: &Cluster) -> Vec<&Component> {
    match &cluster.variant {
        ClusterVariant::Ecore(units) => {
            let mut out = units.fixed();
            out.push(cluster.mcu.node());
            out.push(&cluster.lnb);
            out
        }
        ClusterVariant::Cbu(units) => {
            let mut out = vec![cluster.mcu.node(), &cluster.lnb];
            out.extend(units.subunits.iter());
            out
        }
        ClusterVariant::Tcu(_) => vec![cluster.mcu.node(), &cluster.lnb],
    }
}

/// Mutable counterpart of `details_of`, same order.
pub fn details_of_mut(cluster: &mut Cluster) -> Vec<&mut Component> {
    let Cluster {
        mcu, lnb, variant, ..
    } = cluster;
    match variant {
        ClusterVariant::Ecore(units) => {
            let mut out = units.fixed_mut();
            out.push(mcu.node_mut());
            out.push(lnb);
            out
        }
        ClusterVariant::Cbu(units) => {
            let mut out = vec![mcu.node_mut(), lnb];
            out.extend(units.subunits.iter_mut());
            out
        }
        ClusterVariant::Tcu(_) => vec![mcu.node_mut(), lnb],
    }
}

impl Aggregate for Cluster {
    fn components(&self) -> Vec<&Component> {
        let mut out = Vec::new();
        match &self.variant {
            ClusterVariant::Ecore(units) => {
                out.extend(units.fixed());
                out.extend(self.mcu.components());
                out.push(&self.lnb);
            }
            ClusterVariant::Cbu(units) => {
                out.extend(self.mcu.components());
                out.push(&self.lnb);
                out.extend(units.subunits.iter());
            }
            ClusterVariant::Tcu(_) => {
                out.extend(self.mcu.components());
                out.push(&self.lnb);
            }
        }
        out.push(&self.node);
        out
    }

    fn components_mut(&mut self) -> Vec<&mut Component> {
        let Cluster {
            node,
            mcu,
            lnb,
            variant,
            ..
        } = self;
        let mut out = Vec::new();
        match variant {
            ClusterVariant::Ecore(units) => {
                out.extend(units.fixed_mut());
                out.extend(mcu.components_mut());
                out.push(lnb);
            }
            ClusterVariant::Cbu(units) => {
                out.extend(mcu.components_mut());
                out.push(lnb);
                out.extend(units.subunits.iter_mut());
            }
            ClusterVariant::Tcu(_) => {
                out.extend(mcu.components_mut());
                out.push(lnb);
            }
        }
        out.push(node);
        out
    }
}
