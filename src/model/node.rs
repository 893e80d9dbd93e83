//! Leaf component nodes, their type tags, and id allocation.

use crate::log::{FieldValue, LogField, LogRecord};

use std::fmt;

/// Fixed sub-unit placeholders owned by every Cbu cluster, in detail order.
pub const CBU_SUBUNITS: [&str; 22] = [
    "fcb0",
    "fcb1",
    "fcb2",
    "lcb0",
    "lcb1",
    "lcb2",
    "mmu_complex",
    "meps_satp",
    "mep0",
    "mep1",
    "memcip0",
    "memcip1",
    "cbui_xbar_wrap",
    "cbue_xbar_wrap",
    "cbue_tlm_wrap",
    "cbui_tlm_wrap",
    "lcep",
    "lcip",
    "ulcep",
    "ulcip",
    "big_rs",
    "cfg_mngr",
];

/// Type tag of a node. The tag's name is what a log record's unit refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Die,
    Quad,
    Ecore,
    Cbu,
    Tcu,
    Mcu,
    Lnb,
    HostInterface,
    H2g,
    G2h,
    Bmt,
    Pcie,
    CbusInj,
    CbusClt,
    NfiInj,
    NfiClt,
    Hbm,
    Iqr,
    Iqd,
    Irqa,
    D2d,
    Eq,
    Bin,
    /// One of `CBU_SUBUNITS`.
    Subunit(&'static str),
}

impl ComponentKind {
    pub fn name(&self) -> &'static str {
        match self {
            ComponentKind::Die => "die",
            ComponentKind::Quad => "quad",
            ComponentKind::Ecore => "Ecore",
            ComponentKind::Cbu => "Cbu",
            ComponentKind::Tcu => "Tcu",
            ComponentKind::Mcu => "MCU",
            ComponentKind::Lnb => "lnb",
            ComponentKind::HostInterface => "Host Interface",
            ComponentKind::H2g => "H2G",
            ComponentKind::G2h => "G2H",
            ComponentKind::Bmt => "bmt",
            ComponentKind::Pcie => "pcie",
            ComponentKind::CbusInj => "cbus inj",
            ComponentKind::CbusClt => "cbus clt",
            ComponentKind::NfiInj => "nfi inj",
            ComponentKind::NfiClt => "nfi clt",
            ComponentKind::Hbm => "hbm",
            ComponentKind::Iqr => "iqr",
            ComponentKind::Iqd => "iqd",
            ComponentKind::Irqa => "irqa",
            ComponentKind::D2d => "d2d",
            ComponentKind::Eq => "eq",
            ComponentKind::Bin => "bin",
            ComponentKind::Subunit(name) => *name,
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hands out ids for nodes the configuration does not number explicitly.
///
/// One allocator is threaded through the whole build, so auto-assigned ids
/// are unique and increasing for the lifetime of a topology.
#[derive(Debug, Default)]
pub struct IdAllocator {
    last: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id; the first one handed out is 1.
    pub fn next_id(&mut self) -> u64 {
        self.last += 1;
        self.last
    }

    /// Use `explicit` when the configuration supplies one, else allocate.
    pub fn assign(&mut self, explicit: Option<u64>) -> u64 {
        match explicit {
            Some(id) => id,
            None => self.next_id(),
        }
    }
}

/// Smallest addressable unit: identity, type tag, and the records attached to it.
#[derive(Debug, Clone)]
pub struct Component {
    id: u64,
    kind: ComponentKind,
    active_logs: Vec<LogRecord>,
}

impl Component {
    pub fn new(ids: &mut IdAllocator, kind: ComponentKind) -> Self {
        Self::with_id(ids.next_id(), kind)
    }

    pub fn with_id(id: u64, kind: ComponentKind) -> Self {
        Self {
            id,
            kind,
            active_logs: Vec::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.name()
    }

    /// Records addressed to this node itself (not to its descendants).
    pub fn active_logs(&self) -> &[LogRecord] {
        &self.active_logs
    }

    pub fn attach(&mut self, record: LogRecord) {
        self.active_logs.push(record);
    }
}

/// Recursive views shared by every node of the tree.
pub trait Aggregate {
    /// Every component at or below this node, depth-first, descendants
    /// before the node's own component. Stable across calls.
    fn components(&self) -> Vec<&Component>;

    fn components_mut(&mut self) -> Vec<&mut Component>;

    /// Project `field` out of every record attached at or below this node.
    fn attribute_from_active_logs(&self, field: LogField) -> Vec<FieldValue> {
        self.components()
            .into_iter()
            .flat_map(|c| c.active_logs.iter().map(move |r| r.project(field)))
            .collect()
    }

    fn total_active_logs(&self) -> usize {
        self.components()
            .iter()
            .map(|c| c.active_logs.len())
            .sum()
    }

    fn clear_active_logs(&mut self) {
        for c in self.components_mut() {
            c.active_logs.clear();
        }
    }
}

impl Aggregate for Component {
    fn components(&self) -> Vec<&Component> {
        vec![self]
    }

    fn components_mut(&mut self) -> Vec<&mut Component> {
        vec![self]
    }
}
