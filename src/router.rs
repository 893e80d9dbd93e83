//! Address resolver: attach one log record to the leaf its address denotes.
//!
//! The record's area picks a category. Host-level categories go straight to
//! a host interface or die-to-die leaf; everything else walks
//! die -> quad -> cluster using the structured address, then picks a leaf by
//! unit name. Units of a repeating kind (eq, Ecore) carry a 1-based index
//! after a `;` that selects among same-named siblings.

use crate::error::RouteError;
use crate::log::LogRecord;
use crate::model::{Component, ComponentKind, Topology};
use crate::spec::{CLUSTERS_PER_SIDE, QUADS_PER_SIDE, quad_position};

use std::fmt;
use tracing::{debug, warn};

/// Coarse routing category of an area string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaCategory {
    /// Host-level when the record carries no cluster (row -1), else a cluster bmt.
    Bmt,
    Pcie,
    HostInterface,
    Die2Die,
    Hbm,
    Mcu,
    /// Ecore, Cbu and LNB areas: resolved against the cluster's detail list.
    Cluster,
}

const AREAS: &[(&str, AreaCategory)] = &[
    ("hbm", AreaCategory::Hbm),
    ("d2d", AreaCategory::Die2Die),
    ("bmt", AreaCategory::Bmt),
    ("host if", AreaCategory::HostInterface),
    ("pcie", AreaCategory::Pcie),
    ("ecore req cip", AreaCategory::Cluster),
    ("ecore rsp cip", AreaCategory::Cluster),
    ("mcu gate 0", AreaCategory::Mcu),
    ("mcu gate 1", AreaCategory::Mcu),
    ("mem0", AreaCategory::Cluster),
    ("mem1", AreaCategory::Cluster),
    ("lcip", AreaCategory::Cluster),
    ("nfi", AreaCategory::Cluster),
];

pub fn categorize(area: &str) -> Option<AreaCategory> {
    AREAS
        .iter()
        .find(|(name, _)| *name == area)
        .map(|(_, category)| *category)
}

/// Why a well-formed record ended up attached nowhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    UnrecognizedArea(String),
    /// Address is in range but nothing is built there (die not loaded, empty slot).
    NotPopulated,
    /// Repeating unit without a usable index, e.g. `eq` or `eq;x`.
    MalformedUnit(String),
    /// No leaf with that name (and index) under the resolved node.
    NoMatchingUnit(String),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::UnrecognizedArea(area) => write!(f, "unrecognized area '{}'", area),
            DropReason::NotPopulated => f.write_str("address not populated"),
            DropReason::MalformedUnit(unit) => write!(f, "malformed unit '{}'", unit),
            DropReason::NoMatchingUnit(unit) => write!(f, "no leaf matches unit '{}'", unit),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Attached,
    Dropped(DropReason),
}

/// Route `record` into `topology`.
///
/// Out-of-range addresses are errors; every other failure to place the record
/// is a `Dropped` outcome. Either way nothing is attached.
pub fn route(topology: &mut Topology, record: LogRecord) -> Result<RouteOutcome, RouteError> {
    let Some(category) = categorize(&record.area) else {
        warn!("unrecognized log area '{}', record dropped", record.area);
        return Ok(RouteOutcome::Dropped(DropReason::UnrecognizedArea(
            record.area.clone(),
        )));
    };

    let target: Result<&mut Component, DropReason> = match category {
        AreaCategory::Bmt if record.cluster_id.row == -1 => {
            Ok(topology.host_interface_mut().bmt_mut())
        }
        AreaCategory::Pcie => Ok(topology.host_interface_mut().pcie_mut()),
        AreaCategory::HostInterface => select_unit(
            topology.host_interface_mut().all_inner_details_mut(),
            &record.unit,
            ComponentKind::Eq,
        ),
        AreaCategory::Die2Die => Ok(topology.die2die_mut()),
        _ => resolve_in_die(topology, category, &record)?,
    };

    match target {
        Ok(leaf) => {
            leaf.attach(record);
            Ok(RouteOutcome::Attached)
        }
        Err(reason) => {
            debug!("dropping record at {}: {}", record.cluster_id, reason);
            Ok(RouteOutcome::Dropped(reason))
        }
    }
}

fn resolve_in_die<'t>(
    topology: &'t mut Topology,
    category: AreaCategory,
    record: &LogRecord,
) -> Result<Result<&'t mut Component, DropReason>, RouteError> {
    let addr = record.cluster_id;

    let die_count = topology.die_count();
    let die_index = usize::try_from(addr.die)
        .ok()
        .filter(|d| *d < die_count)
        .ok_or_else(|| out_of_range("die", addr.die, die_count))?;
    let (qrow, qcol) = quad_position(addr.quad)
        .ok_or_else(|| out_of_range("quad", addr.quad, QUADS_PER_SIDE * QUADS_PER_SIDE))?;

    let cell = if category == AreaCategory::Hbm {
        None
    } else {
        Some((grid_index("row", addr.row)?, grid_index("col", addr.col)?))
    };

    let Some(quad) = topology
        .die_mut(die_index)
        .and_then(|die| die.quad_mut(qrow, qcol))
    else {
        return Ok(Err(DropReason::NotPopulated));
    };

    let Some((row, col)) = cell else {
        return Ok(Ok(quad.hbm_mut()));
    };
    let Some(cluster) = quad.cluster_mut(row, col) else {
        return Ok(Err(DropReason::NotPopulated));
    };

    Ok(match category {
        AreaCategory::Mcu => select_unit(
            cluster.mcu_mut().details_mut(),
            &record.unit,
            ComponentKind::Eq,
        ),
        _ => select_unit(cluster.details_mut(), &record.unit, ComponentKind::Ecore),
    })
}

fn grid_index(field: &'static str, value: i32) -> Result<usize, RouteError> {
    usize::try_from(value)
        .ok()
        .filter(|v| *v < CLUSTERS_PER_SIDE)
        .ok_or_else(|| out_of_range(field, value, CLUSTERS_PER_SIDE))
}

fn out_of_range(field: &'static str, value: i32, bound: usize) -> RouteError {
    let err = RouteError::AddressOutOfRange {
        field,
        value,
        bound,
    };
    warn!("{}", err);
    err
}

/// Split `unit` into its name and optional index text.
pub fn split_unit(unit: &str) -> (&str, Option<&str>) {
    match unit.split_once(';') {
        Some((name, index)) => (name, Some(index)),
        None => (unit, None),
    }
}

/// First candidate whose type name matches the unit name. For the
/// `repeating` kind, the n-th match (1-based) is taken instead.
fn select_unit<'c>(
    candidates: Vec<&'c mut Component>,
    unit: &str,
    repeating: ComponentKind,
) -> Result<&'c mut Component, DropReason> {
    let (name, index) = split_unit(unit);

    let wanted = if name == repeating.name() {
        let n = index
            .and_then(|i| i.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .ok_or_else(|| DropReason::MalformedUnit(unit.to_string()))?;
        Some(n)
    } else {
        None
    };

    let mut seen = 0usize;
    for candidate in candidates {
        if candidate.type_name() != name {
            continue;
        }
        if let Some(n) = wanted {
            seen += 1;
            if seen != n {
                continue;
            }
        }
        return Ok(candidate);
    }
    Err(DropReason::NoMatchingUnit(unit.to_string()))
}
