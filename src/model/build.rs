//! Topology builder: turns validated document sections into tree nodes.
//!
//! Quads are placed in their die positionally (list index, row-major, wrapping
//! every four entries). Clusters are placed in their quad declaratively, from
//! each descriptor's own row/col.

use crate::error::TopologyError;
use crate::model::cluster::Cluster;
use crate::model::host::HostInterface;
use crate::model::node::IdAllocator;
use crate::model::quad::{Die, Quad};
use crate::spec::{
    CLUSTERS_PER_SIDE, ClusterSpec, DieSpec, HostInterfaceSpec, QUADS_PER_SIDE, QuadSpec,
};

use tracing::{debug, warn};

pub fn build_die(spec: &DieSpec, ids: &mut IdAllocator) -> Result<Die, TopologyError> {
    let mut die = Die::new(ids, spec.id);
    let slots = QUADS_PER_SIDE * QUADS_PER_SIDE;

    for (index, quad_spec) in spec.grid.quads.iter().enumerate() {
        let pos = index % slots;
        let (row, col) = (pos / QUADS_PER_SIDE, pos % QUADS_PER_SIDE);
        let quad = build_quad(quad_spec, ids)?;
        if let Some(old) = die.place(row, col, quad) {
            warn!(
                "die {}: quad {} at ({}, {}) replaced by list entry {}",
                die.id(),
                old.id(),
                row,
                col,
                index
            );
        }
    }

    debug!("built die {}", die.id());
    Ok(die)
}

pub fn build_quad(spec: &QuadSpec, ids: &mut IdAllocator) -> Result<Quad, TopologyError> {
    let mut quad = Quad::new(ids, spec.id, spec.name.clone());

    let ecore = spec.ecore()?;
    let (row, col) = grid_position("Ecore", &ecore)?;
    place(&mut quad, Cluster::ecore(ids, &ecore, row, col));

    for cbu in spec.cbus()? {
        let (row, col) = grid_position("Cbu", &cbu)?;
        place(&mut quad, Cluster::cbu(ids, &cbu, row, col));
    }

    for tcu in spec.tcus()? {
        let (row, col) = grid_position("Tcu", &tcu)?;
        place(&mut quad, Cluster::tcu(ids, &tcu, row, col));
    }

    Ok(quad)
}

pub fn build_host_interface(spec: &HostInterfaceSpec, ids: &mut IdAllocator) -> HostInterface {
    HostInterface::new(ids, spec)
}

fn place(quad: &mut Quad, cluster: Cluster) {
    if let Some(old) = quad.place(cluster) {
        let (row, col) = old.position();
        warn!(
            "quad {}: cluster {} at ({}, {}) overwritten",
            quad.id(),
            old.id(),
            row,
            col
        );
    }
}

fn grid_position(
    component: &'static str,
    spec: &ClusterSpec,
) -> Result<(usize, usize), TopologyError> {
    let in_grid = |v: i64| usize::try_from(v).ok().filter(|v| *v < CLUSTERS_PER_SIDE);
    match (in_grid(spec.row), in_grid(spec.col)) {
        (Some(row), Some(col)) => Ok((row, col)),
        _ => Err(TopologyError::PositionOutOfRange {
            component,
            row: spec.row,
            col: spec.col,
            size: CLUSTERS_PER_SIDE,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node::{Aggregate, ComponentKind};
    use crate::testutil::quad_json;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn die_spec(value: serde_json::Value) -> DieSpec {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn quads_are_placed_by_list_order() {
        let spec = die_spec(json!({"id": 0, "GRID": {"QUADS": [
            quad_json(1, 0, 0, 10),
            quad_json(2, 0, 0, 20),
            quad_json(3, 0, 0, 30),
            quad_json(4, 0, 0, 40),
        ]}}));
        let die = build_die(&spec, &mut IdAllocator::new()).unwrap();

        let placed: Vec<((usize, usize), u64)> =
            die.quads().map(|(pos, q)| (pos, q.id())).collect();
        assert_eq!(
            placed,
            vec![((0, 0), 1), ((0, 1), 2), ((1, 0), 3), ((1, 1), 4)]
        );
    }

    #[test]
    fn fifth_quad_wraps_onto_the_first_slot() {
        let spec = die_spec(json!({"id": 0, "GRID": {"QUADS": [
            quad_json(1, 0, 0, 10),
            quad_json(2, 0, 0, 20),
            quad_json(3, 0, 0, 30),
            quad_json(4, 0, 0, 40),
            quad_json(5, 0, 0, 50),
        ]}}));
        let die = build_die(&spec, &mut IdAllocator::new()).unwrap();
        assert_eq!(die.quad(0, 0).map(Quad::id), Some(5));
    }

    #[test]
    fn clusters_land_at_their_declared_position() {
        let spec: QuadSpec = serde_json::from_value(json!({
            "id": 1,
            "Ecore": {"row": 3, "col": 4, "cluster_id": 10},
            "CBUs": [{"row": 0, "col": 7, "cluster_id": 11}],
            "TCUs": [{"row": 7, "col": 0, "cluster_id": 12}]
        }))
        .unwrap();
        let quad = build_quad(&spec, &mut IdAllocator::new()).unwrap();

        let ecore = quad.cluster(3, 4).unwrap();
        assert_eq!((ecore.id(), ecore.kind()), (10, ComponentKind::Ecore));
        assert_eq!(quad.cluster(0, 7).map(|c| c.kind()), Some(ComponentKind::Cbu));
        assert_eq!(quad.cluster(7, 0).map(|c| c.kind()), Some(ComponentKind::Tcu));
        assert_eq!(quad.clusters().count(), 3);
    }

    #[test]
    fn cluster_outside_the_grid_is_rejected() {
        let spec: QuadSpec = serde_json::from_value(json!({
            "Ecore": {"row": 8, "col": 0, "cluster_id": 10}
        }))
        .unwrap();
        let err = build_quad(&spec, &mut IdAllocator::new()).unwrap_err();
        assert!(matches!(
            err,
            TopologyError::PositionOutOfRange { component: "Ecore", row: 8, col: 0, .. }
        ));
    }

    #[test]
    fn quad_without_ecore_aborts_the_die() {
        let spec = die_spec(json!({"GRID": {"QUADS": [{"id": 1, "name": "Q0"}]}}));
        assert!(matches!(
            build_die(&spec, &mut IdAllocator::new()),
            Err(TopologyError::MissingComponent("Ecore"))
        ));
    }

    #[test]
    fn auto_ids_are_unique_across_the_die() {
        let spec = die_spec(json!({"GRID": {"QUADS": [
            quad_json(1, 0, 0, 10),
            quad_json(2, 0, 0, 20),
        ]}}));
        let die = build_die(&spec, &mut IdAllocator::new()).unwrap();

        // Explicit ids (quads, clusters) may repeat across documents, but the
        // allocator never hands out the same id twice.
        let auto: Vec<u64> = die
            .components()
            .iter()
            .filter(|c| !matches!(c.kind(), ComponentKind::Quad | ComponentKind::Ecore))
            .map(|c| c.id())
            .collect();
        let mut dedup = auto.clone();
        dedup.sort_unstable();
        dedup.dedup();
        assert_eq!(dedup.len(), auto.len());
    }
}
