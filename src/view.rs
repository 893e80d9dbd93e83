//! Presentation snapshot: the topology as a serializable tree with per-node
//! record counts, for the HTML report and for JSON dumps.

use crate::log::{FieldValue, FilterChain, LogField};
use crate::model::{
    Aggregate, Cluster, Component, ComponentKind, Die, HostInterface, Mcu, Quad, Topology,
};

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct NodeView {
    pub id: u64,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// (row, col) inside the parent grid, for quads and clusters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<(usize, usize)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_enable: Option<bool>,
    /// Records attached to this node itself.
    pub own_logs: usize,
    /// Records attached at or below this node.
    pub total_logs: usize,
    pub children: Vec<NodeView>,
}

impl NodeView {
    fn leaf(c: &Component) -> Self {
        let n = c.active_logs().len();
        Self {
            id: c.id(),
            kind: c.type_name(),
            label: None,
            position: None,
            is_enable: None,
            own_logs: n,
            total_logs: n,
            children: Vec::new(),
        }
    }

    fn composite(node: &Component, total_logs: usize, children: Vec<NodeView>) -> Self {
        Self {
            total_logs,
            children,
            ..Self::leaf(node)
        }
    }
}

/// Projected values of one leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeafValues {
    pub id: u64,
    pub kind: &'static str,
    pub values: Vec<FieldValue>,
}

/// Project `field` per leaf, keeping the leaves' order.
pub fn leaf_values(leaves: Vec<&Component>, field: LogField) -> Vec<LeafValues> {
    leaves
        .into_iter()
        .map(|c| LeafValues {
            id: c.id(),
            kind: c.type_name(),
            values: c.attribute_from_active_logs(field),
        })
        .collect()
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Totals {
    pub records: usize,
    pub dies_loaded: usize,
    pub clusters: usize,
    pub enabled_clusters: usize,
    pub enablement_applied: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportData {
    pub dies: Vec<NodeView>,
    pub host_interface: NodeView,
    pub die2die: NodeView,
    /// Active filters, rendered as text.
    pub filters: Vec<String>,
    pub totals: Totals,
}

pub fn snapshot(topology: &Topology, chain: &FilterChain) -> ReportData {
    let mut totals = Totals {
        records: topology.total_active_logs(),
        enablement_applied: topology.is_overlay_applied(),
        ..Totals::default()
    };

    let dies = topology
        .dies()
        .map(|(index, die)| {
            totals.dies_loaded += 1;
            for (_, quad) in die.quads() {
                for cluster in quad.clusters() {
                    totals.clusters += 1;
                    if cluster.is_enable() {
                        totals.enabled_clusters += 1;
                    }
                }
            }
            die_view(index, die)
        })
        .collect();

    ReportData {
        dies,
        host_interface: host_view(topology.host_interface()),
        die2die: NodeView::leaf(topology.die2die()),
        filters: chain.iter().map(|f| f.to_string()).collect(),
        totals,
    }
}

fn die_view(index: usize, die: &Die) -> NodeView {
    let children = die
        .quads()
        .map(|(pos, quad)| NodeView {
            position: Some(pos),
            ..quad_view(quad)
        })
        .collect();
    NodeView {
        label: Some(format!("Die {}", index)),
        is_enable: Some(die.is_enable()),
        ..NodeView::composite(die.node(), die.total_active_logs(), children)
    }
}

fn quad_view(quad: &Quad) -> NodeView {
    let mut children: Vec<NodeView> = quad.clusters().map(cluster_view).collect();
    children.push(NodeView::leaf(quad.hbm()));
    NodeView {
        label: Some(quad.name().to_string()).filter(|n| !n.is_empty()),
        is_enable: Some(quad.is_enable()),
        ..NodeView::composite(quad.node(), quad.total_active_logs(), children)
    }
}

fn cluster_view(cluster: &Cluster) -> NodeView {
    let children = cluster
        .details()
        .into_iter()
        .map(|c| match c.kind() {
            ComponentKind::Mcu => mcu_view(cluster.mcu()),
            _ => NodeView::leaf(c),
        })
        .collect();
    NodeView {
        position: Some(cluster.position()),
        is_enable: Some(cluster.is_enable()),
        ..NodeView::composite(cluster.node(), cluster.total_active_logs(), children)
    }
}

fn mcu_view(mcu: &Mcu) -> NodeView {
    let children = mcu.details().into_iter().map(NodeView::leaf).collect();
    NodeView::composite(mcu.node(), mcu.total_active_logs(), children)
}

fn host_view(host: &HostInterface) -> NodeView {
    let children = host
        .details()
        .into_iter()
        .map(|c| match c.kind() {
            ComponentKind::H2g => {
                let h2g = host.h2g();
                let leaves = h2g.details().into_iter().map(NodeView::leaf).collect();
                NodeView::composite(c, h2g.total_active_logs(), leaves)
            }
            ComponentKind::G2h => {
                let g2h = host.g2h();
                let leaves = g2h.details().into_iter().map(NodeView::leaf).collect();
                NodeView::composite(c, g2h.total_active_logs(), leaves)
            }
            _ => NodeView::leaf(c),
        })
        .collect();
    NodeView::composite(host.node(), host.total_active_logs(), children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::Filter;
    use crate::router::route;
    use crate::spec::ClusterAddr;
    use crate::testutil::{chip_json, enablement_json, record};
    use pretty_assertions::assert_eq;

    fn sum_own(view: &NodeView) -> usize {
        view.own_logs + view.children.iter().map(sum_own).sum::<usize>()
    }

    #[test]
    fn counts_roll_up_to_each_level() {
        let mut topo = Topology::new(
            serde_json::from_value(chip_json(2, 2)).unwrap(),
            serde_json::from_value(enablement_json(&[(1, 1, 0, 0)])).unwrap(),
        )
        .unwrap();
        topo.load_all_dies().unwrap();
        let addr = ClusterAddr::new(0, 1, 1, 0, 0);
        route(&mut topo, record(addr, "hbm", "hbm")).unwrap();
        route(&mut topo, record(addr, "mcu gate 0", "iqd")).unwrap();
        route(&mut topo, record(addr, "pcie", "pcie")).unwrap();

        let mut chain = FilterChain::new();
        chain.push(Filter::Area("hbm".into()));
        let data = snapshot(&topo, &chain);

        assert_eq!(data.totals.records, 3);
        assert_eq!(data.totals.dies_loaded, 2);
        assert_eq!(data.totals.clusters, 4);
        assert_eq!(data.totals.enabled_clusters, 1);
        assert!(data.totals.enablement_applied);
        assert_eq!(data.filters, vec!["Area: hbm".to_string()]);

        let die1 = &data.dies[1];
        assert_eq!(die1.is_enable, Some(true));
        assert_eq!(die1.total_logs, 2);
        assert_eq!(sum_own(die1), 2);
        let quad = &die1.children[1];
        assert_eq!(quad.position, Some((0, 1)));
        assert_eq!(quad.total_logs, 2);

        let cluster = &quad.children[0];
        let mcu = cluster.children.iter().find(|c| c.kind == "MCU").unwrap();
        assert_eq!((mcu.own_logs, mcu.total_logs), (0, 1));
        assert_eq!(data.host_interface.total_logs, 1);
        assert_eq!(data.dies[0].total_logs, 0);
    }

    #[test]
    fn snapshot_serializes_without_empty_fields() {
        let mut topo = Topology::new(
            serde_json::from_value(chip_json(1, 1)).unwrap(),
            serde_json::from_value(enablement_json(&[(0, 0, 0, 0)])).unwrap(),
        )
        .unwrap();
        topo.load_all_dies().unwrap();
        let json = serde_json::to_value(snapshot(&topo, &FilterChain::new())).unwrap();

        assert_eq!(json["die2die"]["kind"], "d2d");
        assert!(json["die2die"].get("position").is_none());
        assert_eq!(json["dies"][0]["children"][0]["position"], serde_json::json!([0, 0]));
    }

    #[test]
    fn leaf_values_follow_inner_detail_order() {
        let mut topo = Topology::new(
            serde_json::from_value(chip_json(1, 1)).unwrap(),
            serde_json::from_value(enablement_json(&[(0, 0, 0, 0)])).unwrap(),
        )
        .unwrap();
        topo.load_all_dies().unwrap();
        let mut on_eq = record(ClusterAddr::new(0, 0, 0, 0, 0), "mcu gate 0", "eq;1");
        on_eq.tid = 3;
        route(&mut topo, on_eq).unwrap();
        let mut on_pcie = record(ClusterAddr::new(0, 0, 0, -1, -1), "pcie", "pcie");
        on_pcie.tid = 4;
        route(&mut topo, on_pcie).unwrap();

        let cluster = topo.die(0).unwrap().quad(0, 0).unwrap().cluster(0, 0).unwrap();
        let leaves = leaf_values(cluster.all_inner_details(), LogField::Tid);
        assert_eq!(leaves.len(), cluster.all_inner_details().len());
        let hit: Vec<(&str, Vec<FieldValue>)> = leaves
            .iter()
            .filter(|l| !l.values.is_empty())
            .map(|l| (l.kind, l.values.clone()))
            .collect();
        assert_eq!(hit, vec![("eq", vec![FieldValue::Tid(3)])]);

        let host = leaf_values(topo.host_interface().all_inner_details(), LogField::Tid);
        assert_eq!(host[1].kind, "pcie");
        assert_eq!(host[1].values, vec![FieldValue::Tid(4)]);
    }
}
