//! Fixtures shared by unit tests.

use crate::log::{Io, LogRecord};
use crate::spec::ClusterAddr;

use serde_json::{Value, json};

/// A record with timestamp 1, tid 1, direction `in` and an empty payload.
pub fn record(addr: ClusterAddr, area: &str, unit: &str) -> LogRecord {
    LogRecord {
        timestamp: 1,
        cluster_id: addr,
        area: area.to_string(),
        unit: unit.to_string(),
        io: Io::In,
        tid: 1,
        packet: String::new(),
    }
}

/// Quad descriptor holding only its Ecore, at (row, col), with one MCU queue.
pub fn quad_json(id: u64, row: i64, col: i64, cluster_id: u64) -> Value {
    json!({
        "id": id,
        "name": format!("Q{}", id),
        "Ecore": {
            "row": row,
            "col": col,
            "cluster_id": cluster_id,
            "MCU": {"EQs": [{"id": cluster_id * 100 + 1}]},
            "Ecores": [{}]
        }
    })
}

/// Topology document with `dies` dies of `quads` quads each; every quad holds
/// one Ecore at (0, 0). The host interface has two G2H queues.
pub fn chip_json(dies: usize, quads: usize) -> Value {
    let die_list: Vec<Value> = (0..dies)
        .map(|d| {
            let quad_list: Vec<Value> = (0..quads)
                .map(|q| {
                    let id = (d * 10 + q + 1) as u64;
                    quad_json(id, 0, 0, 1000 + id)
                })
                .collect();
            json!({"id": d, "GRID": {"QUADS": quad_list}})
        })
        .collect();

    json!({"Top": {
        "DIES": die_list,
        "Host Interface": {"G2H": {"EQs": [{"id": 9001}, {"id": 9002}]}}
    }})
}

/// Enablement document from `(die, quad, row, col)` entries.
pub fn enablement_json(entries: &[(i64, i64, i64, i64)]) -> Value {
    let list: Vec<Value> = entries
        .iter()
        .map(|(die, quad, row, col)| {
            json!({"id": {"col": col, "did": die, "quad": quad, "row": row}})
        })
        .collect();
    json!({ "enabled_clusters": list })
}
