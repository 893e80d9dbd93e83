//! Spec layer: JSON schemas for the configuration documents + address type.
//!
//! This module is intentionally separate from log handling and the topology
//! tree. It owns:
//! - ClusterAddr (structured hardware address)
//! - Chip topology document (dies, quads, clusters, host interface)
//! - Enablement document (enabled cluster list)

pub mod addr;
pub mod chip;
pub mod enable;

pub use addr::{CLUSTERS_PER_SIDE, ClusterAddr, QUADS_PER_SIDE, quad_position};
pub use chip::{ChipSpec, ClusterSpec, DieSpec, HostInterfaceSpec, QuadSpec, QueueListSpec};
pub use enable::{EnabledCluster, EnablementSpec};

use anyhow::Context;
use std::fs;
use std::path::Path;

/// Read and deserialize the chip topology document.
pub fn load_chip_spec(path: &Path) -> anyhow::Result<ChipSpec> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("read chip topology file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("chip topology file {} is not valid JSON", path.display()))
}

/// Read and deserialize the enablement document.
pub fn load_enablement(path: &Path) -> anyhow::Result<EnablementSpec> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("read enablement file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("enablement file {} is not valid JSON", path.display()))
}
