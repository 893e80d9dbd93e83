//! Enablement document (sl.json): which clusters are marked enabled.
//!
//! JSON shape:
//! {
//!   "enabled_clusters": [
//!     { "id": { "col": 0, "did": 0, "quad": 0, "row": 0 } },   // wrapped form
//!     { "col": 1, "die": 1, "quad": 3, "row": 7 }              // flat form
//!   ]
//! }
//!
//! `did` and `die` are accepted interchangeably.

use crate::error::TopologyError;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnablementSpec {
    #[serde(default)]
    pub enabled_clusters: Vec<EnabledClusterRef>,
}

/// Entries in the enablement list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EnabledClusterRef {
    // Original shape: { "id": { ... } }
    Wrapped { id: EnabledCluster },
    // Flat shape: { "col": .., "die": .., ... }
    Flat(EnabledCluster),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EnabledCluster {
    pub col: i64,
    #[serde(alias = "did")]
    pub die: i64,
    pub quad: i64,
    pub row: i64,
}

impl EnablementSpec {
    /// Flatten the list; an empty list is an error since nothing could ever be enabled.
    pub fn clusters(&self) -> Result<Vec<EnabledCluster>, TopologyError> {
        if self.enabled_clusters.is_empty() {
            return Err(TopologyError::EmptyEnablement);
        }
        Ok(self
            .enabled_clusters
            .iter()
            .map(|entry| match entry {
                EnabledClusterRef::Wrapped { id } | EnabledClusterRef::Flat(id) => *id,
            })
            .collect())
    }
}
