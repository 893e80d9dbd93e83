//! Chip topology document (chip_data.json).
//!
//! JSON shape:
//! {
//!   "Top": {
//!     "DIES": [
//!       {
//!         "id": 0,
//!         "GRID": {
//!           "QUADS": [                      // placed row-major by list order
//!             {
//!               "id": 1,
//!               "name": "Q0",
//!               "Ecore": { "row": 0, "col": 0, "cluster_id": 10,
//!                          "MCU": { "EQs": [{ "id": 1 }] },
//!                          "Ecores": [{}, {}] },  // one entry per ecore instance
//!               "CBUs": [ { "row": 0, "col": 1, "cluster_id": 11 } ],
//!               "TCUs": [ { "row": 1, "col": 0, "cluster_id": 12 } ]
//!             }
//!           ]
//!         }
//!       }
//!     ],
//!     "Host Interface": { "G2H": { "EQs": [{ "id": 100 }] } }
//!   }
//! }
//!
//! Required sections (Top, DIES, Host Interface, each quad's Ecore) fail fast
//! when absent. Variable-length lists default to empty. Cluster descriptors
//! are kept as raw JSON until the quad is built so a malformed entry can be
//! reported with its original text.

use crate::error::TopologyError;

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChipSpec {
    #[serde(rename = "Top", default)]
    pub top: Option<TopSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopSpec {
    #[serde(rename = "DIES", default)]
    pub dies: Option<Vec<DieSpec>>,

    #[serde(rename = "Host Interface", default)]
    pub host_interface: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DieSpec {
    #[serde(default)]
    pub id: Option<u64>,

    #[serde(rename = "GRID", default)]
    pub grid: GridSpec,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GridSpec {
    #[serde(rename = "QUADS", default)]
    pub quads: Vec<QuadSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuadSpec {
    #[serde(default)]
    pub id: Option<u64>,

    #[serde(default)]
    pub name: String,

    #[serde(rename = "Ecore", default)]
    pub ecore: Option<Value>,

    #[serde(rename = "CBUs", default)]
    pub cbus: Vec<Value>,

    #[serde(rename = "TCUs", default)]
    pub tcus: Vec<Value>,
}

/// Validated cluster descriptor (Ecore, Cbu or Tcu).
#[derive(Debug, Clone, Deserialize)]
pub struct ClusterSpec {
    pub row: i64,
    pub col: i64,
    pub cluster_id: u64,

    #[serde(rename = "MCU", default)]
    pub mcu: Option<QueueListSpec>,

    /// Ecore instances; only their count matters.
    #[serde(rename = "Ecores", default)]
    pub ecores: Vec<Value>,
}

/// A section carrying a variable list of event queues (MCU, G2H).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueListSpec {
    #[serde(rename = "EQs", default)]
    pub eqs: Vec<EqSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EqSpec {
    pub id: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostInterfaceSpec {
    #[serde(rename = "G2H", default)]
    pub g2h: Option<QueueListSpec>,
}

impl ChipSpec {
    /// Die descriptors, in document order.
    pub fn dies(&self) -> Result<&[DieSpec], TopologyError> {
        self.top
            .as_ref()
            .and_then(|top| top.dies.as_deref())
            .ok_or(TopologyError::MissingSection("Top.DIES"))
    }

    /// The host-interface section. Absent, null or empty is a configuration error.
    pub fn host_interface(&self) -> Result<HostInterfaceSpec, TopologyError> {
        let raw = self
            .top
            .as_ref()
            .and_then(|top| top.host_interface.as_ref())
            .ok_or(TopologyError::MissingSection("Top.Host Interface"))?;

        match raw {
            Value::Null => Err(TopologyError::MissingSection("Top.Host Interface")),
            Value::Object(map) if map.is_empty() => {
                Err(TopologyError::MissingSection("Top.Host Interface"))
            }
            Value::Object(_) => serde_json::from_value(raw.clone()).map_err(|e| {
                TopologyError::InvalidComponentData {
                    component: "Host Interface",
                    data: format!("{} ({})", raw, e),
                }
            }),
            other => Err(TopologyError::InvalidComponentData {
                component: "Host Interface",
                data: other.to_string(),
            }),
        }
    }
}

impl QuadSpec {
    /// The quad's single required Ecore descriptor.
    pub fn ecore(&self) -> Result<ClusterSpec, TopologyError> {
        match &self.ecore {
            None | Some(Value::Null) => Err(TopologyError::MissingComponent("Ecore")),
            Some(Value::Object(map)) if map.is_empty() => {
                Err(TopologyError::MissingComponent("Ecore"))
            }
            Some(raw) => parse_descriptor("Ecore", raw),
        }
    }

    pub fn cbus(&self) -> Result<Vec<ClusterSpec>, TopologyError> {
        self.cbus
            .iter()
            .map(|raw| parse_descriptor("Cbu", raw))
            .collect()
    }

    pub fn tcus(&self) -> Result<Vec<ClusterSpec>, TopologyError> {
        self.tcus
            .iter()
            .map(|raw| parse_descriptor("Tcu", raw))
            .collect()
    }
}

fn parse_descriptor(component: &'static str, raw: &Value) -> Result<ClusterSpec, TopologyError> {
    if !raw.is_object() {
        return Err(TopologyError::InvalidComponentData {
            component,
            data: raw.to_string(),
        });
    }
    serde_json::from_value(raw.clone()).map_err(|e| TopologyError::InvalidComponentData {
        component,
        data: format!("{} ({})", raw, e),
    })
}
