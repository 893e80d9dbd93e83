//! Topology model: the Die -> Quad -> Cluster -> Component tree, the host
//! interface tree and the builder that creates them from the chip document.
//!
//! Structure is fixed after construction. Only the `active_logs` lists on
//! components change, and only through the relink cycle.

pub mod build;
pub mod cluster;
pub mod host;
pub mod mcu;
pub mod node;
pub mod quad;
pub mod topology;

pub use cluster::Cluster;
pub use host::HostInterface;
pub use mcu::Mcu;
pub use node::{Aggregate, Component, ComponentKind};
pub use quad::{Die, Quad};
pub use topology::Topology;
