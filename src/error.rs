//! Error taxonomy for topology construction, routing, filtering and projection.

use crate::log::FilterKind;

/// Configuration errors: a required topology section is missing or malformed.
/// Construction aborts on any of these.
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    /// A structurally required document section is absent or empty.
    #[error("missing required section: {0}")]
    MissingSection(&'static str),

    /// A quad has no descriptor for a component it must own.
    #[error("missing data for component: {0}")]
    MissingComponent(&'static str),

    /// A component descriptor is not a well-formed record.
    #[error("invalid {component} data: {data}")]
    InvalidComponentData {
        /// Component kind being parsed.
        component: &'static str,
        /// The offending raw value.
        data: String,
    },

    /// A descriptor places a component outside its parent grid.
    #[error("{component} position ({row}, {col}) is outside the {size}x{size} grid")]
    PositionOutOfRange {
        component: &'static str,
        row: i64,
        col: i64,
        size: usize,
    },

    /// The requested die index is not in the document.
    #[error("die index {index} is out of range (document has {count} dies)")]
    DieIndexOutOfRange { index: usize, count: usize },

    /// The enablement document lists no clusters.
    #[error("enablement document lists no clusters")]
    EmptyEnablement,

    /// An index into a fixed-size grid is out of bounds.
    #[error("{what} index {index} is outside 0..{bound}")]
    IndexOutOfRange {
        what: &'static str,
        index: i64,
        bound: usize,
    },

    /// The enablement document names a die that has not been loaded.
    #[error("enabled cluster references die {0}, which is not loaded")]
    DieNotLoaded(i64),

    /// The enablement document names an address with no component behind it.
    #[error("enabled cluster {0} does not name a built cluster")]
    UnpopulatedSlot(String),
}

/// Per-record routing failure. The record is skipped and routing continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    /// A structured address field lies outside the built topology's bounds.
    #[error("address field {field}={value} is outside 0..{bound}")]
    AddressOutOfRange {
        field: &'static str,
        value: i32,
        bound: usize,
    },
}

/// Rejected filter-chain mutation. The chain is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterStateError {
    #[error("filter {0} is already in the chain, update it instead")]
    AlreadyPresent(FilterKind),

    #[error("filter {0} is not in the chain")]
    NotPresent(FilterKind),

    #[error("invalid payload for filter {kind}: {reason}")]
    InvalidPayload { kind: FilterKind, reason: String },
}

/// Attribute name that does not correspond to any projectable log field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectionError {
    #[error("unknown log attribute '{0}'")]
    UnknownField(String),
}

/// Failure of a filter-chain operation, either up front or while relinking.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error(transparent)]
    State(#[from] FilterStateError),

    #[error("log source failed during relink: {0:#}")]
    Source(anyhow::Error),
}
