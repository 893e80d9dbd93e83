//! Log records, the simulator log-line format, record filters and the
//! producer that streams filtered records into a relink cycle.

pub mod filter;
pub mod parse;
pub mod row;
pub mod source;

pub use filter::{Filter, FilterChain, FilterKind, QuadSelector};
pub use row::{FieldValue, Io, LogField, LogRecord, Timestamp};
pub use source::{LogSource, ThreadedLogSource};
