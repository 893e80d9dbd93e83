use crate::error::ProjectionError;
use crate::spec::ClusterAddr;

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Seconds since the epoch, truncated the way the log writer stores them.
pub type Timestamp = i64;

/// Transfer direction of a logged packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Io {
    In,
    Out,
}

impl Io {
    pub fn as_str(&self) -> &'static str {
        match self {
            Io::In => "in",
            Io::Out => "out",
        }
    }
}

impl FromStr for Io {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "in" => Ok(Io::In),
            "out" => Ok(Io::Out),
            other => Err(format!("expected 'in' or 'out', got {:?}", other)),
        }
    }
}

impl fmt::Display for Io {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single parsed log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub timestamp: Timestamp,
    pub cluster_id: ClusterAddr,
    pub area: String,
    /// "<name>" or "<name>;<index>".
    pub unit: String,
    pub io: Io,
    pub tid: u32,
    pub packet: String,
}

/// Fields that can be projected out of attached records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogField {
    Timestamp,
    ClusterId,
    Area,
    Unit,
    Io,
    Tid,
    Packet,
}

/// One projected value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Timestamp(Timestamp),
    ClusterId(ClusterAddr),
    Text(String),
    Io(Io),
    Tid(u32),
}

impl LogRecord {
    pub fn project(&self, field: LogField) -> FieldValue {
        match field {
            LogField::Timestamp => FieldValue::Timestamp(self.timestamp),
            LogField::ClusterId => FieldValue::ClusterId(self.cluster_id),
            LogField::Area => FieldValue::Text(self.area.clone()),
            LogField::Unit => FieldValue::Text(self.unit.clone()),
            LogField::Io => FieldValue::Io(self.io),
            LogField::Tid => FieldValue::Tid(self.tid),
            LogField::Packet => FieldValue::Text(self.packet.clone()),
        }
    }
}

impl FromStr for LogField {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept both the log-file spelling and the record field names.
        match s.trim() {
            "timestamp" | "timeStamp" => Ok(LogField::Timestamp),
            "cluster_id" | "clusterId" => Ok(LogField::ClusterId),
            "area" => Ok(LogField::Area),
            "unit" => Ok(LogField::Unit),
            "io" | "in/out" => Ok(LogField::Io),
            "tid" => Ok(LogField::Tid),
            "packet" | "packet/data" => Ok(LogField::Packet),
            other => Err(ProjectionError::UnknownField(other.to_string())),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Timestamp(t) => write!(f, "{}", t),
            FieldValue::ClusterId(addr) => write!(f, "{}", addr),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Io(io) => write!(f, "{}", io),
            FieldValue::Tid(tid) => write!(f, "{}", tid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn field_names_parse() {
        assert_eq!("tid".parse::<LogField>().unwrap(), LogField::Tid);
        assert_eq!("packet/data".parse::<LogField>().unwrap(), LogField::Packet);
        assert_eq!(
            "color".parse::<LogField>(),
            Err(ProjectionError::UnknownField("color".to_string()))
        );
    }

    #[test]
    fn io_round_trips_through_text() {
        assert_eq!("in".parse::<Io>().unwrap(), Io::In);
        assert_eq!(Io::Out.to_string(), "out");
        assert!("sideways".parse::<Io>().is_err());
    }
}
