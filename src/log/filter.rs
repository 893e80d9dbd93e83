//! Record-selection filters and the kind-keyed filter chain.
//!
//! The chain holds at most one filter per kind, in insertion order. A record
//! is accepted when every filter in the chain accepts it; an empty chain
//! accepts everything.

use crate::log::row::{Io, LogRecord, Timestamp};
use crate::spec::ClusterAddr;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterKind {
    Time,
    TimeRange,
    Cluster,
    Quad,
    ThreadId,
    Area,
    Unit,
    Io,
}

impl FilterKind {
    pub const ALL: [FilterKind; 8] = [
        FilterKind::Time,
        FilterKind::TimeRange,
        FilterKind::Cluster,
        FilterKind::Quad,
        FilterKind::ThreadId,
        FilterKind::Area,
        FilterKind::Unit,
        FilterKind::Io,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FilterKind::Time => "Time",
            FilterKind::TimeRange => "TimeRange",
            FilterKind::Cluster => "Cluster",
            FilterKind::Quad => "Quad",
            FilterKind::ThreadId => "ThreadId",
            FilterKind::Area => "Area",
            FilterKind::Unit => "Unit",
            FilterKind::Io => "Io",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Case-insensitive kind name; `tid` and `range` are short names for
/// ThreadId and TimeRange.
impl FromStr for FilterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("tid") {
            return Ok(FilterKind::ThreadId);
        }
        if s.eq_ignore_ascii_case("range") {
            return Ok(FilterKind::TimeRange);
        }
        FilterKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown filter: {}", s))
    }
}

/// (chip, die, quad) triple selected by a Quad filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuadSelector {
    pub chip: i32,
    pub die: i32,
    pub quad: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Records stamped exactly at this second.
    Time(Timestamp),
    /// Records with `start <= timestamp <= end`.
    TimeRange { start: Timestamp, end: Timestamp },
    Cluster(ClusterAddr),
    Quad(QuadSelector),
    /// The whole accepted set, never a delta.
    ThreadId(BTreeSet<u32>),
    Area(String),
    Unit(String),
    Io(Io),
}

impl Filter {
    pub fn kind(&self) -> FilterKind {
        match self {
            Filter::Time(_) => FilterKind::Time,
            Filter::TimeRange { .. } => FilterKind::TimeRange,
            Filter::Cluster(_) => FilterKind::Cluster,
            Filter::Quad(_) => FilterKind::Quad,
            Filter::ThreadId(_) => FilterKind::ThreadId,
            Filter::Area(_) => FilterKind::Area,
            Filter::Unit(_) => FilterKind::Unit,
            Filter::Io(_) => FilterKind::Io,
        }
    }

    pub fn accepts(&self, record: &LogRecord) -> bool {
        match self {
            Filter::Time(at) => record.timestamp == *at,
            Filter::TimeRange { start, end } => {
                *start <= record.timestamp && record.timestamp <= *end
            }
            Filter::Cluster(addr) => record.cluster_id == *addr,
            Filter::Quad(sel) => {
                record.cluster_id.chip == sel.chip
                    && record.cluster_id.die == sel.die
                    && record.cluster_id.quad == sel.quad
            }
            Filter::ThreadId(tids) => tids.contains(&record.tid),
            Filter::Area(area) => record.area == *area,
            Filter::Unit(unit) => record.unit == *unit,
            Filter::Io(io) => record.io == *io,
        }
    }
}

/// Text form `kind=value`, e.g. `tid=7,9`, `area=hbm`, `range=10,20` or
/// `cluster=0,0,1,2,3`.
impl FromStr for Filter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, value) = s
            .split_once('=')
            .ok_or_else(|| format!("expected kind=value, got {:?}", s))?;
        let kind: FilterKind = kind.parse()?;
        let value = value.trim();

        Ok(match kind {
            FilterKind::Time => Filter::Time(parse_ints(value, 1)?[0]),
            FilterKind::TimeRange => {
                let v = parse_ints(value, 2)?;
                Filter::TimeRange {
                    start: v[0],
                    end: v[1],
                }
            }
            FilterKind::Cluster => Filter::Cluster(parse_cluster_addr(value)?),
            FilterKind::Quad => Filter::Quad(parse_quad_selector(value)?),
            FilterKind::ThreadId => Filter::ThreadId(
                value
                    .split(',')
                    .filter(|p| !p.trim().is_empty())
                    .map(|p| p.trim().parse::<u32>().map_err(|e| format!("{:?}: {}", p, e)))
                    .collect::<Result<_, _>>()?,
            ),
            FilterKind::Area => Filter::Area(value.to_string()),
            FilterKind::Unit => Filter::Unit(value.to_string()),
            FilterKind::Io => Filter::Io(value.parse()?),
        })
    }
}

/// Exactly `n` comma-separated integers.
pub fn parse_ints(s: &str, n: usize) -> Result<Vec<i64>, String> {
    let parts: Vec<i64> = s
        .split(',')
        .map(|p| p.trim().parse::<i64>().map_err(|e| format!("{:?}: {}", p, e)))
        .collect::<Result<_, _>>()?;
    if parts.len() != n {
        return Err(format!("expected {} comma-separated values, got {}", n, parts.len()));
    }
    Ok(parts)
}

/// `chip,die,quad,row,col`
pub fn parse_cluster_addr(s: &str) -> Result<ClusterAddr, String> {
    let v = to_i32(parse_ints(s, 5)?)?;
    Ok(ClusterAddr::new(v[0], v[1], v[2], v[3], v[4]))
}

/// `chip,die,quad`
pub fn parse_quad_selector(s: &str) -> Result<QuadSelector, String> {
    let v = to_i32(parse_ints(s, 3)?)?;
    Ok(QuadSelector {
        chip: v[0],
        die: v[1],
        quad: v[2],
    })
}

fn to_i32(values: Vec<i64>) -> Result<Vec<i32>, String> {
    values
        .into_iter()
        .map(|v| i32::try_from(v).map_err(|_| format!("{} does not fit an address field", v)))
        .collect()
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Time(at) => write!(f, "Time: {}", at),
            Filter::TimeRange { start, end } => write!(f, "TimeRange: {}..={}", start, end),
            Filter::Cluster(addr) => write!(f, "Cluster: {}", addr),
            Filter::Quad(sel) => write!(
                f,
                "Quad: {} in die: {} in chip: {}",
                sel.quad, sel.die, sel.chip
            ),
            Filter::ThreadId(tids) => {
                let list: Vec<String> = tids.iter().map(|t| t.to_string()).collect();
                write!(f, "ThreadId: {}", list.join(", "))
            }
            Filter::Area(area) => write!(f, "Area: {}", area),
            Filter::Unit(unit) => write!(f, "Unit: {}", unit),
            Filter::Io(io) => write!(f, "Io: {}", io),
        }
    }
}

/// Ordered, kind-keyed filter collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterChain {
    filters: Vec<Filter>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter()
    }

    pub fn contains(&self, kind: FilterKind) -> bool {
        self.get(kind).is_some()
    }

    pub fn get(&self, kind: FilterKind) -> Option<&Filter> {
        self.filters.iter().find(|f| f.kind() == kind)
    }

    /// Append a filter whose kind is not yet present. Returns false otherwise.
    pub fn push(&mut self, filter: Filter) -> bool {
        if self.contains(filter.kind()) {
            return false;
        }
        self.filters.push(filter);
        true
    }

    /// Replace the filter of the same kind in place. Returns false if absent.
    pub fn replace(&mut self, filter: Filter) -> bool {
        match self.filters.iter_mut().find(|f| f.kind() == filter.kind()) {
            Some(slot) => {
                *slot = filter;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, kind: FilterKind) -> Option<Filter> {
        let idx = self.filters.iter().position(|f| f.kind() == kind)?;
        Some(self.filters.remove(idx))
    }

    pub fn clear(&mut self) {
        self.filters.clear();
    }

    pub fn accepts(&self, record: &LogRecord) -> bool {
        self.filters.iter().all(|f| f.accepts(record))
    }
}
