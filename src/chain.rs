//! Filter chain manager.
//!
//! Owns the topology, the log source and the current filter chain. Every
//! mutation validates against the chain first (a rejected mutation changes
//! nothing), then runs a relink cycle:
//! 1) clear every attached record in the topology
//! 2) configure and restart the source with the new chain
//! 3) drain the source, routing each record
//! 4) join the source
//!
//! Mutations take `&mut self`, so at most one cycle is ever in flight and
//! callers can read the tree as soon as a mutation returns.

use crate::error::{ChainError, FilterStateError, RouteError};
use crate::log::{Filter, FilterChain, FilterKind, LogSource, Timestamp};
use crate::model::{Aggregate, Topology};
use crate::router::{RouteOutcome, route};

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

const DRAIN_WAIT: Duration = Duration::from_millis(10);

/// What one relink cycle did with the records it received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelinkStats {
    pub received: usize,
    pub attached: usize,
    pub dropped: usize,
    /// Records whose address was out of range; each was skipped.
    pub errors: Vec<RouteError>,
}

impl fmt::Display for RelinkStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} received, {} attached, {} dropped, {} out of range",
            self.received,
            self.attached,
            self.dropped,
            self.errors.len()
        )
    }
}

/// One edit of the filter chain.
///
/// Text form: `add:<filter>`, `update:<filter>`, `remove:<kind>`,
/// `drop-tid:<tid>`, `range:<start>,<end>`, `clear` or `refresh`, where
/// `<filter>` is a `kind=value` pair such as `tid=7,9`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Add(Filter),
    Update(Filter),
    Remove(FilterKind),
    RemoveThreadId(u32),
    TimeRange { start: Timestamp, end: Timestamp },
    ClearAll,
    Refresh,
}

impl FromStr for Mutation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (op, arg) = s.split_once(':').unwrap_or((s, ""));
        let arg = arg.trim();
        match op.trim() {
            "add" => Ok(Mutation::Add(arg.parse()?)),
            "update" => Ok(Mutation::Update(arg.parse()?)),
            "remove" => Ok(Mutation::Remove(arg.parse()?)),
            "drop-tid" => arg
                .parse()
                .map(Mutation::RemoveThreadId)
                .map_err(|e| format!("{:?}: {}", arg, e)),
            "range" => match format!("range={}", arg).parse::<Filter>()? {
                Filter::TimeRange { start, end } => Ok(Mutation::TimeRange { start, end }),
                other => Err(format!("expected a time range, got {}", other)),
            },
            "clear" => Ok(Mutation::ClearAll),
            "refresh" => Ok(Mutation::Refresh),
            other => Err(format!("unknown step: {}", other)),
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Add(filter) => write!(f, "add {}", filter),
            Mutation::Update(filter) => write!(f, "update {}", filter),
            Mutation::Remove(kind) => write!(f, "remove {}", kind),
            Mutation::RemoveThreadId(tid) => write!(f, "drop thread id {}", tid),
            Mutation::TimeRange { start, end } => write!(f, "time range {}..={}", start, end),
            Mutation::ClearAll => f.write_str("clear all"),
            Mutation::Refresh => f.write_str("refresh"),
        }
    }
}

pub struct FilterChainManager<S: LogSource> {
    topology: Topology,
    source: S,
    chain: FilterChain,
}

impl<S: LogSource> FilterChainManager<S> {
    /// Start with an empty chain. No relink happens until the first mutation
    /// or `refresh`.
    pub fn new(topology: Topology, source: S) -> Self {
        Self {
            topology,
            source,
            chain: FilterChain::new(),
        }
    }

    /// Start from a prepared chain; each filter is validated as `add` would.
    pub fn with_chain(
        topology: Topology,
        source: S,
        chain: FilterChain,
    ) -> Result<Self, FilterStateError> {
        for filter in chain.iter() {
            validate(filter)?;
        }
        Ok(Self {
            topology,
            source,
            chain,
        })
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn chain(&self) -> &FilterChain {
        &self.chain
    }

    pub fn first_record_time(&self) -> anyhow::Result<Option<Timestamp>> {
        self.source.first_record_time()
    }

    pub fn last_record_time(&self) -> anyhow::Result<Option<Timestamp>> {
        self.source.last_record_time()
    }

    /// Add a filter of a kind not yet in the chain.
    pub fn add(&mut self, filter: Filter) -> Result<RelinkStats, ChainError> {
        validate(&filter)?;
        if !self.chain.push(filter.clone()) {
            return Err(FilterStateError::AlreadyPresent(filter.kind()).into());
        }
        debug!("added filter {}", filter);
        self.relink()
    }

    /// Replace the payload of a filter already in the chain. For ThreadId the
    /// payload is the whole new set; an empty set removes the kind.
    pub fn update(&mut self, filter: Filter) -> Result<RelinkStats, ChainError> {
        let kind = filter.kind();
        if !self.chain.contains(kind) {
            return Err(FilterStateError::NotPresent(kind).into());
        }
        match &filter {
            Filter::ThreadId(tids) if tids.is_empty() => {
                self.chain.remove(kind);
                debug!("thread id set emptied, filter removed");
            }
            _ => {
                validate(&filter)?;
                self.chain.replace(filter);
            }
        }
        self.relink()
    }

    pub fn remove(&mut self, kind: FilterKind) -> Result<RelinkStats, ChainError> {
        if self.chain.remove(kind).is_none() {
            return Err(FilterStateError::NotPresent(kind).into());
        }
        debug!("removed filter {}", kind);
        self.relink()
    }

    /// Drop one thread id from the ThreadId set.
    pub fn remove_thread_id(&mut self, tid: u32) -> Result<RelinkStats, ChainError> {
        let mut tids: BTreeSet<u32> = match self.chain.get(FilterKind::ThreadId) {
            Some(Filter::ThreadId(tids)) => tids.clone(),
            _ => return Err(FilterStateError::NotPresent(FilterKind::ThreadId).into()),
        };
        if !tids.remove(&tid) {
            return Err(FilterStateError::InvalidPayload {
                kind: FilterKind::ThreadId,
                reason: format!("thread id {} is not selected", tid),
            }
            .into());
        }
        self.update(Filter::ThreadId(tids))
    }

    pub fn clear_all(&mut self) -> Result<RelinkStats, ChainError> {
        self.chain.clear();
        self.relink()
    }

    /// Set the inclusive time window, adding the TimeRange filter if needed.
    pub fn change_time_range(
        &mut self,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<RelinkStats, ChainError> {
        let filter = Filter::TimeRange { start, end };
        validate(&filter)?;
        if !self.chain.replace(filter.clone()) {
            self.chain.push(filter);
        }
        self.relink()
    }

    /// Relink against the unchanged chain.
    pub fn refresh(&mut self) -> Result<RelinkStats, ChainError> {
        self.relink()
    }

    pub fn apply(&mut self, mutation: &Mutation) -> Result<RelinkStats, ChainError> {
        match mutation {
            Mutation::Add(filter) => self.add(filter.clone()),
            Mutation::Update(filter) => self.update(filter.clone()),
            Mutation::Remove(kind) => self.remove(*kind),
            Mutation::RemoveThreadId(tid) => self.remove_thread_id(*tid),
            Mutation::TimeRange { start, end } => self.change_time_range(*start, *end),
            Mutation::ClearAll => self.clear_all(),
            Mutation::Refresh => self.refresh(),
        }
    }

    fn relink(&mut self) -> Result<RelinkStats, ChainError> {
        self.topology.clear_active_logs();
        debug!("relink: cleared topology, {} filters", self.chain.len());

        self.source
            .configure(&self.chain)
            .map_err(ChainError::Source)?;
        self.source.start().map_err(ChainError::Source)?;

        let mut stats = RelinkStats::default();
        loop {
            // Read the flag first: a record pushed just before the producer
            // finished is still seen by the queue check below.
            let finished = self.source.is_finished();
            if !self.source.has_record() {
                if finished {
                    break;
                }
                self.source.wait_for_record(DRAIN_WAIT);
                continue;
            }
            let Some(record) = self.source.next_record() else {
                continue;
            };
            stats.received += 1;
            match route(&mut self.topology, record) {
                Ok(RouteOutcome::Attached) => stats.attached += 1,
                Ok(RouteOutcome::Dropped(_)) => stats.dropped += 1,
                Err(e) => stats.errors.push(e),
            }
        }

        // A failed producer may have stopped early; keep none of its output.
        if let Err(e) = self.source.join() {
            self.topology.clear_active_logs();
            return Err(ChainError::Source(e));
        }
        info!("relink done: {}", stats);
        Ok(stats)
    }
}

fn validate(filter: &Filter) -> Result<(), FilterStateError> {
    match filter {
        Filter::ThreadId(tids) if tids.is_empty() => Err(FilterStateError::InvalidPayload {
            kind: FilterKind::ThreadId,
            reason: "empty thread id set".to_string(),
        }),
        Filter::TimeRange { start, end } if start > end => Err(FilterStateError::InvalidPayload {
            kind: FilterKind::TimeRange,
            reason: format!("start {} is after end {}", start, end),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{LogRecord, ThreadedLogSource};
    use crate::model::Component;
    use crate::spec::ClusterAddr;
    use crate::testutil::{chip_json, enablement_json, record};
    use pretty_assertions::assert_eq;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    fn rec(ts: Timestamp, tid: u32, area: &str, unit: &str) -> LogRecord {
        let mut r = record(ClusterAddr::new(0, 0, 0, 0, 0), area, unit);
        r.timestamp = ts;
        r.tid = tid;
        r
    }

    fn records() -> Vec<LogRecord> {
        vec![
            rec(1, 7, "hbm", "hbm"),
            rec(2, 9, "nfi", "lnb"),
            rec(3, 7, "mcu gate 0", "iqr"),
            rec(4, 11, "hbm", "hbm"),
            rec(5, 9, "d2d", "d2d"),
            rec(6, 7, "laser", "lnb"),
            {
                let mut r = rec(7, 7, "hbm", "hbm");
                r.cluster_id.die = 5;
                r
            },
        ]
    }

    fn topology() -> Topology {
        let mut topology = Topology::new(
            serde_json::from_value(chip_json(1, 1)).unwrap(),
            serde_json::from_value(enablement_json(&[(0, 0, 0, 0)])).unwrap(),
        )
        .unwrap();
        topology.load_all_dies().unwrap();
        topology
    }

    fn manager() -> FilterChainManager<ThreadedLogSource> {
        FilterChainManager::new(topology(), ThreadedLogSource::from_records(records()))
    }

    fn tids(list: &[u32]) -> Filter {
        Filter::ThreadId(list.iter().copied().collect())
    }

    /// (component id, attached timestamps) for every component holding records.
    fn snapshot(m: &FilterChainManager<ThreadedLogSource>) -> Vec<(u64, Vec<Timestamp>)> {
        m.topology()
            .components()
            .into_iter()
            .filter(|c| !c.active_logs().is_empty())
            .map(|c: &Component| (c.id(), c.active_logs().iter().map(|r| r.timestamp).collect()))
            .collect()
    }

    #[test]
    fn refresh_accounts_for_every_record() {
        let mut m = manager();
        let stats = m.refresh().unwrap();

        assert_eq!(stats.received, 7);
        assert_eq!(stats.attached, 5);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.errors.len(), 1);
        assert_eq!(
            m.topology().total_active_logs(),
            stats.received - stats.dropped - stats.errors.len()
        );
    }

    #[test]
    fn thread_id_update_replaces_instead_of_accumulating() {
        let mut m = manager();
        let stats = m.add(tids(&[7])).unwrap();
        // tid 7: hbm, iqr; the "laser" and die-5 records are not attached.
        assert_eq!(m.topology().total_active_logs(), 2);
        assert_eq!(stats.received, 4);

        m.update(tids(&[7, 9])).unwrap();
        assert_eq!(m.topology().total_active_logs(), 4);

        m.update(tids(&[9])).unwrap();
        assert_eq!(m.topology().total_active_logs(), 2);
    }

    #[test]
    fn clear_all_then_readd_restores_the_same_view() {
        let mut m = manager();
        m.add(tids(&[7, 9])).unwrap();
        m.add(Filter::Area("hbm".into())).unwrap();
        let before = snapshot(&m);
        assert!(!before.is_empty());

        m.clear_all().unwrap();
        assert!(m.chain().is_empty());
        m.add(tids(&[7, 9])).unwrap();
        m.add(Filter::Area("hbm".into())).unwrap();
        assert_eq!(snapshot(&m), before);
    }

    #[test]
    fn rejected_mutations_leave_the_chain_alone() {
        let mut m = manager();
        m.add(tids(&[7])).unwrap();
        let chain = m.chain().clone();
        let view = snapshot(&m);

        assert!(matches!(
            m.add(tids(&[9])),
            Err(ChainError::State(FilterStateError::AlreadyPresent(FilterKind::ThreadId)))
        ));
        assert!(matches!(
            m.update(Filter::Area("hbm".into())),
            Err(ChainError::State(FilterStateError::NotPresent(FilterKind::Area)))
        ));
        assert!(matches!(
            m.remove(FilterKind::Io),
            Err(ChainError::State(FilterStateError::NotPresent(FilterKind::Io)))
        ));
        assert!(matches!(
            m.change_time_range(10, 1),
            Err(ChainError::State(FilterStateError::InvalidPayload { .. }))
        ));
        assert_eq!(m.chain(), &chain);
        assert_eq!(snapshot(&m), view);
    }

    #[test]
    fn removing_the_last_thread_id_resets_the_kind() {
        let mut m = manager();
        m.add(tids(&[7, 9])).unwrap();
        m.remove_thread_id(9).unwrap();
        assert_eq!(m.chain().get(FilterKind::ThreadId), Some(&tids(&[7])));

        m.remove_thread_id(7).unwrap();
        assert!(!m.chain().contains(FilterKind::ThreadId));
        // Unfiltered again: everything routable is attached.
        assert_eq!(m.topology().total_active_logs(), 5);

        assert!(matches!(
            m.remove_thread_id(7),
            Err(ChainError::State(FilterStateError::NotPresent(FilterKind::ThreadId)))
        ));
    }

    #[test]
    fn time_range_is_upserted() {
        let mut m = manager();
        m.change_time_range(1, 3).unwrap();
        assert_eq!(m.topology().total_active_logs(), 3);
        m.change_time_range(4, 5).unwrap();
        assert_eq!(m.topology().total_active_logs(), 2);
        assert_eq!(m.chain().len(), 1);
        assert_eq!(
            m.chain().get(FilterKind::TimeRange),
            Some(&Filter::TimeRange { start: 4, end: 5 })
        );

        m.remove(FilterKind::TimeRange).unwrap();
        assert!(m.chain().is_empty());
    }

    #[test]
    fn prepared_chain_applies_on_refresh() {
        let mut chain = FilterChain::new();
        chain.push(Filter::Area("hbm".into()));
        let source = ThreadedLogSource::from_records(records());
        let mut m = FilterChainManager::with_chain(topology(), source, chain).unwrap();

        let stats = m.refresh().unwrap();
        assert_eq!(stats.received, 3);
        assert_eq!(m.topology().total_active_logs(), 2);

        let mut bad = FilterChain::new();
        bad.push(Filter::ThreadId(BTreeSet::new()));
        let source = ThreadedLogSource::from_records(records());
        assert!(FilterChainManager::with_chain(topology(), source, bad).is_err());
    }

    #[test]
    fn time_bounds_pass_through_to_the_source() {
        let m = manager();
        assert_eq!(m.first_record_time().unwrap(), Some(1));
        assert_eq!(m.last_record_time().unwrap(), Some(7));
    }

    /// In-process source that publishes its last records together with the
    /// finished flag, while the consumer is waiting. Optionally fails `join`
    /// from a given run on.
    #[derive(Default)]
    struct ScriptedSource {
        late_records: Vec<LogRecord>,
        fail_from_run: Option<usize>,
        runs: usize,
        queue: RefCell<VecDeque<LogRecord>>,
        late: RefCell<Vec<LogRecord>>,
        finished: Cell<bool>,
    }

    impl LogSource for ScriptedSource {
        fn configure(&mut self, _chain: &FilterChain) -> anyhow::Result<()> {
            Ok(())
        }

        fn start(&mut self) -> anyhow::Result<()> {
            self.runs += 1;
            self.queue.borrow_mut().clear();
            *self.late.borrow_mut() = self.late_records.clone();
            self.finished.set(false);
            Ok(())
        }

        fn has_record(&self) -> bool {
            !self.queue.borrow().is_empty()
        }

        fn next_record(&mut self) -> Option<LogRecord> {
            self.queue.borrow_mut().pop_front()
        }

        fn is_finished(&self) -> bool {
            self.finished.get()
        }

        fn wait_for_record(&self, _timeout: Duration) {
            self.queue.borrow_mut().extend(self.late.borrow_mut().drain(..));
            self.finished.set(true);
        }

        fn join(&mut self) -> anyhow::Result<()> {
            match self.fail_from_run {
                Some(run) if self.runs >= run => Err(anyhow::anyhow!("producer crashed")),
                _ => Ok(()),
            }
        }

        fn first_record_time(&self) -> anyhow::Result<Option<Timestamp>> {
            Ok(None)
        }

        fn last_record_time(&self) -> anyhow::Result<Option<Timestamp>> {
            Ok(None)
        }
    }

    #[test]
    fn record_queued_as_the_producer_finishes_is_routed() {
        let source = ScriptedSource {
            late_records: vec![rec(1, 7, "hbm", "hbm"), rec(2, 7, "d2d", "d2d")],
            ..ScriptedSource::default()
        };
        let mut m = FilterChainManager::new(topology(), source);

        let stats = m.refresh().unwrap();
        assert_eq!(stats.received, 2);
        assert_eq!(stats.attached, 2);
        assert_eq!(m.topology().total_active_logs(), 2);
        assert_eq!(m.topology().die2die().active_logs().len(), 1);
    }

    #[test]
    fn failed_producer_leaves_the_topology_cleared() {
        let source = ScriptedSource {
            late_records: vec![rec(1, 7, "hbm", "hbm")],
            fail_from_run: Some(2),
            ..ScriptedSource::default()
        };
        let mut m = FilterChainManager::new(topology(), source);
        m.refresh().unwrap();
        assert_eq!(m.topology().total_active_logs(), 1);

        let err = m.add(tids(&[7])).unwrap_err();
        assert!(matches!(err, ChainError::Source(_)));
        assert_eq!(m.topology().total_active_logs(), 0);
    }

    #[test]
    fn missing_log_file_fails_the_relink() {
        let dir = tempfile::tempdir().unwrap();
        let source = ThreadedLogSource::from_file(dir.path().join("absent.log"));
        let mut m = FilterChainManager::new(topology(), source);

        let err = m.refresh().unwrap_err();
        assert!(matches!(err, ChainError::Source(_)));
        assert!(err.to_string().contains("absent.log"));
        assert_eq!(m.topology().total_active_logs(), 0);
    }

    #[test]
    fn steps_parse_and_apply_in_order() {
        let steps: Vec<Mutation> = ["add:tid=7", "update:tid=7,9", "drop-tid:7", "range:1,3"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        assert_eq!(steps[3], Mutation::TimeRange { start: 1, end: 3 });

        let mut m = manager();
        let attached: Vec<usize> = steps
            .iter()
            .map(|step| m.apply(step).unwrap().attached)
            .collect();
        // tid 7 -> 2; tids 7 and 9 -> 4; tid 9 -> 2; tid 9 within 1..=3 -> 1.
        assert_eq!(attached, vec![2, 4, 2, 1]);

        assert_eq!(
            "remove:tid".parse::<Mutation>(),
            Ok(Mutation::Remove(FilterKind::ThreadId))
        );
        assert_eq!("clear".parse::<Mutation>(), Ok(Mutation::ClearAll));
        assert!("range:5".parse::<Mutation>().is_err());
        assert!("drop:7".parse::<Mutation>().is_err());
    }
}
