//! Log Source: produces the records that pass the configured filter chain.
//!
//! The producer runs on its own thread and hands records to the consumer
//! through a locked queue (single producer, single consumer). The consumer
//! polls `is_finished` and `next_record` independently; it is done once the
//! producer has finished AND the queue is empty, checked in that order.

use crate::log::filter::FilterChain;
use crate::log::parse::LineParser;
use crate::log::row::{LogRecord, Timestamp};

use anyhow::{Context, anyhow};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Producer side of a relink cycle.
pub trait LogSource {
    /// Replace the filter chain used by the next `start`.
    fn configure(&mut self, chain: &FilterChain) -> anyhow::Result<()>;

    /// Begin producing against the current configuration.
    fn start(&mut self) -> anyhow::Result<()>;

    fn has_record(&self) -> bool;

    fn next_record(&mut self) -> Option<LogRecord>;

    fn is_finished(&self) -> bool;

    /// Park the consumer until a record may be available or `timeout` passes.
    fn wait_for_record(&self, timeout: Duration) {
        let _ = timeout;
        thread::yield_now();
    }

    /// Block until the producer has fully stopped; surfaces its failure.
    fn join(&mut self) -> anyhow::Result<()>;

    fn first_record_time(&self) -> anyhow::Result<Option<Timestamp>>;

    fn last_record_time(&self) -> anyhow::Result<Option<Timestamp>>;
}

/// Where the records come from.
#[derive(Debug, Clone)]
pub enum Feed {
    /// A simulator log file, one record per line.
    File(PathBuf),
    /// Pre-parsed records, in emission order.
    #[cfg(test)]
    Records(Arc<Vec<LogRecord>>),
}

#[derive(Default)]
struct Shared {
    queue: Mutex<VecDeque<LogRecord>>,
    ready: Condvar,
    finished: AtomicBool,
}

impl Shared {
    fn push(&self, record: LogRecord) {
        self.queue.lock().push_back(record);
        self.ready.notify_one();
    }

    fn finish(&self) {
        // Flag under the lock so a waiting consumer cannot miss the wakeup.
        let _queue = self.queue.lock();
        self.finished.store(true, Ordering::Release);
        self.ready.notify_all();
    }

    fn reset(&self) {
        self.queue.lock().clear();
        self.finished.store(false, Ordering::Release);
    }
}

/// `LogSource` backed by a background producer thread.
pub struct ThreadedLogSource {
    feed: Feed,
    chain: FilterChain,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<anyhow::Result<usize>>>,
}

impl ThreadedLogSource {
    pub fn new(feed: Feed) -> Self {
        Self {
            feed,
            chain: FilterChain::new(),
            shared: Arc::new(Shared::default()),
            worker: None,
        }
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self::new(Feed::File(path.into()))
    }

    #[cfg(test)]
    pub fn from_records(records: Vec<LogRecord>) -> Self {
        Self::new(Feed::Records(Arc::new(records)))
    }
}

impl LogSource for ThreadedLogSource {
    fn configure(&mut self, chain: &FilterChain) -> anyhow::Result<()> {
        self.chain = chain.clone();
        Ok(())
    }

    fn start(&mut self) -> anyhow::Result<()> {
        // A previous run must be fully stopped before the queue is reused.
        self.join()?;
        self.shared.reset();

        let feed = self.feed.clone();
        let chain = self.chain.clone();
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("log-source".to_string())
            .spawn(move || {
                let result = produce(&feed, &chain, &shared);
                shared.finish();
                result
            })
            .context("spawn log source thread")?;

        self.worker = Some(handle);
        Ok(())
    }

    fn has_record(&self) -> bool {
        !self.shared.queue.lock().is_empty()
    }

    fn next_record(&mut self) -> Option<LogRecord> {
        self.shared.queue.lock().pop_front()
    }

    fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::Acquire)
    }

    fn wait_for_record(&self, timeout: Duration) {
        let mut queue = self.shared.queue.lock();
        if queue.is_empty() && !self.shared.finished.load(Ordering::Acquire) {
            let _ = self.shared.ready.wait_for(&mut queue, timeout);
        }
    }

    fn join(&mut self) -> anyhow::Result<()> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };
        let produced = handle
            .join()
            .map_err(|_| anyhow!("log source thread panicked"))??;
        debug!("log source produced {} records", produced);
        Ok(())
    }

    fn first_record_time(&self) -> anyhow::Result<Option<Timestamp>> {
        let mut first = None;
        scan(&self.feed, |record| {
            first = Some(record.timestamp);
            ControlFlow::Break(())
        })?;
        Ok(first)
    }

    fn last_record_time(&self) -> anyhow::Result<Option<Timestamp>> {
        let mut last = None;
        scan(&self.feed, |record| {
            last = Some(record.timestamp);
            ControlFlow::Continue(())
        })?;
        Ok(last)
    }
}

impl Drop for ThreadedLogSource {
    fn drop(&mut self) {
        if let Err(e) = self.join() {
            warn!("log source stopped with an error: {:#}", e);
        }
    }
}

fn produce(feed: &Feed, chain: &FilterChain, shared: &Shared) -> anyhow::Result<usize> {
    let mut produced = 0usize;
    scan(feed, |record| {
        // Unset or corrupt timestamps never reach the consumer.
        if record.timestamp > 0 && chain.accepts(&record) {
            shared.push(record);
            produced += 1;
        }
        ControlFlow::Continue(())
    })?;
    Ok(produced)
}

/// Visit every parseable record of the feed in order.
fn scan(feed: &Feed, mut visit: impl FnMut(LogRecord) -> ControlFlow<()>) -> anyhow::Result<()> {
    match feed {
        #[cfg(test)]
        Feed::Records(records) => {
            for record in records.iter() {
                if visit(record.clone()).is_break() {
                    break;
                }
            }
        }
        Feed::File(path) => {
            let file = File::open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            let parser = LineParser::new()?;
            for (lineno, line) in BufReader::new(file).lines().enumerate() {
                let lno = lineno + 1;
                let line =
                    line.with_context(|| format!("read log file {}:{}", path.display(), lno))?;
                match parser.parse_line(&line) {
                    Ok(Some(record)) => {
                        if visit(record).is_break() {
                            break;
                        }
                    }
                    Ok(None) => continue,
                    Err(e) => {
                        warn!(
                            "skipping malformed log line {}:{}: {:#}",
                            path.display(),
                            lno,
                            e
                        );
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::filter::Filter;
    use crate::log::parse::format_line;
    use crate::spec::ClusterAddr;
    use crate::testutil::record;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn drain(source: &mut impl LogSource) -> Vec<LogRecord> {
        let mut out = Vec::new();
        loop {
            let finished = source.is_finished();
            match source.next_record() {
                Some(r) => out.push(r),
                None if finished => break,
                None => source.wait_for_record(Duration::from_millis(5)),
            }
        }
        source.join().unwrap();
        out
    }

    fn stamped(ts: Timestamp, tid: u32) -> LogRecord {
        let mut r = record(ClusterAddr::new(0, 0, 0, 0, 0), "hbm", "hbm");
        r.timestamp = ts;
        r.tid = tid;
        r
    }

    #[test]
    fn produces_records_passing_the_chain() {
        let mut source =
            ThreadedLogSource::from_records(vec![stamped(1, 7), stamped(2, 8), stamped(3, 7)]);
        let mut chain = FilterChain::new();
        chain.push(Filter::ThreadId([7].into_iter().collect()));
        source.configure(&chain).unwrap();
        source.start().unwrap();

        let got: Vec<Timestamp> = drain(&mut source).iter().map(|r| r.timestamp).collect();
        assert_eq!(got, vec![1, 3]);
        assert!(!source.has_record());
    }

    #[test]
    fn restart_does_not_replay_old_records() {
        let mut source = ThreadedLogSource::from_records(vec![stamped(1, 1), stamped(2, 2)]);
        source.start().unwrap();
        assert_eq!(drain(&mut source).len(), 2);
        source.start().unwrap();
        assert_eq!(drain(&mut source).len(), 2);
    }

    #[test]
    fn zero_timestamps_are_discarded() {
        let mut source = ThreadedLogSource::from_records(vec![stamped(0, 1), stamped(5, 1)]);
        source.start().unwrap();
        assert_eq!(drain(&mut source).len(), 1);
    }

    #[test]
    fn file_feed_reports_time_bounds_and_skips_noise() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "header line").unwrap();
        for rec in [stamped(10, 1), stamped(11, 2), stamped(42, 3)] {
            writeln!(file, "{}", format_line(&rec)).unwrap();
        }

        let mut source = ThreadedLogSource::from_file(file.path());
        assert_eq!(source.first_record_time().unwrap(), Some(10));
        assert_eq!(source.last_record_time().unwrap(), Some(42));

        source.start().unwrap();
        assert_eq!(drain(&mut source).len(), 3);
    }

    #[test]
    fn missing_file_surfaces_through_join() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ThreadedLogSource::from_file(dir.path().join("logs.csv"));
        source.start().unwrap();
        while !source.is_finished() {
            source.wait_for_record(Duration::from_millis(5));
        }
        let err = source.join().unwrap_err();
        assert!(format!("{:#}", err).contains("open log file"));
    }
}
