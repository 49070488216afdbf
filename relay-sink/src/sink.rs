use std::sync::Arc;

use crate::builder::{RelaySinkBuilder, SinkError};
use crate::client::Connector;
use crate::config::RelayConfig;
use crate::record::LogRecord;
use crate::stats::{SinkState, SinkStats};

/// Decides whether a record may still be queued.
///
/// The guard sheds load before the queue is physically full, so that producers are not blocked
/// by a backend that cannot keep up.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OverflowGuard {
    threshold: usize,
}

impl OverflowGuard {
    /// Creates a guard that rejects records while the occupancy exceeds `threshold`.
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    /// Returns the configured threshold.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Returns `true` if a record may be queued at the given occupancy.
    pub fn admits(&self, occupancy: usize) -> bool {
        occupancy <= self.threshold
    }
}

/// The producer endpoint of the relay.
///
/// A sink owns a bounded queue and a fixed pool of forwarding workers draining it. It can be shared
/// by reference (or in an [`Arc`]) between any number of producer threads.
///
/// # Example
///
/// ```no_run
/// use relay_sink::{Level, LogRecord, RelayConfig, RelaySink};
/// # use relay_sink::{BackendClient, EnrichedContext};
/// # struct Client;
/// # impl BackendClient for Client {
/// #     type Error = std::io::Error;
/// #     fn debug(&mut self, _: &str, _: &EnrichedContext) -> std::io::Result<()> { Ok(()) }
/// #     fn info(&mut self, _: &str, _: &EnrichedContext) -> std::io::Result<()> { Ok(()) }
/// #     fn warning(&mut self, _: &str, _: &EnrichedContext) -> std::io::Result<()> { Ok(()) }
/// #     fn error(&mut self, _: &str, _: &EnrichedContext) -> std::io::Result<()> { Ok(()) }
/// #     fn fatal(&mut self, _: &str, _: &EnrichedContext) -> std::io::Result<()> { Ok(()) }
/// # }
///
/// let config = RelayConfig::new("https://public@sentry.example.com/42").concurrency(4);
/// let connector = |_: &str, _: &str| Ok::<_, std::io::Error>(Client);
/// let sink = RelaySink::new(config, connector, "web-1").unwrap();
///
/// sink.submit(LogRecord::new(Level::Error, "database unavailable"));
/// let stats = sink.close();
/// assert_eq!(stats.accepted, 1);
/// ```
#[derive(Debug)]
pub struct RelaySink {
    tx: flume::Sender<LogRecord>,
    guard: OverflowGuard,
    capacity: usize,
    state: Arc<SinkState>,
    done: flume::Receiver<()>,
}

impl RelaySink {
    /// Creates a sink and spawns its forwarding workers on dedicated threads.
    pub fn new<C>(
        config: RelayConfig,
        connector: C,
        hostname: impl Into<String>,
    ) -> Result<Self, SinkError>
    where
        C: Connector,
    {
        Self::builder(config, hostname).build(connector)
    }

    /// Returns a builder to customize how workers are spawned.
    pub fn builder(config: RelayConfig, hostname: impl Into<String>) -> RelaySinkBuilder {
        RelaySinkBuilder::new(config, hostname)
    }

    pub(crate) fn from_parts(
        tx: flume::Sender<LogRecord>,
        guard: OverflowGuard,
        capacity: usize,
        state: Arc<SinkState>,
        done: flume::Receiver<()>,
    ) -> Self {
        Self {
            tx,
            guard,
            capacity,
            state,
            done,
        }
    }

    /// Queues a record for forwarding, or drops it if the queue is above its overflow threshold.
    ///
    /// This blocks only while the queue is at full capacity. Dropped records are reported to the
    /// diagnostic log, never to the caller.
    pub fn submit(&self, record: LogRecord) {
        let occupancy = self.tx.len();
        if !self.guard.admits(occupancy) {
            self.state.record_dropped();
            relay_log::warn!(
                occupancy,
                threshold = self.guard.threshold(),
                level = %record.level,
                "log queue above overflow threshold, dropping record",
            );
            return;
        }

        match self.tx.send(record) {
            Ok(()) => self.state.record_accepted(),
            Err(flume::SendError(record)) => {
                self.state.record_dropped();
                relay_log::warn!(
                    level = %record.level,
                    "no forwarding worker left, dropping record: {}",
                    record.message,
                );
            }
        }
    }

    /// Returns the number of records currently waiting in the queue.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    /// Returns `true` if no records are waiting in the queue.
    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Returns the maximum number of records the queue can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the occupancy above which submitted records are dropped.
    pub fn overflow_threshold(&self) -> usize {
        self.guard.threshold()
    }

    /// Returns a snapshot of the sink's counters.
    pub fn stats(&self) -> SinkStats {
        self.state.snapshot()
    }

    /// Closes the queue and waits until all workers have exited.
    ///
    /// Workers forward every record that is still queued before they exit, unless they fail on
    /// their backend first. Returns the final counters.
    pub fn close(self) -> SinkStats {
        let done = self.done.clone();
        let state = self.state.clone();
        drop(self);

        // All senders belong to exit guards, so this returns once every worker is gone.
        done.recv().ok();
        state.snapshot()
    }
}

impl Drop for RelaySink {
    fn drop(&mut self) {
        self.state.mark_closed();
    }
}
