use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// A snapshot of the counters of a [`RelaySink`](crate::RelaySink).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SinkStats {
    /// Records that were placed on the queue.
    pub accepted: u64,
    /// Records discarded at submission because the queue was above its overflow threshold or no
    /// worker was left to consume it.
    pub dropped: u64,
    /// Records the backend accepted.
    pub forwarded: u64,
    /// Records lost because the backend client failed to send them.
    pub failed: u64,
    /// Workers that have not exited yet.
    pub live_workers: usize,
}

/// Counters shared between the sink and its workers.
#[derive(Debug, Default)]
pub(crate) struct SinkState {
    accepted: AtomicU64,
    dropped: AtomicU64,
    forwarded: AtomicU64,
    failed: AtomicU64,
    live_workers: AtomicUsize,
    starting: AtomicBool,
    closed: AtomicBool,
    exhausted: AtomicBool,
}

impl SinkState {
    pub fn new(workers: usize) -> Self {
        Self {
            live_workers: AtomicUsize::new(workers),
            starting: AtomicBool::new(true),
            ..Default::default()
        }
    }

    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Marks the end of sink construction, once every worker has been handed off.
    pub fn finish_start(&self) {
        self.starting.store(false, Ordering::Release);
    }

    /// Returns `true` exactly once, when no worker is left while the sink is open.
    ///
    /// A sink is open after construction finished and before it is closed.
    pub fn take_exhausted(&self) -> bool {
        self.live_workers.load(Ordering::Acquire) == 0
            && !self.starting.load(Ordering::Acquire)
            && !self.is_closed()
            && !self.exhausted.swap(true, Ordering::AcqRel)
    }

    /// Records the exit of a worker and returns the number of workers still alive.
    pub fn worker_exited(&self) -> usize {
        self.live_workers.fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub fn snapshot(&self) -> SinkStats {
        SinkStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            live_workers: self.live_workers.load(Ordering::Acquire),
        }
    }
}
