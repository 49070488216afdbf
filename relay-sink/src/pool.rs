use std::any::Any;
use std::io;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::stats::SinkState;

/// The forwarding loop of a worker with its connector type erased.
pub(crate) type WorkerTask = Box<dyn FnOnce() + Send + 'static>;

/// A forwarding worker waiting to be started on a dedicated thread.
///
/// Workers are handed to a [`ThreadSpawn`] implementation when the [`RelaySink`](crate::RelaySink)
/// is built. The worker connects to the backend and starts draining the queue once
/// [`run`](Self::run) is called. A worker that is dropped without running counts as exited.
pub struct Worker {
    index: usize,
    name: Option<String>,
    dispatch: tracing::Dispatch,
    task: WorkerTask,
    guard: ExitGuard,
}

impl Worker {
    pub(crate) fn new(
        index: usize,
        name: Option<String>,
        dispatch: tracing::Dispatch,
        task: WorkerTask,
        guard: ExitGuard,
    ) -> Self {
        Self {
            index,
            name,
            dispatch,
            task,
            guard,
        }
    }

    /// Returns the index of this worker within the pool.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the thread name of this worker, if one was configured.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Runs the worker on the current thread until the queue is closed and drained, or the
    /// worker gives up on its backend.
    ///
    /// Diagnostics are emitted to the subscriber that was active when the sink was built. A
    /// panic inside the worker is logged and treated as a regular exit.
    pub fn run(self) {
        let Self {
            index,
            dispatch,
            task,
            guard,
            ..
        } = self;

        tracing::dispatcher::with_default(&dispatch, move || {
            if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(task)) {
                relay_log::error!(
                    worker = index,
                    "forwarding worker panicked: {}",
                    panic_message(payload.as_ref())
                );
            }
            drop(guard);
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic payload>"
    }
}

/// Tracks the lifetime of a worker.
///
/// Dropping the guard marks the worker as exited. The completion sender is never used to send,
/// its disconnection tells [`RelaySink::close`](crate::RelaySink::close) that all workers are done.
pub(crate) struct ExitGuard {
    index: usize,
    state: Arc<SinkState>,
    _done: flume::Sender<()>,
}

impl ExitGuard {
    pub fn new(index: usize, state: Arc<SinkState>, done: flume::Sender<()>) -> Self {
        Self {
            index,
            state,
            _done: done,
        }
    }
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let remaining = self.state.worker_exited();
        relay_log::debug!(worker = self.index, remaining, "forwarding worker exited");
        report_exhausted(&self.state);
    }
}

/// Reports the loss of the last worker of an open sink.
pub(crate) fn report_exhausted(state: &SinkState) {
    if state.take_exhausted() {
        relay_log::error!("all forwarding workers exited, log records will be dropped");
    }
}

/// A trait for customizing how worker threads of a [`RelaySink`](crate::RelaySink) are spawned.
pub trait ThreadSpawn {
    /// Spawns a new thread that eventually calls [`Worker::run`].
    fn spawn(&mut self, worker: Worker) -> io::Result<()>;
}

/// Spawns every worker on a new OS thread named after [`Worker::name`].
#[derive(Clone, Debug, Default)]
pub struct DefaultSpawn;

impl ThreadSpawn for DefaultSpawn {
    fn spawn(&mut self, worker: Worker) -> io::Result<()> {
        let mut builder = std::thread::Builder::new();
        if let Some(name) = worker.name() {
            builder = builder.name(name.to_owned());
        }
        builder.spawn(move || worker.run())?;

        Ok(())
    }
}

/// A [`ThreadSpawn`] implementation that delegates to a closure.
#[derive(Clone)]
pub struct CustomSpawn<B>(B);

impl<B> CustomSpawn<B> {
    /// Creates a new instance of [`CustomSpawn`] with the provided closure.
    pub fn new(spawn_handler: B) -> Self {
        CustomSpawn(spawn_handler)
    }
}

impl<B> ThreadSpawn for CustomSpawn<B>
where
    B: FnMut(Worker) -> io::Result<()>,
{
    fn spawn(&mut self, worker: Worker) -> io::Result<()> {
        self.0(worker)
    }
}
