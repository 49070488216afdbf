use std::io;
use std::sync::Arc;

use crate::client::Connector;
use crate::config::{ConfigError, RelayConfig};
use crate::pool::{CustomSpawn, DefaultSpawn, ExitGuard, ThreadSpawn, Worker, report_exhausted};
use crate::sink::{OverflowGuard, RelaySink};
use crate::stats::SinkState;
use crate::worker::{ForwardingWorker, WorkerSettings};

/// An error building a [`RelaySink`].
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The configuration is inconsistent.
    #[error("invalid relay configuration")]
    Config(#[from] ConfigError),
    /// A worker thread could not be spawned.
    #[error("failed to spawn forwarding worker")]
    Spawn(#[source] io::Error),
}

/// Configures and builds a [`RelaySink`] along with its pool of forwarding workers.
///
/// Most users can call [`RelaySink::new`] directly. The builder additionally allows to customize
/// the names of worker threads and the way they are spawned.
pub struct RelaySinkBuilder<S = DefaultSpawn> {
    config: RelayConfig,
    hostname: String,
    thread_name: Option<Box<dyn FnMut(usize) -> String>>,
    spawn_handler: S,
}

impl RelaySinkBuilder<DefaultSpawn> {
    /// Creates a builder for the given configuration and resolved hostname.
    ///
    /// Pass an empty hostname if it could not be resolved.
    pub fn new(config: RelayConfig, hostname: impl Into<String>) -> Self {
        Self {
            config,
            hostname: hostname.into(),
            thread_name: None,
            spawn_handler: DefaultSpawn,
        }
    }
}

impl<S> RelaySinkBuilder<S>
where
    S: ThreadSpawn,
{
    /// Specifies how worker threads are named.
    ///
    /// The closure receives the index of the worker. Defaults to `relay-forwarder-{index}`.
    pub fn thread_name<F>(mut self, thread_name: F) -> Self
    where
        F: FnMut(usize) -> String + 'static,
    {
        self.thread_name = Some(Box::new(thread_name));
        self
    }

    /// Configures a custom procedure for starting worker threads.
    ///
    /// The handler receives every [`Worker`] exactly once and is responsible for eventually
    /// calling [`Worker::run`] on a thread of its choice.
    pub fn spawn_handler<F>(self, spawn_handler: F) -> RelaySinkBuilder<CustomSpawn<F>>
    where
        F: FnMut(Worker) -> io::Result<()>,
    {
        RelaySinkBuilder {
            config: self.config,
            hostname: self.hostname,
            thread_name: self.thread_name,
            spawn_handler: CustomSpawn::new(spawn_handler),
        }
    }

    /// Validates the configuration, creates the queue and spawns all forwarding workers.
    ///
    /// Workers emit their diagnostics to the subscriber active on the calling thread.
    pub fn build<C>(mut self, connector: C) -> Result<RelaySink, SinkError>
    where
        C: Connector,
    {
        let config = self.config.validate()?;
        let workers = config.worker_count();

        let (tx, rx) = flume::bounded(config.capacity());
        let (done_tx, done_rx) = flume::bounded(0);
        let state = Arc::new(SinkState::new(workers));
        let dispatch = tracing::dispatcher::get_default(|dispatch| dispatch.clone());

        let settings = Arc::new(WorkerSettings {
            connector,
            endpoint: config.endpoint().to_owned(),
            hostname: self.hostname,
            send_failure: config.send_failure_policy(),
        });

        for index in 0..workers {
            let forwarder =
                ForwardingWorker::new(index, settings.clone(), rx.clone(), state.clone());
            let name = match self.thread_name.as_mut() {
                Some(thread_name) => thread_name(index),
                None => format!("relay-forwarder-{index}"),
            };

            let worker = Worker::new(
                index,
                Some(name),
                dispatch.clone(),
                Box::new(move || forwarder.run()),
                ExitGuard::new(index, state.clone(), done_tx.clone()),
            );

            if let Err(error) = self.spawn_handler.spawn(worker) {
                // Workers that already started drain nothing and exit once `tx` is dropped.
                state.mark_closed();
                return Err(SinkError::Spawn(error));
            }
        }

        // Workers may have failed to connect before construction finished.
        state.finish_start();
        report_exhausted(&state);

        relay_log::debug!(
            workers,
            capacity = config.capacity(),
            overflow_threshold = config.effective_overflow_threshold(),
            "relay sink started"
        );

        Ok(RelaySink::from_parts(
            tx,
            OverflowGuard::new(config.effective_overflow_threshold()),
            config.capacity(),
            state,
            done_rx,
        ))
    }
}
