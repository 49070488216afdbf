use std::sync::Arc;

use crate::client::{BackendClient, Connector};
use crate::config::SendFailurePolicy;
use crate::context::{EnrichedContext, TimestampCache};
use crate::level::LevelRouter;
use crate::record::LogRecord;
use crate::stats::SinkState;

/// Settings shared by all workers of a pool.
#[derive(Debug)]
pub(crate) struct WorkerSettings<C> {
    pub connector: C,
    pub endpoint: String,
    pub hostname: String,
    pub send_failure: SendFailurePolicy,
}

/// Drains the shared queue and forwards every record through its own backend client.
pub(crate) struct ForwardingWorker<C: Connector> {
    index: usize,
    settings: Arc<WorkerSettings<C>>,
    rx: flume::Receiver<LogRecord>,
    state: Arc<SinkState>,
    timestamps: TimestampCache,
}

impl<C: Connector> ForwardingWorker<C> {
    pub fn new(
        index: usize,
        settings: Arc<WorkerSettings<C>>,
        rx: flume::Receiver<LogRecord>,
        state: Arc<SinkState>,
    ) -> Self {
        Self {
            index,
            settings,
            rx,
            state,
            timestamps: TimestampCache::new(),
        }
    }

    /// Runs until the queue is closed and drained, or the worker gives up on its backend.
    pub fn run(mut self) {
        let Some(mut client) = self.connect() else {
            return;
        };

        relay_log::trace!(worker = self.index, "forwarding worker started");

        while let Ok(record) = self.rx.recv() {
            let Err(error) = self.forward(&mut client, &record) else {
                self.state.record_forwarded();
                continue;
            };

            self.state.record_failed();
            relay_log::error!(
                error = &error as &dyn std::error::Error,
                worker = self.index,
                endpoint = %self.settings.endpoint,
                "failed to forward log record: {}",
                record.message,
            );

            match self.settings.send_failure {
                SendFailurePolicy::Terminate => return,
                SendFailurePolicy::Reconnect => {
                    drop(client);
                    client = match self.connect() {
                        Some(client) => client,
                        None => return,
                    };
                }
            }
        }

        relay_log::trace!(worker = self.index, "log queue closed");
    }

    fn connect(&self) -> Option<C::Client> {
        let settings = &self.settings;
        match settings
            .connector
            .connect(&settings.endpoint, &settings.hostname)
        {
            Ok(client) => Some(client),
            Err(error) => {
                relay_log::error!(
                    error = &error as &dyn std::error::Error,
                    worker = self.index,
                    endpoint = %settings.endpoint,
                    "failed to create backend client",
                );
                None
            }
        }
    }

    fn forward(
        &mut self,
        client: &mut C::Client,
        record: &LogRecord,
    ) -> Result<(), <C::Client as BackendClient>::Error> {
        let time = self.timestamps.format(record.created);
        let context = EnrichedContext::new(record, time);
        client.send(LevelRouter::route(record.level), &record.message, &context)
    }
}
