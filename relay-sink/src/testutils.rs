use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::{BackendClient, Connector, EnrichedContext, Tier};

/// A record as received by a [`MockClient`].
#[derive(Clone, Debug)]
pub struct Sent {
    pub client: usize,
    pub tier: Tier,
    pub message: String,
    pub context: EnrichedContext,
}

#[derive(Debug, thiserror::Error)]
pub enum MockError {
    #[error("backend unreachable")]
    Unreachable,
    #[error("backend rejected the record")]
    Rejected,
}

#[derive(Debug, Default)]
struct Shared {
    connect_failures: AtomicUsize,
    fail_on: Option<String>,
    connections: AtomicUsize,
    hostnames: Mutex<Vec<String>>,
    attempts: Mutex<Vec<String>>,
    sent: Mutex<Vec<Sent>>,
}

/// Records everything sent by all clients it created.
#[derive(Clone, Debug, Default)]
pub struct MockConnector(Arc<Shared>);

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the first `count` connection attempts.
    pub fn fail_connects(self, count: usize) -> Self {
        self.0.connect_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Fails every send of the given message.
    pub fn fail_on(self, message: &str) -> Self {
        let mut shared = Arc::into_inner(self.0).expect("configure before cloning");
        shared.fail_on = Some(message.to_owned());
        Self(Arc::new(shared))
    }

    /// Returns the number of clients created successfully.
    pub fn connections(&self) -> usize {
        self.0.connections.load(Ordering::SeqCst)
    }

    pub fn hostnames(&self) -> Vec<String> {
        let mut hostnames = self.0.hostnames.lock().unwrap().clone();
        hostnames.dedup();
        hostnames
    }

    /// Returns the messages of all send attempts, including failed ones.
    pub fn attempts(&self) -> Vec<String> {
        self.0.attempts.lock().unwrap().clone()
    }

    /// Returns all records sent successfully.
    pub fn sent(&self) -> Vec<Sent> {
        self.0.sent.lock().unwrap().clone()
    }
}

impl Connector for MockConnector {
    type Client = MockClient;
    type Error = MockError;

    fn connect(&self, _endpoint: &str, hostname: &str) -> Result<MockClient, MockError> {
        let failed = self
            .0
            .connect_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(MockError::Unreachable);
        }

        self.0.hostnames.lock().unwrap().push(hostname.to_owned());
        Ok(MockClient {
            id: self.0.connections.fetch_add(1, Ordering::SeqCst),
            shared: self.0.clone(),
        })
    }
}

pub struct MockClient {
    id: usize,
    shared: Arc<Shared>,
}

impl MockClient {
    fn record(
        &mut self,
        tier: Tier,
        message: &str,
        context: &EnrichedContext,
    ) -> Result<(), MockError> {
        self.shared
            .attempts
            .lock()
            .unwrap()
            .push(message.to_owned());

        if self.shared.fail_on.as_deref() == Some(message) {
            return Err(MockError::Rejected);
        }

        self.shared.sent.lock().unwrap().push(Sent {
            client: self.id,
            tier,
            message: message.to_owned(),
            context: context.clone(),
        });
        Ok(())
    }
}

impl BackendClient for MockClient {
    type Error = MockError;

    fn debug(&mut self, message: &str, context: &EnrichedContext) -> Result<(), MockError> {
        self.record(Tier::Debug, message, context)
    }

    fn info(&mut self, message: &str, context: &EnrichedContext) -> Result<(), MockError> {
        self.record(Tier::Info, message, context)
    }

    fn warning(&mut self, message: &str, context: &EnrichedContext) -> Result<(), MockError> {
        self.record(Tier::Warning, message, context)
    }

    fn error(&mut self, message: &str, context: &EnrichedContext) -> Result<(), MockError> {
        self.record(Tier::Error, message, context)
    }

    fn fatal(&mut self, message: &str, context: &EnrichedContext) -> Result<(), MockError> {
        self.record(Tier::Fatal, message, context)
    }
}
