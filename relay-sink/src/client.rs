use std::error::Error;

use crate::{EnrichedContext, Tier};

/// A connection to the error tracking backend.
///
/// Every forwarding worker owns exactly one client, so implementations do not need to be
/// thread safe. All calls are blocking from the worker's point of view.
pub trait BackendClient {
    /// Error returned when the backend rejects a record or cannot be reached.
    type Error: Error + Send + Sync + 'static;

    /// Sends a message with debug severity.
    fn debug(&mut self, message: &str, context: &EnrichedContext) -> Result<(), Self::Error>;

    /// Sends a message with info severity.
    fn info(&mut self, message: &str, context: &EnrichedContext) -> Result<(), Self::Error>;

    /// Sends a message with warning severity.
    fn warning(&mut self, message: &str, context: &EnrichedContext) -> Result<(), Self::Error>;

    /// Sends a message with error severity.
    fn error(&mut self, message: &str, context: &EnrichedContext) -> Result<(), Self::Error>;

    /// Sends a message with fatal severity.
    fn fatal(&mut self, message: &str, context: &EnrichedContext) -> Result<(), Self::Error>;

    /// Dispatches to the send method of the given tier.
    fn send(
        &mut self,
        tier: Tier,
        message: &str,
        context: &EnrichedContext,
    ) -> Result<(), Self::Error> {
        match tier {
            Tier::Debug => self.debug(message, context),
            Tier::Info => self.info(message, context),
            Tier::Warning => self.warning(message, context),
            Tier::Error => self.error(message, context),
            Tier::Fatal => self.fatal(message, context),
        }
    }
}

/// Creates [`BackendClient`] instances for forwarding workers.
///
/// The connector is shared by all workers, each of which calls [`connect`](Self::connect) on its
/// own thread once at startup and again whenever it reconnects.
pub trait Connector: Send + Sync + 'static {
    /// The client type produced by this connector.
    type Client: BackendClient;

    /// Error returned when a client cannot be constructed.
    type Error: Error + Send + Sync + 'static;

    /// Constructs a client for the given endpoint descriptor and hostname.
    fn connect(&self, endpoint: &str, hostname: &str) -> Result<Self::Client, Self::Error>;
}

impl<F, C, E> Connector for F
where
    F: Fn(&str, &str) -> Result<C, E> + Send + Sync + 'static,
    C: BackendClient,
    E: Error + Send + Sync + 'static,
{
    type Client = C;
    type Error = E;

    fn connect(&self, endpoint: &str, hostname: &str) -> Result<Self::Client, Self::Error> {
        self(endpoint, hostname)
    }
}
