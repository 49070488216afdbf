//! Forwards relayed log records to Sentry.
//!
//! [`SentryConnector`] implements [`Connector`] on top of the `sentry` SDK. Every forwarding
//! worker receives its own [`sentry::Client`] bound to the DSN from the relay configuration. The
//! clients are not bound to a hub, so relaying records never interferes with error reporting of
//! the relay process itself.
//!
//! Each record becomes one event. The severity tier selects the event level, the record's source
//! becomes the logger, and the [`EnrichedContext`] is attached as extra data.
//!
//! Events are sent synchronously on the worker's thread. A tier call returns once Sentry has
//! answered, and fails if the request failed or Sentry did not accept the event. A slow Sentry
//! therefore backs up the relay queue instead of an invisible buffer inside the SDK.

#![warn(missing_docs)]

mod transport;

pub use self::transport::SendError;

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use relay_sink::{BackendClient, Connector, EnrichedContext, Tier};
use sentry::protocol::{Event, Level, Map, Value};
use sentry::types::{Dsn, ParseDsnError};
use sentry::{ClientOptions, TransportFactory};

use crate::transport::{HttpTransportFactory, SendOutcome};

/// An error creating a client or capturing an event.
#[derive(Debug, thiserror::Error)]
pub enum SentryError {
    /// The endpoint is not a valid Sentry DSN.
    #[error("invalid sentry dsn")]
    InvalidDsn(#[from] ParseDsnError),
    /// The HTTP client could not be created.
    #[error("failed to create http client")]
    Http(#[source] reqwest::Error),
    /// The client was created but will not send any events.
    #[error("sentry client is disabled")]
    Disabled,
    /// The event was captured but not delivered.
    #[error("failed to send event to sentry")]
    Send(#[from] SendError),
    /// The context could not be converted into event data.
    #[error("failed to serialize the record context")]
    Context(#[from] serde_json::Error),
    /// The client discarded the event before it could be sent.
    #[error("sentry client discarded the {0} event")]
    Discarded(Tier),
}

/// Creates one [`SentryClient`] per forwarding worker.
#[derive(Clone, Default)]
pub struct SentryConnector {
    environment: Option<Cow<'static, str>>,
    release: Option<Cow<'static, str>>,
    transport: Option<Arc<dyn TransportFactory>>,
}

impl SentryConnector {
    /// Creates a connector sending every event synchronously over HTTP.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the environment attached to every event.
    pub fn environment(mut self, environment: impl Into<Cow<'static, str>>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Sets the release attached to every event.
    pub fn release(mut self, release: impl Into<Cow<'static, str>>) -> Self {
        self.release = Some(release.into());
        self
    }

    /// Replaces the transport used by all clients.
    ///
    /// Custom transports do not report delivery failures, so only events discarded by the client
    /// itself are reported as errors.
    pub fn transport(mut self, transport: Arc<dyn TransportFactory>) -> Self {
        self.transport = Some(transport);
        self
    }

    fn options(
        &self,
        dsn: Dsn,
        hostname: &str,
        transport: Arc<dyn TransportFactory>,
    ) -> ClientOptions {
        ClientOptions {
            dsn: Some(dsn),
            server_name: (!hostname.is_empty()).then(|| hostname.to_owned().into()),
            environment: self.environment.clone(),
            release: self.release.clone(),
            default_integrations: false,
            transport: Some(transport),
            ..Default::default()
        }
    }
}

impl fmt::Debug for SentryConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SentryConnector")
            .field("environment", &self.environment)
            .field("release", &self.release)
            .field("custom_transport", &self.transport.is_some())
            .finish()
    }
}

impl Connector for SentryConnector {
    type Client = SentryClient;
    type Error = SentryError;

    fn connect(&self, endpoint: &str, hostname: &str) -> Result<SentryClient, SentryError> {
        let dsn = endpoint.parse::<Dsn>()?;

        let (transport, outcome) = match &self.transport {
            Some(transport) => (transport.clone(), None),
            None => {
                let outcome = SendOutcome::default();
                let factory = HttpTransportFactory {
                    dsn: dsn.clone(),
                    http: reqwest::blocking::Client::builder()
                        .build()
                        .map_err(SentryError::Http)?,
                    outcome: outcome.clone(),
                };
                (Arc::new(factory) as Arc<dyn TransportFactory>, Some(outcome))
            }
        };

        let client = sentry::Client::with_options(self.options(dsn, hostname, transport));
        if !client.is_enabled() {
            return Err(SentryError::Disabled);
        }

        Ok(SentryClient { client, outcome })
    }
}

/// Sends records to Sentry as individual events.
///
/// With the default transport, each call returns once Sentry has answered. The client is closed
/// when dropped.
pub struct SentryClient {
    client: sentry::Client,
    outcome: Option<SendOutcome>,
}

impl SentryClient {
    fn capture(
        &mut self,
        tier: Tier,
        message: &str,
        context: &EnrichedContext,
    ) -> Result<(), SentryError> {
        let event = Event {
            level: event_level(tier),
            message: Some(message.to_owned()),
            logger: (!context.source.is_empty()).then(|| context.source.clone()),
            extra: extra(context)?,
            ..Default::default()
        };

        let event_id = self.client.capture_event(event, None);
        if event_id.is_nil() {
            return Err(SentryError::Discarded(tier));
        }

        match self.outcome.as_ref().and_then(SendOutcome::take) {
            Some(Err(error)) => Err(error.into()),
            Some(Ok(())) | None => Ok(()),
        }
    }
}

impl BackendClient for SentryClient {
    type Error = SentryError;

    fn debug(&mut self, message: &str, context: &EnrichedContext) -> Result<(), SentryError> {
        self.capture(Tier::Debug, message, context)
    }

    fn info(&mut self, message: &str, context: &EnrichedContext) -> Result<(), SentryError> {
        self.capture(Tier::Info, message, context)
    }

    fn warning(&mut self, message: &str, context: &EnrichedContext) -> Result<(), SentryError> {
        self.capture(Tier::Warning, message, context)
    }

    fn error(&mut self, message: &str, context: &EnrichedContext) -> Result<(), SentryError> {
        self.capture(Tier::Error, message, context)
    }

    fn fatal(&mut self, message: &str, context: &EnrichedContext) -> Result<(), SentryError> {
        self.capture(Tier::Fatal, message, context)
    }
}

impl Drop for SentryClient {
    fn drop(&mut self) {
        self.client.close(None);
    }
}

fn event_level(tier: Tier) -> Level {
    match tier {
        Tier::Debug => Level::Debug,
        Tier::Info => Level::Info,
        Tier::Warning => Level::Warning,
        Tier::Error => Level::Error,
        Tier::Fatal => Level::Fatal,
    }
}

fn extra(context: &EnrichedContext) -> Result<Map<String, Value>, serde_json::Error> {
    match serde_json::to_value(context)? {
        Value::Object(object) => Ok(object.into_iter().collect()),
        _ => Ok(Map::new()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread::JoinHandle;

    use relay_sink::{Level as RecordLevel, LogRecord, RelayConfig, RelaySink, SendFailurePolicy};
    use sentry::test::TestTransport;
    use similar_asserts::assert_eq;

    use super::*;

    const DSN: &str = "https://public@sentry.invalid/42";

    fn connector() -> (SentryConnector, Arc<TestTransport>) {
        let transport = TestTransport::new();
        let connector = SentryConnector::new().transport(Arc::new(transport.clone()));
        (connector, transport)
    }

    fn captured_events(transport: &TestTransport) -> Vec<Event<'static>> {
        transport
            .fetch_and_clear_envelopes()
            .iter()
            .filter_map(|envelope| envelope.event().cloned())
            .collect()
    }

    fn context() -> EnrichedContext {
        let record = LogRecord::new(RecordLevel::Error, "disk full")
            .with_source("storage")
            .with_stack("main.go:12\n\tstorage.go:40");
        EnrichedContext::new(&record, "11/14/23 22:13:20")
    }

    #[test]
    fn test_invalid_dsn() {
        let (connector, _) = connector();
        let result = connector.connect("not a dsn", "host-a");
        assert!(matches!(result, Err(SentryError::InvalidDsn(_))));
    }

    #[test]
    fn test_event_from_record() {
        let (connector, transport) = connector();
        let mut client = connector.connect(DSN, "host-a").unwrap();

        client.error("disk full", &context()).unwrap();

        let events = captured_events(&transport);
        assert_eq!(events.len(), 1);

        let event = &events[0];
        assert_eq!(event.level, Level::Error);
        assert_eq!(event.message.as_deref(), Some("disk full"));
        assert_eq!(event.logger.as_deref(), Some("storage"));
        assert_eq!(event.server_name.as_deref(), Some("host-a"));
        assert_eq!(event.extra["Time"], Value::from("11/14/23 22:13:20"));
        assert_eq!(event.extra["Level"], Value::from("error"));
        assert_eq!(event.extra["Source"], Value::from("storage"));
        assert_eq!(
            event.extra["StackTrace"],
            Value::from(vec!["main.go:12", "    storage.go:40"])
        );
    }

    #[test]
    fn test_tier_levels() {
        let (connector, transport) = connector();
        let mut client = connector.connect(DSN, "").unwrap();
        let context = context();

        client.debug("a", &context).unwrap();
        client.info("b", &context).unwrap();
        client.warning("c", &context).unwrap();
        client.error("d", &context).unwrap();
        client.fatal("e", &context).unwrap();

        let levels: Vec<_> = captured_events(&transport)
            .iter()
            .map(|event| event.level)
            .collect();

        assert_eq!(
            levels,
            [
                Level::Debug,
                Level::Info,
                Level::Warning,
                Level::Error,
                Level::Fatal
            ]
        );
    }

    #[test]
    fn test_empty_hostname_and_source() {
        let (connector, transport) = connector();
        let mut client = connector.connect(DSN, "").unwrap();
        let context = EnrichedContext::new(&LogRecord::new(RecordLevel::Info, "hi"), "now");

        client.info("hi", &context).unwrap();

        let events = captured_events(&transport);
        assert_eq!(events[0].logger, None);
        assert_eq!(events[0].extra["StackTrace"], Value::Array(Vec::new()));
    }

    #[test]
    fn test_environment_and_release() {
        let (connector, transport) = connector();
        let connector = connector.environment("staging").release("relay@1.0.0");
        let mut client = connector.connect(DSN, "host-a").unwrap();

        client.warning("slow query", &context()).unwrap();

        let events = captured_events(&transport);
        assert_eq!(events[0].environment.as_deref(), Some("staging"));
        assert_eq!(events[0].release.as_deref(), Some("relay@1.0.0"));
    }

    #[test]
    fn test_relay_through_sink() {
        let (connector, transport) = connector();
        let config = RelayConfig::new(DSN).concurrency(2).queue_capacity(16);
        let sink = RelaySink::new(config, connector, "host-a").unwrap();

        sink.submit(LogRecord::new(RecordLevel::Finest, "trace detail").with_source("db"));
        sink.submit(LogRecord::new(RecordLevel::Critical, "out of memory").with_source("db"));

        let stats = sink.close();
        assert_eq!(stats.forwarded, 2);

        let mut events: Vec<_> = captured_events(&transport)
            .into_iter()
            .map(|event| (event.message.unwrap_or_default(), event.level))
            .collect();
        events.sort_by(|a, b| a.0.cmp(&b.0));

        assert_eq!(
            events,
            [
                ("out of memory".to_owned(), Level::Fatal),
                ("trace detail".to_owned(), Level::Debug),
            ]
        );
    }

    /// A request received by [`serve`].
    struct Request {
        head: String,
        body: String,
    }

    /// Answers one request per connection with the given statuses, in order.
    fn serve(statuses: Vec<u16>) -> (String, JoinHandle<Vec<Request>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let dsn = format!("http://public@{}/42", listener.local_addr().unwrap());

        let handle = std::thread::spawn(move || {
            statuses
                .into_iter()
                .map(|status| {
                    let (stream, _) = listener.accept().unwrap();
                    respond(stream, status)
                })
                .collect()
        });

        (dsn, handle)
    }

    fn respond(stream: TcpStream, status: u16) -> Request {
        let mut reader = BufReader::new(stream);
        let mut head = String::new();
        let mut content_length = 0;

        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if line == "\r\n" || line.is_empty() {
                break;
            }
            if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                content_length = value.trim().parse().unwrap();
            }
            head.push_str(&line);
        }

        let mut body = vec![0; content_length];
        reader.read_exact(&mut body).unwrap();

        let stream = reader.get_mut();
        write!(
            stream,
            "HTTP/1.1 {status} Test\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        )
        .unwrap();
        stream.flush().unwrap();

        Request {
            head,
            body: String::from_utf8_lossy(&body).into_owned(),
        }
    }

    /// Returns a DSN pointing at a local port nobody listens on.
    fn unreachable_dsn() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://public@{addr}/42")
    }

    #[test]
    fn test_http_send_waits_for_sentry() {
        let (dsn, server) = serve(vec![200]);
        let mut client = SentryConnector::new().connect(&dsn, "host-a").unwrap();

        client.error("disk full", &context()).unwrap();
        drop(client);

        let requests = server.join().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].head.starts_with("POST /api/42/envelope/"), "{}", requests[0].head);
        assert!(requests[0].head.to_ascii_lowercase().contains("x-sentry-auth: sentry"));
        assert!(requests[0].head.contains("sentry_key=public"));
        assert!(requests[0].body.contains("disk full"));
    }

    #[test]
    fn test_http_rejected_status() {
        let (dsn, server) = serve(vec![500, 200]);
        let mut client = SentryConnector::new().connect(&dsn, "").unwrap();

        let result = client.error("first", &context());
        assert!(
            matches!(
                result,
                Err(SentryError::Send(SendError::Status(status))) if status.as_u16() == 500
            ),
            "{result:?}"
        );

        // The failure is reported once and does not stick to later sends.
        client.error("second", &context()).unwrap();
        drop(client);
        assert_eq!(server.join().unwrap().len(), 2);
    }

    #[test]
    fn test_http_unreachable_backend() {
        let dsn = unreachable_dsn();
        let mut client = SentryConnector::new().connect(&dsn, "host-a").unwrap();

        for _ in 0..3 {
            let result = client.error("lost", &context());
            assert!(
                matches!(result, Err(SentryError::Send(SendError::Request(_)))),
                "{result:?}"
            );
        }
    }

    #[test]
    fn test_unreachable_backend_terminates_worker() {
        let config = RelayConfig::new(unreachable_dsn())
            .concurrency(1)
            .queue_capacity(8)
            .send_failure(SendFailurePolicy::Terminate);
        let sink = RelaySink::new(config, SentryConnector::new(), "host-a").unwrap();

        sink.submit(LogRecord::new(RecordLevel::Error, "first"));
        sink.submit(LogRecord::new(RecordLevel::Error, "second"));
        let stats = sink.close();

        assert_eq!(stats.forwarded, 0);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.live_workers, 0);
    }
}
