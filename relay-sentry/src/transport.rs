use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use sentry::types::Dsn;
use sentry::{ClientOptions, Envelope, Transport, TransportFactory};

/// An error delivering an event to Sentry.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The event envelope could not be serialized.
    #[error("failed to serialize the event envelope")]
    Serialize(#[source] io::Error),
    /// The request did not complete, for example because the host is unreachable.
    #[error("request to sentry failed")]
    Request(#[from] reqwest::Error),
    /// Sentry answered, but did not accept the event.
    #[error("sentry responded with status {0}")]
    Status(reqwest::StatusCode),
}

/// The result of the most recent envelope sent through an [`HttpTransport`].
#[derive(Clone, Debug, Default)]
pub(crate) struct SendOutcome(Arc<Mutex<Option<Result<(), SendError>>>>);

impl SendOutcome {
    fn set(&self, result: Result<(), SendError>) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
    }

    /// Takes the result of the last send, if there was one since the last call.
    pub fn take(&self) -> Option<Result<(), SendError>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Creates an [`HttpTransport`] for a single client.
pub(crate) struct HttpTransportFactory {
    pub dsn: Dsn,
    pub http: reqwest::blocking::Client,
    pub outcome: SendOutcome,
}

impl TransportFactory for HttpTransportFactory {
    fn create_transport(&self, options: &ClientOptions) -> Arc<dyn Transport> {
        Arc::new(HttpTransport {
            url: self.dsn.envelope_api_url().to_string(),
            auth: self
                .dsn
                .to_auth(Some(options.user_agent.as_ref()))
                .to_string(),
            http: self.http.clone(),
            outcome: self.outcome.clone(),
        })
    }
}

/// Sends every envelope on the calling thread and records the result.
///
/// Unlike the SDK's default transports there is no background queue: capturing an event blocks
/// until Sentry has answered.
struct HttpTransport {
    url: String,
    auth: String,
    http: reqwest::blocking::Client,
    outcome: SendOutcome,
}

impl HttpTransport {
    fn send(&self, envelope: &Envelope) -> Result<(), SendError> {
        let mut body = Vec::new();
        envelope.to_writer(&mut body).map_err(SendError::Serialize)?;

        let response = self
            .http
            .post(&self.url)
            .header("X-Sentry-Auth", &self.auth)
            .header("Content-Type", "application/x-sentry-envelope")
            .body(body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(SendError::Status(status));
        }

        Ok(())
    }
}

impl Transport for HttpTransport {
    fn send_envelope(&self, envelope: Envelope) {
        self.outcome.set(self.send(&envelope));
    }
}
