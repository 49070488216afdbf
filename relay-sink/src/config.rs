use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default number of forwarding workers.
pub const DEFAULT_CONCURRENCY: usize = 32;

/// Default capacity of the record queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// What a forwarding worker does after its backend client failed to send a record.
///
/// The failed record is lost in either case.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SendFailurePolicy {
    /// The worker exits and the pool permanently shrinks by one.
    #[default]
    Terminate,
    /// The worker replaces its client with a freshly connected one and keeps going.
    ///
    /// If the new connection cannot be established, the worker exits.
    Reconnect,
}

impl fmt::Display for SendFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminate => f.write_str("terminate"),
            Self::Reconnect => f.write_str("reconnect"),
        }
    }
}

/// Error parsing a [`SendFailurePolicy`] from a string.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("unknown send failure policy {0:?}, expected \"terminate\" or \"reconnect\"")]
pub struct ParseSendFailurePolicyError(String);

impl FromStr for SendFailurePolicy {
    type Err = ParseSendFailurePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "terminate" => Ok(Self::Terminate),
            "reconnect" => Ok(Self::Reconnect),
            _ => Err(ParseSendFailurePolicyError(s.to_owned())),
        }
    }
}

/// An invalid [`RelayConfig`].
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// The pool needs at least one worker.
    #[error("concurrency must be at least 1")]
    NoWorkers,
    /// The queue needs room for at least one record.
    #[error("queue capacity must be at least 1")]
    NoCapacity,
    /// The overflow threshold exceeds the queue capacity.
    #[error("overflow threshold {threshold} exceeds queue capacity {capacity}")]
    ThresholdAboveCapacity {
        /// The configured threshold.
        threshold: usize,
        /// The configured capacity.
        capacity: usize,
    },
}

/// Immutable configuration of a [`RelaySink`](crate::RelaySink).
///
/// # Example
///
/// ```
/// use relay_sink::RelayConfig;
///
/// let config = RelayConfig::new("https://public@sentry.example.com/42")
///     .concurrency(4)
///     .queue_capacity(100)
///     .overflow_threshold(90)
///     .validate()
///     .unwrap();
///
/// assert_eq!(config.effective_overflow_threshold(), 90);
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RelayConfig {
    endpoint: String,
    concurrency: usize,
    queue_capacity: usize,
    overflow_threshold: Option<usize>,
    send_failure: SendFailurePolicy,
}

impl RelayConfig {
    /// Creates a configuration with default limits for the given endpoint descriptor.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            concurrency: DEFAULT_CONCURRENCY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_threshold: None,
            send_failure: SendFailurePolicy::default(),
        }
    }

    /// Sets the number of forwarding workers.
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the capacity of the record queue.
    pub fn queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    /// Sets the queue occupancy above which submitted records are dropped.
    ///
    /// Defaults to the capacity minus twice the concurrency, which leaves headroom for records
    /// picked up by workers that are still busy sending.
    pub fn overflow_threshold(mut self, overflow_threshold: usize) -> Self {
        self.overflow_threshold = Some(overflow_threshold);
        self
    }

    /// Sets the behavior after a failed send.
    pub fn send_failure(mut self, send_failure: SendFailurePolicy) -> Self {
        self.send_failure = send_failure;
        self
    }

    /// Checks the limits for consistency.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::NoCapacity);
        }
        let threshold = self.effective_overflow_threshold();
        if threshold > self.queue_capacity {
            return Err(ConfigError::ThresholdAboveCapacity {
                threshold,
                capacity: self.queue_capacity,
            });
        }
        Ok(self)
    }

    /// Returns the endpoint descriptor passed to the connector.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the number of forwarding workers.
    pub fn worker_count(&self) -> usize {
        self.concurrency
    }

    /// Returns the capacity of the record queue.
    pub fn capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Returns the overflow threshold, falling back to the default derived from the limits.
    pub fn effective_overflow_threshold(&self) -> usize {
        self.overflow_threshold.unwrap_or_else(|| {
            self.queue_capacity
                .saturating_sub(self.concurrency.saturating_mul(2))
        })
    }

    /// Returns the behavior after a failed send.
    pub fn send_failure_policy(&self) -> SendFailurePolicy {
        self.send_failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_threshold() {
        let config = RelayConfig::new("dsn").validate().unwrap();
        assert_eq!(config.worker_count(), 32);
        assert_eq!(config.capacity(), 1024);
        assert_eq!(config.effective_overflow_threshold(), 960);
        assert_eq!(config.send_failure_policy(), SendFailurePolicy::Terminate);
    }

    #[test]
    fn test_parse_send_failure_policy() {
        assert_eq!("Reconnect".parse(), Ok(SendFailurePolicy::Reconnect));
        assert_eq!("terminate".parse(), Ok(SendFailurePolicy::Terminate));
        assert!("retry".parse::<SendFailurePolicy>().is_err());
    }

    #[test]
    fn test_default_threshold_saturates() {
        let config = RelayConfig::new("dsn")
            .concurrency(32)
            .queue_capacity(32)
            .validate()
            .unwrap();
        assert_eq!(config.effective_overflow_threshold(), 0);
    }

    #[test]
    fn test_threshold_above_capacity() {
        let result = RelayConfig::new("dsn")
            .queue_capacity(10)
            .overflow_threshold(11)
            .validate();
        assert_eq!(
            result,
            Err(ConfigError::ThresholdAboveCapacity {
                threshold: 11,
                capacity: 10
            })
        );
    }

    #[test]
    fn test_threshold_equal_to_capacity() {
        let config = RelayConfig::new("dsn")
            .queue_capacity(10)
            .overflow_threshold(10)
            .validate();
        assert!(config.is_ok());
    }

    #[test]
    fn test_zero_limits() {
        assert_eq!(
            RelayConfig::new("dsn").concurrency(0).validate(),
            Err(ConfigError::NoWorkers)
        );
        assert_eq!(
            RelayConfig::new("dsn").queue_capacity(0).validate(),
            Err(ConfigError::NoCapacity)
        );
    }
}
