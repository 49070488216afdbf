use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Level;

/// A single log event submitted by the application's logging framework.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct LogRecord {
    /// Severity of the event.
    pub level: Level,
    /// The formatted log message.
    pub message: String,
    /// Time at which the event was created.
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
    /// Identifier of the code location that emitted the event.
    #[serde(default)]
    pub source: String,
    /// Raw captured stack trace, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl LogRecord {
    /// Creates a record created now, without source and stack trace.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            created: Utc::now(),
            source: String::new(),
            stack: None,
        }
    }

    /// Sets the source identifier.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Sets the raw stack trace.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Sets the creation time.
    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }
}
