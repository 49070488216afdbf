use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{Level, LogRecord};

/// Format of the human readable timestamp attached to every forwarded record.
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%y %H:%M:%S";

/// Replacement for tab characters in stack traces.
const TAB_REPLACEMENT: &str = "    ";

/// Additional data sent along with every record.
///
/// The context is built per record right before it is forwarded and discarded afterwards.
/// Backends that accept a free-form key-value mapping can serialize it directly, which yields the
/// keys `StackTrace`, `Time`, `Level` and `Source`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnrichedContext {
    /// Lines of the captured stack trace with tabs expanded.
    pub stack_trace: Vec<String>,
    /// The record's creation time formatted with [`TIMESTAMP_FORMAT`].
    pub time: String,
    /// The raw severity of the record.
    pub level: Level,
    /// The source identifier of the record.
    pub source: String,
}

impl EnrichedContext {
    /// Builds the context for a record with an already formatted timestamp.
    pub fn new(record: &LogRecord, time: &str) -> Self {
        Self {
            stack_trace: record
                .stack
                .as_deref()
                .map(normalize_stack_trace)
                .unwrap_or_default(),
            time: time.to_owned(),
            level: record.level,
            source: record.source.clone(),
        }
    }
}

/// Expands tabs into spaces and splits the trace into lines.
///
/// An empty trace yields no lines.
pub fn normalize_stack_trace(stack: &str) -> Vec<String> {
    if stack.is_empty() {
        return Vec::new();
    }

    stack
        .replace('\t', TAB_REPLACEMENT)
        .split('\n')
        .map(str::to_owned)
        .collect()
}

/// Caches the formatted timestamp of the most recent second.
///
/// Log records tend to arrive in bursts, so most records of a worker share the second of their
/// predecessor and can reuse its formatted string.
#[derive(Debug, Default)]
pub struct TimestampCache {
    second: Option<i64>,
    formatted: String,
}

impl TimestampCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the formatted timestamp, truncated to whole seconds.
    pub fn format(&mut self, created: DateTime<Utc>) -> &str {
        let second = created.timestamp();
        if self.second != Some(second) {
            self.formatted = created.format(TIMESTAMP_FORMAT).to_string();
            self.second = Some(second);
        }
        &self.formatted
    }
}
