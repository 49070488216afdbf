use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Severity of a [`LogRecord`](crate::LogRecord), ordered from lowest to highest urgency.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Level {
    /// Very fine grained tracing output.
    Finest,
    /// Fine grained tracing output.
    Fine,
    /// Debugging output.
    Debug,
    /// Execution tracing.
    Trace,
    /// Regular informational messages.
    Info,
    /// Undesirable but recoverable conditions.
    Warning,
    /// Errors.
    Error,
    /// Critical failures.
    Critical,
}

impl Level {
    /// All levels in ascending order.
    pub const ALL: [Level; 8] = [
        Level::Finest,
        Level::Fine,
        Level::Debug,
        Level::Trace,
        Level::Info,
        Level::Warning,
        Level::Error,
        Level::Critical,
    ];

    /// Returns the lowercase name of the level.
    pub fn name(self) -> &'static str {
        match self {
            Level::Finest => "finest",
            Level::Fine => "fine",
            Level::Debug => "debug",
            Level::Trace => "trace",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Critical => "critical",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An error returned when parsing an unknown [`Level`].
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("unknown log level {0:?}")]
pub struct ParseLevelError(String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "finest" => Level::Finest,
            "fine" => Level::Fine,
            "debug" => Level::Debug,
            "trace" => Level::Trace,
            "info" => Level::Info,
            "warning" | "warn" => Level::Warning,
            "error" => Level::Error,
            "critical" | "fatal" => Level::Critical,
            _ => return Err(ParseLevelError(s.to_owned())),
        })
    }
}

impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// The backend severity call a record is forwarded with.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Tier {
    /// Forwarded through [`BackendClient::debug`](crate::BackendClient::debug).
    Debug,
    /// Forwarded through [`BackendClient::info`](crate::BackendClient::info).
    Info,
    /// Forwarded through [`BackendClient::warning`](crate::BackendClient::warning).
    Warning,
    /// Forwarded through [`BackendClient::error`](crate::BackendClient::error).
    Error,
    /// Forwarded through [`BackendClient::fatal`](crate::BackendClient::fatal).
    Fatal,
}

impl Tier {
    /// Returns the lowercase name of the tier.
    pub fn name(self) -> &'static str {
        match self {
            Tier::Debug => "debug",
            Tier::Info => "info",
            Tier::Warning => "warning",
            Tier::Error => "error",
            Tier::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inclusive upper bounds of all tiers below [`Tier::Fatal`], in ascending order.
const TIER_BOUNDS: [(Level, Tier); 4] = [
    (Level::Debug, Tier::Debug),
    (Level::Info, Tier::Info),
    (Level::Warning, Tier::Warning),
    (Level::Error, Tier::Error),
];

/// Maps record severities onto backend tiers.
///
/// A level is routed to the first tier whose upper bound it does not exceed. Everything above the
/// bound of [`Tier::Error`] is routed to [`Tier::Fatal`], so every level maps to exactly one tier.
#[derive(Clone, Copy, Debug, Default)]
pub struct LevelRouter;

impl LevelRouter {
    /// Returns the tier for the given level.
    pub fn route(level: Level) -> Tier {
        TIER_BOUNDS
            .iter()
            .find(|(bound, _)| level <= *bound)
            .map_or(Tier::Fatal, |(_, tier)| *tier)
    }
}
