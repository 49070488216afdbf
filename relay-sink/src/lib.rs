//! A bounded, concurrent relay of log records to an error tracking backend.
//!
//! The application submits [`LogRecord`]s to a [`RelaySink`]. The sink places them on a bounded
//! queue that is drained by a fixed pool of forwarding workers. Every worker owns its own
//! [`BackendClient`], created through a shared [`Connector`], and forwards each record with the
//! severity call selected by the [`LevelRouter`].
//!
//! ## Load Shedding
//!
//! Submitting never reports errors to the application. Once the queue occupancy exceeds the
//! configured overflow threshold, the [`OverflowGuard`] drops incoming records and emits a
//! warning to the diagnostic log instead of blocking the producer. Producers only block while the
//! queue is physically full, which the threshold keeps from happening in steady state.
//!
//! ## Failures
//!
//! All failures are terminal for the unit that encountered them:
//!
//! - A worker that cannot create its client logs the error and exits. It is not replaced.
//! - A record the backend fails to accept is logged along with its message and lost. Depending on
//!   the [`SendFailurePolicy`], the worker then exits or reconnects.
//! - A dropped record is logged and counted in [`SinkStats::dropped`].
//!
//! ## Ordering
//!
//! Each worker forwards records in the order it dequeued them. There is no ordering across
//! workers.
//!
//! ## Example
//!
//! ```no_run
//! use relay_sink::{BackendClient, EnrichedContext, Level, LogRecord, RelayConfig, RelaySink};
//!
//! struct StderrClient;
//!
//! impl BackendClient for StderrClient {
//!     type Error = std::io::Error;
//!
//!     fn debug(&mut self, message: &str, _: &EnrichedContext) -> std::io::Result<()> {
//!         eprintln!("debug: {message}");
//!         Ok(())
//!     }
//!     # fn info(&mut self, _: &str, _: &EnrichedContext) -> std::io::Result<()> { Ok(()) }
//!     # fn warning(&mut self, _: &str, _: &EnrichedContext) -> std::io::Result<()> { Ok(()) }
//!     # fn error(&mut self, _: &str, _: &EnrichedContext) -> std::io::Result<()> { Ok(()) }
//!     # fn fatal(&mut self, _: &str, _: &EnrichedContext) -> std::io::Result<()> { Ok(()) }
//! }
//!
//! let config = RelayConfig::new("stderr://").concurrency(2).queue_capacity(64);
//! let connector = |_: &str, _: &str| Ok::<_, std::io::Error>(StderrClient);
//! let sink = RelaySink::new(config, connector, "localhost").unwrap();
//!
//! sink.submit(LogRecord::new(Level::Debug, "cache warmed"));
//! sink.close();
//! ```

#![warn(missing_docs)]

mod builder;
mod client;
mod config;
mod context;
mod level;
mod pool;
mod record;
mod sink;
mod stats;
mod worker;

#[cfg(test)]
mod testutils;

pub use self::builder::*;
pub use self::client::*;
pub use self::config::*;
pub use self::context::*;
pub use self::level::*;
pub use self::pool::{CustomSpawn, DefaultSpawn, ThreadSpawn, Worker};
pub use self::record::*;
pub use self::sink::*;
pub use self::stats::SinkStats;
